//! Comment collection from the review host.
//!
//! Pages through the thread listing until exhaustion so callers never
//! see partial results except on failure. Listing is a pure read, so an
//! interrupted fetch restarts from page zero; retries are bounded and
//! exhaustion is fatal to the run — triaging against a partial comment
//! set is worse than failing loudly.

use std::time::Duration;

use crate::error::TriageError;
use crate::host::traits::ReviewHost;
use crate::triage::types::{Thread, RESOLUTION_MARKER};

/// Linear backoff step between whole-listing retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Collector tuning.
#[derive(Debug, Clone, Copy)]
pub struct CollectorOptions {
    /// Whole-listing retry bound.
    pub max_retries: u32,
    /// Independent timeout per page fetch.
    pub page_timeout: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            page_timeout: Duration::from_secs(30),
        }
    }
}

/// Fetch the complete thread set for a review request.
///
/// Comments authored by the pipeline's own prior runs (recognized by
/// [`RESOLUTION_MARKER`]) are filtered out so re-runs never re-ingest
/// their own resolution notes.
pub async fn collect(
    host: &dyn ReviewHost,
    review_request_id: &str,
    opts: CollectorOptions,
) -> Result<Vec<Thread>, TriageError> {
    let attempts = opts.max_retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match fetch_all(host, review_request_id, opts.page_timeout).await {
            Ok(mut threads) => {
                let dropped = strip_own_replies(&mut threads);
                let comments: usize = threads.iter().map(|t| t.comments.len()).sum();
                tracing::info!(
                    review_request = review_request_id,
                    threads = threads.len(),
                    comments,
                    own_replies_dropped = dropped,
                    "Collected comment threads"
                );
                return Ok(threads);
            }
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(
                    review_request = review_request_id,
                    attempt,
                    max = attempts,
                    error = last_error.as_str(),
                    "Thread listing failed, restarting from page zero"
                );
                if attempt < attempts {
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }

    Err(TriageError::CollectorExhausted {
        attempts,
        last_error,
    })
}

async fn fetch_all(
    host: &dyn ReviewHost,
    review_request_id: &str,
    page_timeout: Duration,
) -> Result<Vec<Thread>, TriageError> {
    let mut threads = Vec::new();
    let mut page = 0u32;
    loop {
        let fetched = tokio::time::timeout(page_timeout, host.list_threads(review_request_id, page))
            .await
            .map_err(|_| TriageError::Host(format!("page {page} fetch timed out")))??;
        threads.extend(fetched.threads);
        match fetched.next_page {
            Some(next) => page = next,
            None => return Ok(threads),
        }
    }
}

/// Drop comments carrying our own resolution marker. Returns how many
/// were removed.
fn strip_own_replies(threads: &mut [Thread]) -> usize {
    let mut dropped = 0;
    for thread in threads.iter_mut() {
        let before = thread.comments.len();
        thread.comments.retain(|c| !c.body.contains(RESOLUTION_MARKER));
        dropped += before - thread.comments.len();
    }
    dropped
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::traits::{ThreadPage, ThreadState};
    use crate::triage::types::{Author, Comment, Severity};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn thread(id: &str, bodies: &[&str]) -> Thread {
        Thread {
            id: id.into(),
            is_resolved: false,
            is_outdated: false,
            comments: bodies
                .iter()
                .enumerate()
                .map(|(i, body)| Comment {
                    source_id: format!("{id}-{i}"),
                    author: Author {
                        handle: "bot-a".into(),
                        is_human: false,
                    },
                    body: (*body).into(),
                    file_path: None,
                    line: None,
                    is_outdated: false,
                    thread_id: id.into(),
                    raw_severity_token: None,
                    severity: Severity::Unknown,
                })
                .collect(),
        }
    }

    /// Scripted host: serves `pages`, failing the first `fail_first`
    /// list calls.
    struct ScriptedHost {
        pages: Vec<ThreadPage>,
        fail_first: u32,
        calls: Mutex<u32>,
    }

    impl ScriptedHost {
        fn new(pages: Vec<ThreadPage>, fail_first: u32) -> Self {
            Self {
                pages,
                fail_first,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ReviewHost for ScriptedHost {
        async fn list_threads(
            &self,
            _review_request_id: &str,
            page: u32,
        ) -> Result<ThreadPage, TriageError> {
            let mut calls = self.calls.lock();
            *calls += 1;
            if *calls <= self.fail_first {
                return Err(TriageError::Host("flaky network".into()));
            }
            Ok(self.pages[page as usize].clone())
        }

        async fn post_reply(&self, _: &str, _: &str) -> Result<(), TriageError> {
            unimplemented!("collector is read-only")
        }

        async fn resolve_thread(&self, _: &str) -> Result<(), TriageError> {
            unimplemented!("collector is read-only")
        }

        async fn get_thread_state(&self, _: &str) -> Result<ThreadState, TriageError> {
            unimplemented!("collector is read-only")
        }
    }

    fn two_pages() -> Vec<ThreadPage> {
        vec![
            ThreadPage {
                threads: vec![thread("t-1", &["first"])],
                next_page: Some(1),
            },
            ThreadPage {
                threads: vec![thread("t-2", &["second"])],
                next_page: None,
            },
        ]
    }

    #[tokio::test]
    async fn paginates_until_exhaustion() {
        let host = ScriptedHost::new(two_pages(), 0);
        let threads = collect(&host, "rr-1", CollectorOptions::default()).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[1].id, "t-2");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let host = ScriptedHost::new(two_pages(), 1);
        let threads = collect(&host, "rr-1", CollectorOptions::default()).await.unwrap();
        assert_eq!(threads.len(), 2);
        // First attempt failed, second walked both pages.
        assert_eq!(*host.calls.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_fatal() {
        let host = ScriptedHost::new(two_pages(), u32::MAX);
        let err = collect(&host, "rr-1", CollectorOptions::default()).await.unwrap_err();
        match err {
            TriageError::CollectorExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn own_resolution_notes_are_filtered() {
        let marker_body = format!("resolved as fixed {RESOLUTION_MARKER}");
        let pages = vec![ThreadPage {
            threads: vec![thread("t-1", &["real comment", &marker_body])],
            next_page: None,
        }];
        let host = ScriptedHost::new(pages, 0);
        let threads = collect(&host, "rr-1", CollectorOptions::default()).await.unwrap();
        assert_eq!(threads[0].comments.len(), 1);
        assert_eq!(threads[0].comments[0].body, "real comment");
    }
}
