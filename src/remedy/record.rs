//! Resolution bookkeeping: close the loop on the review host.
//!
//! Every issue — fixed or ignored — gets one explanatory reply per
//! enclosing thread and a resolve call, exactly once. Idempotency comes
//! from the host's own thread state: threads already resolved are
//! skipped outright, so a re-run after a partial failure posts zero
//! duplicate explanations. Fix issues whose task failed get an explicit
//! failure note and stay unresolved for a future run; nothing is ever
//! falsely marked fixed.

use std::collections::{HashMap, HashSet};

use crate::host::traits::ReviewHost;
use crate::remedy::dispatch::IssueFixReport;
use crate::triage::types::{Disposition, Issue, RESOLUTION_MARKER};

/// What the recorder did across one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionSummary {
    /// Threads replied to and resolved.
    pub resolved: usize,
    /// Threads skipped because the host already shows them resolved.
    pub skipped_already_resolved: usize,
    /// Threads annotated with a failure note and left open.
    pub left_unresolved: usize,
    /// Host calls that failed; the affected threads are left for a
    /// future run.
    pub host_failures: usize,
}

/// Record dispositions for every issue.
///
/// `fix_outcomes` maps an index into `issues` to that issue's fix
/// report; issues without an entry are treated by their disposition
/// alone (ignored issues, or fixes never dispatched).
pub async fn record(
    host: &dyn ReviewHost,
    issues: &[Issue],
    fix_outcomes: &HashMap<usize, IssueFixReport>,
) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    let mut seen_threads: HashSet<String> = HashSet::new();

    for (idx, issue) in issues.iter().enumerate() {
        let outcome = fix_outcomes.get(&idx);
        let (note, resolve) = resolution_note(issue, outcome);

        for thread_id in issue.thread_ids() {
            if !seen_threads.insert(thread_id.clone()) {
                continue;
            }

            let state = match host.get_thread_state(&thread_id).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        thread = thread_id.as_str(),
                        error = %e,
                        "Thread state check failed, leaving for a future run"
                    );
                    summary.host_failures += 1;
                    continue;
                }
            };
            if state.is_resolved {
                tracing::debug!(thread = thread_id.as_str(), "Already resolved, skipping");
                summary.skipped_already_resolved += 1;
                continue;
            }

            if let Err(e) = host.post_reply(&thread_id, &note).await {
                tracing::warn!(thread = thread_id.as_str(), error = %e, "Reply failed");
                summary.host_failures += 1;
                continue;
            }

            if resolve {
                match host.resolve_thread(&thread_id).await {
                    Ok(()) => summary.resolved += 1,
                    Err(e) => {
                        tracing::warn!(thread = thread_id.as_str(), error = %e, "Resolve failed");
                        summary.host_failures += 1;
                    }
                }
            } else {
                summary.left_unresolved += 1;
            }
        }
    }

    tracing::info!(
        resolved = summary.resolved,
        skipped = summary.skipped_already_resolved,
        left_open = summary.left_unresolved,
        host_failures = summary.host_failures,
        "Resolution recording complete"
    );
    summary
}

/// Build the reply text and decide whether the thread gets resolved.
fn resolution_note(issue: &Issue, outcome: Option<&IssueFixReport>) -> (String, bool) {
    let (body, resolve) = match (issue.disposition, outcome) {
        (Disposition::Ignore, _) => (
            format!("No action taken: {}.", issue.rationale),
            true,
        ),
        (Disposition::Fix, Some(report)) if report.succeeded() => {
            let detail = report
                .note
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default();
            (format!("Fixed: {}.{detail}", issue.rationale), true)
        }
        (Disposition::Fix, Some(report)) if !report.dispatched => (
            format!(
                "Fix was not attempted ({}); leaving this thread open for a future run.",
                report.note.as_deref().unwrap_or("run cancelled")
            ),
            false,
        ),
        (Disposition::Fix, Some(report)) => (
            format!(
                "Fix attempt failed: {}; leaving this thread open for a future run.",
                report.note.as_deref().unwrap_or("no detail from worker")
            ),
            false,
        ),
        // A fix issue with no outcome at all was never dispatched.
        (Disposition::Fix, None) => (
            "Fix was not attempted; leaving this thread open for a future run.".into(),
            false,
        ),
    };
    (format!("{body} {RESOLUTION_MARKER}"), resolve)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;
    use crate::host::traits::{FixStatus, ThreadPage, ThreadState};
    use crate::triage::types::{Author, Category, Comment, Severity};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn issue(disposition: Disposition, rationale: &str, threads: &[&str]) -> Issue {
        Issue {
            comments: threads
                .iter()
                .map(|t| Comment {
                    source_id: format!("c-{t}"),
                    author: Author {
                        handle: "bot-a".into(),
                        is_human: false,
                    },
                    body: "finding".into(),
                    file_path: Some("a.rs".into()),
                    line: Some(1),
                    is_outdated: false,
                    thread_id: (*t).into(),
                    raw_severity_token: None,
                    severity: Severity::Medium,
                })
                .collect(),
            file_path: Some("a.rs".into()),
            line_range: Some((1, 1)),
            severity: Severity::Medium,
            sources: vec!["bot-a".into()],
            category: Category::Bug,
            confidence: 0.6,
            disposition,
            rationale: rationale.into(),
        }
    }

    fn report(idx: usize, status: FixStatus, dispatched: bool) -> IssueFixReport {
        IssueFixReport {
            issue_idx: idx,
            status,
            note: None,
            dispatched,
        }
    }

    /// In-memory host that tracks replies and resolutions.
    #[derive(Default)]
    struct MemoryHost {
        resolved: Mutex<HashSet<String>>,
        replies: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReviewHost for MemoryHost {
        async fn list_threads(&self, _: &str, _: u32) -> Result<ThreadPage, TriageError> {
            unimplemented!("recorder never lists")
        }

        async fn post_reply(&self, thread_id: &str, text: &str) -> Result<(), TriageError> {
            self.replies.lock().push((thread_id.into(), text.into()));
            Ok(())
        }

        async fn resolve_thread(&self, thread_id: &str) -> Result<(), TriageError> {
            self.resolved.lock().insert(thread_id.into());
            Ok(())
        }

        async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState, TriageError> {
            Ok(ThreadState {
                is_resolved: self.resolved.lock().contains(thread_id),
                is_outdated: false,
            })
        }
    }

    #[tokio::test]
    async fn resolves_both_dispositions_with_marker() {
        let host = MemoryHost::default();
        let issues = vec![
            issue(Disposition::Fix, "nil check added", &["t-1"]),
            issue(Disposition::Ignore, "stylistic", &["t-2"]),
        ];
        let outcomes = HashMap::from([(0usize, report(0, FixStatus::Success, true))]);

        let summary = record(&host, &issues, &outcomes).await;
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.left_unresolved, 0);

        let replies = host.replies.lock();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|(_, text)| text.contains(RESOLUTION_MARKER)));
        assert!(replies[0].1.contains("Fixed"));
        assert!(replies[1].1.contains("No action taken"));
    }

    #[tokio::test]
    async fn failed_fix_leaves_thread_open() {
        let host = MemoryHost::default();
        let issues = vec![issue(Disposition::Fix, "should fix", &["t-1"])];
        let outcomes = HashMap::from([(0usize, report(0, FixStatus::Failure, true))]);

        let summary = record(&host, &issues, &outcomes).await;
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.left_unresolved, 1);
        assert!(host.resolved.lock().is_empty());
        assert!(host.replies.lock()[0].1.contains("failed"));
    }

    #[tokio::test]
    async fn second_run_posts_zero_new_replies() {
        let host = MemoryHost::default();
        let issues = vec![
            issue(Disposition::Fix, "fixed", &["t-1"]),
            issue(Disposition::Ignore, "noise", &["t-2"]),
        ];
        let outcomes = HashMap::from([(0usize, report(0, FixStatus::Success, true))]);

        record(&host, &issues, &outcomes).await;
        let replies_after_first = host.replies.lock().len();

        let summary = record(&host, &issues, &outcomes).await;
        assert_eq!(host.replies.lock().len(), replies_after_first);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.skipped_already_resolved, 2);
    }

    #[tokio::test]
    async fn shared_thread_handled_once() {
        let host = MemoryHost::default();
        // Two issues pointing at the same thread: one reply, one resolve.
        let issues = vec![
            issue(Disposition::Ignore, "first", &["t-1"]),
            issue(Disposition::Ignore, "second", &["t-1"]),
        ];
        record(&host, &issues, &HashMap::new()).await;
        assert_eq!(host.replies.lock().len(), 1);
    }

    #[tokio::test]
    async fn undispatched_fix_noted_and_left_open() {
        let host = MemoryHost::default();
        let issues = vec![issue(Disposition::Fix, "queued", &["t-1"])];
        let outcomes = HashMap::from([(0usize, report(0, FixStatus::Failure, false))]);

        let summary = record(&host, &issues, &outcomes).await;
        assert_eq!(summary.left_unresolved, 1);
        assert!(host.replies.lock()[0].1.contains("not attempted"));
    }
}
