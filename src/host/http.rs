//! HTTP review-host backend.
//!
//! Talks to a JSON review-host API:
//!
//! - `GET  {base}/reviews/{id}/threads?page=N` — paginated thread listing
//! - `POST {base}/threads/{id}/replies`       — post a reply
//! - `POST {base}/threads/{id}/resolve`       — mark resolved
//! - `GET  {base}/threads/{id}`               — thread flags
//!
//! Authentication is a bearer token; every call carries an independent
//! timeout from [`HostConfig`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{ReviewHost, ThreadPage, ThreadState};
use crate::config::HostConfig;
use crate::error::TriageError;
use crate::triage::types::{Author, Comment, Severity, Thread};

/// Review host reached over HTTP.
pub struct HttpReviewHost {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpReviewHost {
    pub fn new(config: &HostConfig, token: Option<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(config.request_timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, TriageError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TriageError::Host(format!("{what}: HTTP {status}: {body}")))
    }
}

// ── Wire types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireThreadPage {
    threads: Vec<WireThread>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireThread {
    id: String,
    #[serde(default)]
    is_resolved: bool,
    #[serde(default)]
    is_outdated: bool,
    #[serde(default)]
    comments: Vec<WireComment>,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    id: String,
    author: WireAuthor,
    body: String,
    file_path: Option<String>,
    line: Option<u64>,
    #[serde(default)]
    is_outdated: bool,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    handle: String,
    #[serde(default)]
    is_human: bool,
}

impl WireThread {
    fn into_thread(self) -> Thread {
        let thread_outdated = self.is_outdated;
        let thread_id = self.id.clone();
        Thread {
            id: self.id,
            is_resolved: self.is_resolved,
            is_outdated: thread_outdated,
            comments: self
                .comments
                .into_iter()
                .map(|c| Comment {
                    source_id: c.id,
                    author: Author {
                        handle: c.author.handle,
                        is_human: c.author.is_human,
                    },
                    body: c.body,
                    file_path: c.file_path,
                    line: c.line,
                    is_outdated: c.is_outdated || thread_outdated,
                    thread_id: thread_id.clone(),
                    raw_severity_token: None,
                    severity: Severity::Unknown,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ReviewHost for HttpReviewHost {
    async fn list_threads(
        &self,
        review_request_id: &str,
        page: u32,
    ) -> Result<ThreadPage, TriageError> {
        let url = format!("{}/reviews/{review_request_id}/threads", self.base_url);
        let resp = self
            .request(self.client.get(&url).query(&[("page", page)]))
            .send()
            .await
            .map_err(|e| TriageError::Host(format!("list_threads: {e}")))?;
        let resp = Self::check(resp, "list_threads").await?;
        let wire: WireThreadPage = resp
            .json()
            .await
            .map_err(|e| TriageError::Host(format!("list_threads: bad payload: {e}")))?;
        Ok(ThreadPage {
            threads: wire.threads.into_iter().map(WireThread::into_thread).collect(),
            next_page: wire.next_page,
        })
    }

    async fn post_reply(&self, thread_id: &str, text: &str) -> Result<(), TriageError> {
        let url = format!("{}/threads/{thread_id}/replies", self.base_url);
        let resp = self
            .request(self.client.post(&url).json(&serde_json::json!({ "text": text })))
            .send()
            .await
            .map_err(|e| TriageError::Host(format!("post_reply: {e}")))?;
        Self::check(resp, "post_reply").await?;
        Ok(())
    }

    async fn resolve_thread(&self, thread_id: &str) -> Result<(), TriageError> {
        let url = format!("{}/threads/{thread_id}/resolve", self.base_url);
        let resp = self
            .request(self.client.post(&url))
            .send()
            .await
            .map_err(|e| TriageError::Host(format!("resolve_thread: {e}")))?;
        Self::check(resp, "resolve_thread").await?;
        Ok(())
    }

    async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState, TriageError> {
        let url = format!("{}/threads/{thread_id}", self.base_url);
        let resp = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TriageError::Host(format!("get_thread_state: {e}")))?;
        let resp = Self::check(resp, "get_thread_state").await?;
        let state: ThreadState = resp
            .json()
            .await
            .map_err(|e| TriageError::Host(format!("get_thread_state: bad payload: {e}")))?;
        Ok(state)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host_for(server: &MockServer) -> HttpReviewHost {
        let config = HostConfig {
            base_url: server.uri(),
            token_env: "UNUSED".into(),
            request_timeout_secs: 5,
        };
        HttpReviewHost::new(&config, Some("test-token".into()))
    }

    #[tokio::test]
    async fn list_threads_maps_wire_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reviews/rr-1/threads"))
            .and(query_param("page", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "threads": [{
                    "id": "t-1",
                    "is_resolved": false,
                    "is_outdated": true,
                    "comments": [{
                        "id": "c-1",
                        "author": { "handle": "sentinel-bot", "is_human": false },
                        "body": "missing nil check",
                        "file_path": "auth.go",
                        "line": 40
                    }]
                }],
                "next_page": 1
            })))
            .mount(&server)
            .await;

        let page = host_for(&server).list_threads("rr-1", 0).await.unwrap();
        assert_eq!(page.next_page, Some(1));
        assert_eq!(page.threads.len(), 1);
        let comment = &page.threads[0].comments[0];
        assert_eq!(comment.thread_id, "t-1");
        assert_eq!(comment.line, Some(40));
        // Thread-level outdated flag propagates to members.
        assert!(comment.is_outdated);
        assert_eq!(comment.severity, Severity::Unknown);
    }

    #[tokio::test]
    async fn http_error_surfaces_as_host_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t-9/resolve"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let err = host_for(&server).resolve_thread("t-9").await.unwrap_err();
        match err {
            TriageError::Host(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("try later"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn thread_state_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "is_resolved": true,
                "is_outdated": false
            })))
            .mount(&server)
            .await;

        let state = host_for(&server).get_thread_state("t-2").await.unwrap();
        assert!(state.is_resolved);
        assert!(!state.is_outdated);
    }
}
