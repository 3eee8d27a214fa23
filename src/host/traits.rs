//! Collaborator seams: the review host and the fix worker.
//!
//! The pipeline only ever talks to the outside world through these two
//! traits. Concrete backends live next door ([`super::http`],
//! [`super::command`]); tests swap in in-memory doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::triage::types::{Category, Thread};

// ── Review host ──────────────────────────────────────────────────

/// One page of the thread listing.
#[derive(Debug, Clone)]
pub struct ThreadPage {
    pub threads: Vec<Thread>,
    /// Next page index, `None` when the listing is exhausted.
    pub next_page: Option<u32>,
}

/// Host-side flags for a single thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThreadState {
    pub is_resolved: bool,
    pub is_outdated: bool,
}

/// The review host: comment/thread storage and notification delivery.
///
/// Listing is a pure read and may be restarted from page zero at any
/// time. `resolve_thread` is monotonic on the host side; resolving an
/// already-resolved thread is a no-op there, but callers are expected to
/// check [`ReviewHost::get_thread_state`] first to avoid posting
/// duplicate replies.
#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// Fetch one page of comment threads for a review request.
    async fn list_threads(
        &self,
        review_request_id: &str,
        page: u32,
    ) -> Result<ThreadPage, TriageError>;

    /// Post a reply into a thread.
    async fn post_reply(&self, thread_id: &str, text: &str) -> Result<(), TriageError>;

    /// Mark a thread resolved.
    async fn resolve_thread(&self, thread_id: &str) -> Result<(), TriageError>;

    /// Current host-side flags for a thread.
    async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState, TriageError>;
}

// ── Fix worker ───────────────────────────────────────────────────

/// Everything a fix worker gets to see about one issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRequest {
    /// Target file, absent for review-level issues.
    pub file_path: Option<String>,
    pub line_range: Option<(u64, u64)>,
    pub category: Category,
    /// Rationale / suggested-fix text from the approved plan.
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Success,
    Failure,
}

/// What the worker reports back for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixOutcome {
    pub status: FixStatus,
    /// Free-form note (what was changed, or why it failed).
    #[serde(default)]
    pub note: Option<String>,
}

impl FixOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == FixStatus::Success
    }
}

/// The component that actually edits source files.
///
/// Treated as an opaque black box: the pipeline neither inspects nor
/// requires any particular editing strategy. Errors are mapped to
/// [`FixStatus::Failure`] by the dispatcher; a worker failure is never
/// fatal to the batch.
#[async_trait]
pub trait FixWorker: Send + Sync {
    async fn apply_fix(&self, request: &FixRequest) -> Result<FixOutcome, TriageError>;
}
