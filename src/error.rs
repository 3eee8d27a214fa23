//! Pipeline error taxonomy.
//!
//! Only two conditions are fatal to a run: the collector exhausting its
//! retries (a partial comment set is unsafe to triage against) and a plan
//! that was never approved. Everything else degrades to a per-issue or
//! per-thread annotation recorded in the plan artifact or the execution
//! summary.

/// Errors surfaced by the triage and remediation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// Listing comment threads failed after every retry.
    #[error("comment listing failed after {attempts} attempts: {last_error}")]
    CollectorExhausted { attempts: u32, last_error: String },

    /// `execute` was invoked on a plan that is not approved.
    #[error("plan `{plan_id}` was never approved (state: {state})")]
    PlanNotApproved { plan_id: String, state: String },

    /// `execute` was invoked on a plan that already completed; plans are
    /// single-use.
    #[error("plan `{plan_id}` already completed; run `triage` again for a fresh plan")]
    PlanConsumed { plan_id: String },

    /// The (possibly human-edited) plan artifact could not be parsed.
    #[error("malformed plan artifact: {0}")]
    PlanArtifact(String),

    /// A review-host call failed outside the retried listing path.
    #[error("review host error: {0}")]
    Host(String),

    #[error("io error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriageError {
    /// Convenience constructor for file-system failures.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
