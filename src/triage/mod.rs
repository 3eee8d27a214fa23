//! Review-feedback triage pipeline.
//!
//! Collapses redundant and conflicting signals from multiple independent
//! reviewers into a de-duplicated, classified issue list and a single
//! human-approvable remediation plan:
//!
//! ```text
//! Review Host ─▸ collector ─▸ severity ─▸ cluster ─▸ classify ─▸ plan
//!                 (fetch)     (normalize)  (dedupe)   (fix/ignore) │
//!                                                                  ▼
//!                                                     plan.md + plan.json
//!                                                     (AwaitingApproval)
//! ```
//!
//! Every stage up to the plan is single-threaded and deterministic: the
//! stages operate on an in-memory snapshot and need no locking. The run
//! halts unconditionally at `AwaitingApproval` — execution is a separate
//! entry point in [`crate::remedy`], invoked only after a human confirms
//! the (possibly edited) artifact.

pub mod classify;
pub mod cluster;
pub mod collector;
pub mod plan;
pub mod severity;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::TriageError;
use crate::host::traits::ReviewHost;
use self::collector::CollectorOptions;
use self::plan::Plan;
use self::severity::AdapterRegistry;
use self::types::Comment;

/// Result of a `triage` invocation: the plan, halted at
/// `AwaitingApproval`, and where its artifacts were written.
#[derive(Debug)]
pub struct TriageOutcome {
    pub plan: Plan,
    pub artifact_path: PathBuf,
    pub sidecar_path: PathBuf,
}

/// Run stages one through five: collect, normalize, cluster, classify,
/// and write the plan artifact pair.
pub async fn run_triage(
    host: &dyn ReviewHost,
    config: &Config,
    review_request_id: &str,
) -> Result<TriageOutcome, TriageError> {
    let threads = collector::collect(
        host,
        review_request_id,
        CollectorOptions {
            max_retries: config.pipeline.max_fetch_retries,
            page_timeout: Duration::from_secs(config.pipeline.page_timeout_secs),
        },
    )
    .await?;

    // Threads the host already shows resolved are finished conversations;
    // re-triaging them would duplicate work on every run.
    let mut comments: Vec<Comment> = Vec::new();
    for thread in threads {
        if thread.is_resolved {
            tracing::debug!(thread = thread.id.as_str(), "Skipping resolved thread");
            continue;
        }
        for mut comment in thread.comments {
            comment.is_outdated |= thread.is_outdated;
            comments.push(comment);
        }
    }

    let registry = AdapterRegistry::from_config(&config.severity);
    let normalized = registry.normalize_all(comments);
    let issues = cluster::cluster(normalized, config.pipeline.proximity_window);
    let issues = classify::classify_all(issues, &config.conventions.allow);

    let mut plan = Plan::new(review_request_id, issues);
    let (artifact_path, sidecar_path) = plan.write(&config.pipeline.plan_dir)?;
    tracing::info!(
        plan = plan.id.as_str(),
        artifact = %artifact_path.display(),
        "Plan written, awaiting approval"
    );

    Ok(TriageOutcome {
        plan,
        artifact_path,
        sidecar_path,
    })
}

// ── Tests ────────────────────────────────────────────────────────
