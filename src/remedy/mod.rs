//! Remediation execution: the post-approval half of the pipeline.
//!
//! `execute` re-reads the (possibly human-edited) plan artifact — the
//! artifact is the authoritative input — reconciles it against the
//! sidecar, dispatches file-disjoint fix batches concurrently, then
//! records every disposition back to the review host:
//!
//! ```text
//! plan.md (edited) ─┬─▸ reconcile ─▸ dispatch ─▸ record ─▸ summary
//! plan.json ────────┘               (concurrent) (idempotent)
//! ```
//!
//! Resolution recording begins only after every fix task has reached a
//! terminal state; there is no interleaving of remediation and
//! resolution.

pub mod dispatch;
pub mod record;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::TriageError;
use crate::host::traits::{FixWorker, ReviewHost};
use crate::triage::plan::{self, Plan, PlanState};
use crate::triage::types::{Disposition, Issue};
use self::dispatch::{DispatchOptions, IssueFixReport};
use self::record::ResolutionSummary;

/// Post-execution accounting, the user-visible failure surface.
#[derive(Debug)]
pub struct ExecutionSummary {
    pub plan_id: String,
    pub fixed: usize,
    /// Location and failure note per failed fix.
    pub failed: Vec<(String, String)>,
    /// Location and rationale per ignored issue.
    pub ignored: Vec<(String, String)>,
    pub resolution: ResolutionSummary,
}

impl ExecutionSummary {
    /// Some fix tasks failed or some host calls were left for a future
    /// run; the run still completed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || self.resolution.host_failures > 0
    }

    /// Render for the terminal; enumerates exactly which fixes failed
    /// and which issues were ignored, with reasons.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "plan {}: {} fixed, {} failed, {} ignored\n",
            self.plan_id,
            self.fixed,
            self.failed.len(),
            self.ignored.len(),
        ));
        out.push_str(&format!(
            "threads: {} resolved, {} already resolved, {} left open, {} host failures\n",
            self.resolution.resolved,
            self.resolution.skipped_already_resolved,
            self.resolution.left_unresolved,
            self.resolution.host_failures,
        ));
        if !self.failed.is_empty() {
            out.push_str("\nfailed fixes:\n");
            for (location, note) in &self.failed {
                out.push_str(&format!("  - {location}: {note}\n"));
            }
        }
        if !self.ignored.is_empty() {
            out.push_str("\nignored:\n");
            for (location, rationale) in &self.ignored {
                out.push_str(&format!("  - {location}: {rationale}\n"));
            }
        }
        out
    }
}

/// Run stages six and seven against an approved plan artifact.
///
/// The caller confirms approval before invoking this; a plan that is
/// still `Draft` is refused and a `Completed` plan is single-use. A plan
/// found in `Executing` state resumes — the recorder's already-resolved
/// skip makes the re-run idempotent.
pub async fn run_execute(
    host: &dyn ReviewHost,
    worker: Arc<dyn FixWorker>,
    config: &Config,
    artifact_path: &Path,
    cancel: CancellationToken,
) -> Result<ExecutionSummary, TriageError> {
    let sidecar_path = artifact_path.with_extension("json");
    let mut plan = Plan::load(&sidecar_path)?;

    match plan.state {
        PlanState::AwaitingApproval => {
            plan.approve()?;
            plan.start_executing()?;
        }
        PlanState::Approved => plan.start_executing()?,
        PlanState::Executing => {
            tracing::warn!(plan = plan.id.as_str(), "Resuming interrupted execution");
        }
        PlanState::Completed => {
            return Err(TriageError::PlanConsumed {
                plan_id: plan.id.clone(),
            });
        }
        PlanState::Draft => {
            return Err(TriageError::PlanNotApproved {
                plan_id: plan.id.clone(),
                state: plan.state.label().into(),
            });
        }
    }

    let markdown = std::fs::read_to_string(artifact_path)
        .map_err(|e| TriageError::io(artifact_path.display().to_string(), e))?;
    let issues = plan.reconcile(&plan::parse_artifact(&markdown)?);
    plan.save(&sidecar_path)?;

    // Dispatch only the fix subset, keeping a map back to plan positions.
    let fix_positions: Vec<usize> = issues
        .iter()
        .enumerate()
        .filter(|(_, i)| i.disposition == Disposition::Fix)
        .map(|(idx, _)| idx)
        .collect();
    let fix_issues: Vec<Issue> = fix_positions.iter().map(|&i| issues[i].clone()).collect();

    let report = dispatch::dispatch(
        worker,
        &fix_issues,
        DispatchOptions {
            worker_pool: config.pipeline.worker_pool,
            fix_timeout: Duration::from_secs(config.pipeline.fix_timeout_secs),
        },
        cancel,
    )
    .await;

    let outcomes: HashMap<usize, IssueFixReport> = report
        .results
        .iter()
        .map(|r| (fix_positions[r.issue_idx], r.clone()))
        .collect();

    let resolution = record::record(host, &issues, &outcomes).await;

    plan.issues = issues;
    plan.complete();
    plan.save(&sidecar_path)?;

    let fixed = report.results.iter().filter(|r| r.succeeded()).count();
    let failed = report
        .results
        .iter()
        .filter(|r| !r.succeeded())
        .map(|r| {
            (
                plan.issues[fix_positions[r.issue_idx]].location(),
                r.note.clone().unwrap_or_else(|| "no detail".into()),
            )
        })
        .collect();
    let ignored = plan
        .issues
        .iter()
        .filter(|i| i.disposition == Disposition::Ignore)
        .map(|i| (i.location(), i.rationale.clone()))
        .collect();

    Ok(ExecutionSummary {
        plan_id: plan.id.clone(),
        fixed,
        failed,
        ignored,
        resolution,
    })
}

// ── Tests ────────────────────────────────────────────────────────
