//! Remediation dispatch: run approved fixes concurrently, file-safely.
//!
//! The partition is computed before any task launches: fix issues are
//! grouped by target path and groups that share a path are merged into
//! one batch (connected components of path overlap). Batches are
//! pairwise file-disjoint, so they run concurrently under a bounded
//! worker pool with no runtime locking; issues inside a batch run
//! sequentially in plan order. One task failing never cancels the
//! others — every outcome is collected before the plan advances.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::host::traits::{FixRequest, FixStatus, FixWorker};
use crate::triage::types::Issue;

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Concurrent batch bound; an unbounded fan-out against an external
    /// editing surface is a throttling risk.
    pub worker_pool: usize,
    /// Independent timeout per fix-task invocation.
    pub fix_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            worker_pool: 4,
            fix_timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of one issue's fix attempt.
#[derive(Debug, Clone)]
pub struct IssueFixReport {
    /// Index into the dispatched issue slice.
    pub issue_idx: usize,
    pub status: FixStatus,
    pub note: Option<String>,
    /// False when the run was cancelled before this issue's batch
    /// started; such issues were simply never dispatched.
    pub dispatched: bool,
}

impl IssueFixReport {
    pub fn succeeded(&self) -> bool {
        self.status == FixStatus::Success
    }
}

/// Execution interval of one batch, for overlap auditing.
#[derive(Debug, Clone)]
pub struct TaskInterval {
    pub paths: BTreeSet<String>,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// Everything the dispatcher observed for one run.
#[derive(Debug)]
pub struct DispatchReport {
    /// One entry per input issue, ordered by `issue_idx`.
    pub results: Vec<IssueFixReport>,
    /// One entry per batch that actually ran.
    pub intervals: Vec<TaskInterval>,
}

impl DispatchReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }
}

// ── Batch partition ──────────────────────────────────────────────

/// One file-disjoint unit of work.
#[derive(Debug)]
struct Batch {
    paths: BTreeSet<String>,
    /// Indexes into the issue slice, in plan order.
    issue_idxs: Vec<usize>,
}

/// Partition issues into file-disjoint batches, merging groups that
/// share any path. Issues without a file anchor get singleton batches —
/// they contend on nothing.
fn partition_batches(issues: &[Issue]) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for (idx, issue) in issues.iter().enumerate() {
        let paths: BTreeSet<String> = issue.file_path.iter().cloned().collect();
        if paths.is_empty() {
            batches.push(Batch {
                paths,
                issue_idxs: vec![idx],
            });
            continue;
        }

        let overlapping: Vec<usize> = batches
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.paths.is_disjoint(&paths))
            .map(|(i, _)| i)
            .collect();

        match overlapping.split_first() {
            None => batches.push(Batch {
                paths,
                issue_idxs: vec![idx],
            }),
            Some((&first, rest)) => {
                // Merge trailing overlaps into the earliest batch so
                // plan order is preserved within the merged unit.
                for &other in rest.iter().rev() {
                    let absorbed = batches.remove(other);
                    batches[first].paths.extend(absorbed.paths);
                    batches[first].issue_idxs.extend(absorbed.issue_idxs);
                }
                batches[first].paths.extend(paths);
                batches[first].issue_idxs.push(idx);
                batches[first].issue_idxs.sort_unstable();
            }
        }
    }

    batches
}

// ── Dispatch ─────────────────────────────────────────────────────

/// Run every fix issue through the worker and collect all outcomes.
///
/// Cancellation stops batches that have not started; in-flight batches
/// run to completion and their results are kept (there is no rollback
/// of applied fixes).
pub async fn dispatch(
    worker: Arc<dyn FixWorker>,
    issues: &[Issue],
    opts: DispatchOptions,
    cancel: CancellationToken,
) -> DispatchReport {
    let batches = partition_batches(issues);
    tracing::info!(
        issues = issues.len(),
        batches = batches.len(),
        pool = opts.worker_pool,
        "Dispatching fix batches"
    );

    let semaphore = Arc::new(Semaphore::new(opts.worker_pool.max(1)));
    let intervals: Arc<Mutex<Vec<TaskInterval>>> = Arc::new(Mutex::new(Vec::new()));
    let mut join_set: JoinSet<Vec<IssueFixReport>> = JoinSet::new();

    for batch in batches {
        let worker = Arc::clone(&worker);
        let semaphore = Arc::clone(&semaphore);
        let intervals = Arc::clone(&intervals);
        let cancel = cancel.clone();
        let work: Vec<(usize, FixRequest, String)> = batch
            .issue_idxs
            .iter()
            .map(|&idx| {
                let issue = &issues[idx];
                (
                    idx,
                    FixRequest {
                        file_path: issue.file_path.clone(),
                        line_range: issue.line_range,
                        category: issue.category,
                        rationale: issue.rationale.clone(),
                    },
                    issue.location(),
                )
            })
            .collect();
        let paths = batch.paths;

        join_set.spawn(async move {
            // Acquire never fails: the semaphore lives for the whole run.
            let Ok(_permit) = semaphore.acquire().await else {
                return not_dispatched(&work, "worker pool closed");
            };
            if cancel.is_cancelled() {
                return not_dispatched(&work, "cancelled before dispatch");
            }

            let started_at = Instant::now();
            let mut reports = Vec::with_capacity(work.len());
            for (idx, request, location) in &work {
                let report = match tokio::time::timeout(opts.fix_timeout, worker.apply_fix(request)).await {
                    Ok(Ok(outcome)) => IssueFixReport {
                        issue_idx: *idx,
                        status: outcome.status,
                        note: outcome.note,
                        dispatched: true,
                    },
                    Ok(Err(e)) => IssueFixReport {
                        issue_idx: *idx,
                        status: FixStatus::Failure,
                        note: Some(e.to_string()),
                        dispatched: true,
                    },
                    Err(_) => IssueFixReport {
                        issue_idx: *idx,
                        status: FixStatus::Failure,
                        note: Some(format!("fix task timed out after {:?}", opts.fix_timeout)),
                        dispatched: true,
                    },
                };
                if report.succeeded() {
                    tracing::info!(location = location.as_str(), "Fix applied");
                } else {
                    tracing::warn!(
                        location = location.as_str(),
                        note = report.note.as_deref().unwrap_or(""),
                        "Fix failed, continuing with remaining tasks"
                    );
                }
                reports.push(report);
            }

            intervals.lock().push(TaskInterval {
                paths,
                started_at,
                finished_at: Instant::now(),
            });
            reports
        });
    }

    let mut results: Vec<IssueFixReport> = Vec::with_capacity(issues.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(reports) => results.extend(reports),
            Err(e) => tracing::error!(error = %e, "Fix batch task panicked"),
        }
    }
    results.sort_by_key(|r| r.issue_idx);

    let intervals = Arc::try_unwrap(intervals)
        .map(Mutex::into_inner)
        .unwrap_or_default();
    DispatchReport { results, intervals }
}

fn not_dispatched(work: &[(usize, FixRequest, String)], note: &str) -> Vec<IssueFixReport> {
    work.iter()
        .map(|(idx, _, _)| IssueFixReport {
            issue_idx: *idx,
            status: FixStatus::Failure,
            note: Some(note.into()),
            dispatched: false,
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────
