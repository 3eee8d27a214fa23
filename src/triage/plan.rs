//! Plan building: the single human-approvable artifact.
//!
//! A plan is rendered as a markdown document with a fixed section order
//! (header, "Issues to Fix" severity-descending, "Ignored" with
//! rationale, "Summary") plus a JSON sidecar holding the full machine
//! copy and the plan state. The markdown is the sole medium of human
//! approval: edits made to it before confirmation are authoritative —
//! entries edited out of the fix section are excluded from dispatch but
//! still resolved, and an edited `action:` line replaces the fix text
//! handed to the worker.
//!
//! The artifact doubles as durable storage across the approval wait, so
//! the process does not stay alive between `triage` and `execute`.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::TriageError;
use crate::triage::classify::band;
use crate::triage::types::{Disposition, Issue};

/// Rationale recorded for issues deleted from the artifact without being
/// moved to the Ignored section.
pub const REMOVED_RATIONALE: &str = "removed from the plan during review";

/// Longest original-comment excerpt quoted per member.
const EXCERPT_LEN: usize = 120;

// ── Plan state ───────────────────────────────────────────────────

/// Lifecycle of a plan. Transitions are monotonic except the re-draft
/// edge taken when a human edits the artifact before confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Draft,
    AwaitingApproval,
    Approved,
    Executing,
    Completed,
}

impl PlanState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::AwaitingApproval => "awaiting-approval",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Plan ─────────────────────────────────────────────────────────

/// An ordered sequence of classified issues plus run metadata. Single
/// use: a completed plan is never re-executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub review_request_id: String,
    pub created_at: DateTime<Utc>,
    pub state: PlanState,
    /// Fix issues first (severity descending, then file path), then
    /// ignored issues. Artifact entry ids are 1-based positions here.
    pub issues: Vec<Issue>,
}

impl Plan {
    /// Build a draft plan, ordering issues for the artifact.
    pub fn new(review_request_id: &str, mut issues: Vec<Issue>) -> Self {
        issues.sort_by(|a, b| {
            let is_ignored = |i: &Issue| matches!(i.disposition, Disposition::Ignore);
            is_ignored(a)
                .cmp(&is_ignored(b))
                .then(b.severity.cmp(&a.severity))
                .then(a.file_path.cmp(&b.file_path))
        });
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            review_request_id: review_request_id.to_string(),
            created_at: Utc::now(),
            state: PlanState::Draft,
            issues,
        }
    }

    pub fn fix_issues(&self) -> impl Iterator<Item = (usize, &Issue)> {
        self.issues
            .iter()
            .enumerate()
            .filter(|(_, i)| i.disposition == Disposition::Fix)
    }

    pub fn ignored_issues(&self) -> impl Iterator<Item = (usize, &Issue)> {
        self.issues
            .iter()
            .enumerate()
            .filter(|(_, i)| i.disposition == Disposition::Ignore)
    }

    // ── State transitions ────────────────────────────────────────

    pub fn mark_awaiting_approval(&mut self) {
        self.state = PlanState::AwaitingApproval;
    }

    /// Human confirmation. Only valid while awaiting approval.
    pub fn approve(&mut self) -> Result<(), TriageError> {
        match self.state {
            PlanState::AwaitingApproval => {
                self.state = PlanState::Approved;
                Ok(())
            }
            other => Err(TriageError::PlanNotApproved {
                plan_id: self.id.clone(),
                state: other.label().into(),
            }),
        }
    }

    pub fn start_executing(&mut self) -> Result<(), TriageError> {
        match self.state {
            PlanState::Approved => {
                self.state = PlanState::Executing;
                Ok(())
            }
            other => Err(TriageError::PlanNotApproved {
                plan_id: self.id.clone(),
                state: other.label().into(),
            }),
        }
    }

    /// Human edits after approval drop the plan back to draft; it must
    /// be re-approved before executing.
    pub fn revise(&mut self) {
        if self.state == PlanState::Approved {
            self.state = PlanState::Draft;
        }
    }

    pub fn complete(&mut self) {
        self.state = PlanState::Completed;
    }

    // ── Rendering ────────────────────────────────────────────────

    /// Render the human-reviewable markdown artifact.
    pub fn render(&self) -> String {
        let mut md = String::new();
        let comments: usize = self.issues.iter().map(|i| i.comments.len()).sum();
        let threads: usize = {
            let mut ids: Vec<String> = self
                .issues
                .iter()
                .flat_map(|i| i.thread_ids())
                .collect();
            ids.sort();
            ids.dedup();
            ids.len()
        };
        let fix = self.fix_issues().count();
        let ignored = self.ignored_issues().count();

        md.push_str("# Remediation Plan\n\n");
        md.push_str(&format!("- plan: `{}`\n", self.id));
        md.push_str(&format!("- review request: `{}`\n", self.review_request_id));
        md.push_str(&format!("- generated: {}\n", self.created_at.to_rfc3339()));
        md.push_str(&format!(
            "- comments: {comments} across {threads} threads | issues: {} (fix {fix}, ignore {ignored})\n",
            self.issues.len(),
        ));
        md.push_str(&format!("- sources: {}\n", self.source_breakdown()));

        md.push_str("\n## Issues to Fix\n");
        if fix == 0 {
            md.push_str("\nNothing to fix.\n");
        }
        for (idx, issue) in self.fix_issues() {
            md.push_str(&format!(
                "\n### [Q-{}] {} · {} · {}\n",
                idx + 1,
                issue.location(),
                issue.category,
                issue.severity,
            ));
            md.push_str(&format!("- sources: {}\n", issue.sources.join(", ")));
            md.push_str(&format!("- threads: {}\n", issue.thread_ids().join(", ")));
            md.push_str(&format!(
                "- confidence: {:.2} ({})\n",
                issue.confidence,
                band(issue.confidence)
            ));
            md.push_str(&format!("- why: {}\n", issue.rationale));
            md.push_str(&format!("- action: {}\n", suggested_action(issue)));
            for c in &issue.comments {
                md.push_str(&format!("> {}: {}\n", c.author.handle, excerpt(&c.body)));
            }
        }

        md.push_str("\n## Ignored\n");
        if ignored == 0 {
            md.push_str("\nNothing ignored.\n");
        }
        for (idx, issue) in self.ignored_issues() {
            md.push_str(&format!(
                "\n### [Q-{}] {} · {} · {}\n",
                idx + 1,
                issue.location(),
                issue.category,
                issue.severity,
            ));
            md.push_str(&format!("- threads: {}\n", issue.thread_ids().join(", ")));
            md.push_str(&format!("- reason: {}\n", issue.rationale));
            for c in &issue.comments {
                md.push_str(&format!("> {}: {}\n", c.author.handle, excerpt(&c.body)));
            }
        }

        md.push_str("\n## Summary\n\n");
        md.push_str(&format!(
            "{fix} issue(s) queued for remediation, {ignored} ignored with rationale.\n\
             Review the entries above, edit or delete any you disagree with, then run\n\
             `quorum execute <plan.md>` to confirm and dispatch fixes.\n",
        ));
        md
    }

    fn source_breakdown(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for c in self.issues.iter().flat_map(|i| i.comments.iter()) {
            match counts.iter_mut().find(|(h, _)| h == &c.author.handle) {
                Some((_, n)) => *n += 1,
                None => counts.push((c.author.handle.clone(), 1)),
            }
        }
        if counts.is_empty() {
            return "none".into();
        }
        counts
            .iter()
            .map(|(h, n)| format!("{h} ({n})"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Artifact path pair for this plan inside `dir`.
    pub fn paths(&self, dir: &Path) -> (PathBuf, PathBuf) {
        let stem = format!("plan-{}", self.review_request_id.replace('/', "-"));
        (dir.join(format!("{stem}.md")), dir.join(format!("{stem}.json")))
    }

    /// Write the markdown artifact and JSON sidecar, moving the plan to
    /// `AwaitingApproval`.
    pub fn write(&mut self, dir: &Path) -> Result<(PathBuf, PathBuf), TriageError> {
        self.mark_awaiting_approval();
        let (md_path, json_path) = self.paths(dir);
        std::fs::write(&md_path, self.render())
            .map_err(|e| TriageError::io(md_path.display().to_string(), e))?;
        self.save(&json_path)?;
        Ok((md_path, json_path))
    }

    pub fn save(&self, json_path: &Path) -> Result<(), TriageError> {
        let raw = serde_json::to_vec_pretty(self)?;
        std::fs::write(json_path, raw)
            .map_err(|e| TriageError::io(json_path.display().to_string(), e))
    }

    pub fn load(json_path: &Path) -> Result<Self, TriageError> {
        let raw = std::fs::read_to_string(json_path)
            .map_err(|e| TriageError::io(json_path.display().to_string(), e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    // ── Reconciliation with the edited artifact ──────────────────

    /// Apply human edits: returns the issue list with dispositions and
    /// rationales reflecting the artifact. Entries absent from both
    /// sections are ignored with [`REMOVED_RATIONALE`] — they still get
    /// resolved, never silently dropped.
    pub fn reconcile(&self, edited: &EditedArtifact) -> Vec<Issue> {
        self.issues
            .iter()
            .enumerate()
            .map(|(idx, issue)| {
                let mut updated = issue.clone();
                if let Some(action) = edited.fix.iter().find(|(i, _)| *i == idx).map(|(_, a)| a) {
                    updated.disposition = Disposition::Fix;
                    if !action.is_empty() {
                        updated.rationale = action.clone();
                    }
                } else if let Some(reason) =
                    edited.ignored.iter().find(|(i, _)| *i == idx).map(|(_, r)| r)
                {
                    updated.disposition = Disposition::Ignore;
                    if !reason.is_empty() {
                        updated.rationale = reason.clone();
                    }
                } else {
                    updated.disposition = Disposition::Ignore;
                    updated.rationale = REMOVED_RATIONALE.into();
                }
                updated
            })
            .collect()
    }
}

/// Fix text proposed to the worker: the loudest member's comment body,
/// trimmed to one line.
fn suggested_action(issue: &Issue) -> String {
    issue
        .comments
        .iter()
        .max_by_key(|c| c.severity.effective())
        .map(|c| excerpt(&c.body))
        .unwrap_or_else(|| issue.rationale.clone())
}

fn excerpt(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= EXCERPT_LEN {
        return line.to_string();
    }
    let cut: String = line.chars().take(EXCERPT_LEN).collect();
    format!("{cut}…")
}

// ── Artifact parsing ─────────────────────────────────────────────

/// The human-edited artifact reduced to entry ids and their edited
/// text: `(zero-based issue index, action/reason)`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EditedArtifact {
    pub fix: Vec<(usize, String)>,
    pub ignored: Vec<(usize, String)>,
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^### \[Q-(\d+)\]").unwrap()
    })
}

/// Parse a (possibly edited) plan artifact back into entry ids.
///
/// Tolerant of edits: reordered entries, rewritten `action:`/`reason:`
/// lines, and deleted blocks are all fine. Entry headers that no longer
/// carry a parseable id are a hard error — silently skipping them could
/// drop an issue the human meant to keep.
pub fn parse_artifact(markdown: &str) -> Result<EditedArtifact, TriageError> {
    let fix_start = markdown
        .find("## Issues to Fix")
        .ok_or_else(|| TriageError::PlanArtifact("missing `## Issues to Fix` section".into()))?;
    let ignored_start = markdown
        .find("## Ignored")
        .ok_or_else(|| TriageError::PlanArtifact("missing `## Ignored` section".into()))?;
    if ignored_start < fix_start {
        return Err(TriageError::PlanArtifact("sections out of order".into()));
    }
    let summary_start = markdown
        .find("## Summary")
        .filter(|&s| s > ignored_start)
        .unwrap_or(markdown.len());

    let fix_section = &markdown[fix_start..ignored_start];
    let ignored_section = &markdown[ignored_start..summary_start];

    let mut edited = EditedArtifact::default();
    for (section, bucket, text_key) in [
        (fix_section, &mut edited.fix, "action:"),
        (ignored_section, &mut edited.ignored, "reason:"),
    ] {
        for block in split_entries(section)? {
            let (idx, body) = block;
            let text = body
                .lines()
                .find_map(|l| l.trim().strip_prefix("- ").and_then(|l| l.strip_prefix(text_key)))
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            bucket.push((idx, text));
        }
    }
    Ok(edited)
}

/// Split one section into `(zero-based index, block text)` entries.
fn split_entries(section: &str) -> Result<Vec<(usize, String)>, TriageError> {
    let mut entries = Vec::new();
    let matches: Vec<_> = entry_re().captures_iter(section).collect();
    for (i, caps) in matches.iter().enumerate() {
        let whole = caps
            .get(0)
            .ok_or_else(|| TriageError::PlanArtifact("malformed entry header".into()))?;
        let one_based: usize = caps[1]
            .parse()
            .map_err(|_| TriageError::PlanArtifact(format!("bad entry id in `{}`", whole.as_str())))?;
        if one_based == 0 {
            return Err(TriageError::PlanArtifact("entry id 0 out of range".into()));
        }
        let start = whole.end();
        let end = matches
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(section.len());
        entries.push((one_based - 1, section[start..end].to_string()));
    }
    Ok(entries)
}

// ── Tests ────────────────────────────────────────────────────────
