//! Canonical data model for the triage pipeline.
//!
//! Everything downstream of the collector speaks these types: raw
//! [`Comment`]s inside host [`Thread`]s, clustered [`Issue`]s, and the
//! fixed severity/category vocabularies every reviewer source is
//! normalized onto.

use serde::{Deserialize, Serialize};

/// Marker appended to every reply the pipeline posts to the review host.
///
/// The collector recognizes this literal and drops matching comments on
/// re-runs so the pipeline never re-ingests its own resolution notes.
pub const RESOLUTION_MARKER: &str = "<!-- posted-by:quorum -->";

// ── Severity ─────────────────────────────────────────────────────

/// Canonical severity scale all reviewer-specific encodings map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Source or token not recognized; never auto-ignored.
    Unknown,
    /// Cosmetic remark, safe to skip.
    Nitpick,
    /// Worth fixing, not urgent.
    Minor,
    /// Should be addressed in this change.
    Medium,
    /// Important defect, fix before merge.
    Major,
    /// Must-fix: correctness, security, or data loss.
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Nitpick => "NITPICK",
            Self::Minor => "MINOR",
            Self::Medium => "MEDIUM",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse the canonical lowercase id (as emitted by adapters and the
    /// plan artifact).
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "unknown" => Some(Self::Unknown),
            "nitpick" => Some(Self::Nitpick),
            "minor" => Some(Self::Minor),
            "medium" => Some(Self::Medium),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Aggregation weight. `Unknown` counts as `Medium` so unrecognized
    /// sources are never silently down-ranked below real findings.
    pub fn effective(self) -> Self {
        match self {
            Self::Unknown => Self::Medium,
            other => other,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Category ─────────────────────────────────────────────────────

/// Fixed issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Bug,
    Correctness,
    Performance,
    Accessibility,
    Style,
    Config,
    Docs,
}

impl Category {
    /// All categories in inference-priority order: when a comment matches
    /// keywords from several categories, the earliest listed wins.
    pub const ALL: &'static [Category] = &[
        Category::Security,
        Category::Bug,
        Category::Correctness,
        Category::Performance,
        Category::Accessibility,
        Category::Config,
        Category::Docs,
        Category::Style,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Bug => "bug",
            Category::Correctness => "correctness",
            Category::Performance => "performance",
            Category::Accessibility => "accessibility",
            Category::Style => "style",
            Category::Config => "config",
            Category::Docs => "docs",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "security" => Some(Category::Security),
            "bug" => Some(Category::Bug),
            "correctness" => Some(Category::Correctness),
            "performance" => Some(Category::Performance),
            "accessibility" => Some(Category::Accessibility),
            "style" => Some(Category::Style),
            "config" => Some(Category::Config),
            "docs" => Some(Category::Docs),
            _ => None,
        }
    }

    /// Keyword signals for each category, checked against the comment body.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Security => &[
                "security", "injection", "xss", "csrf", "secret", "credential",
                "vulnerab", "unsafe", "sanitiz",
            ],
            Category::Bug => &["bug", "crash", "panic", "nil", "null", "race", "deadlock", "leak"],
            Category::Correctness => &[
                "incorrect", "wrong", "off-by-one", "edge case", "overflow",
                "breaks", "broken", "regression", "compatib",
            ],
            Category::Performance => &["performance", "slow", "alloc", "o(n", "latency", "inefficien"],
            Category::Accessibility => &["accessib", "a11y", "aria", "contrast", "screen reader"],
            Category::Style => &["style", "naming", "format", "typo", "nit", "whitespace", "lint"],
            Category::Config => &["config", "flag", "environment variable", "env var", "setting"],
            Category::Docs => &["doc", "readme", "comment", "changelog", "markdown"],
        }
    }

    /// Infer a category from free-form comment text.
    ///
    /// A structured `category=<id>` token (as emitted by metadata-style
    /// reviewers) takes precedence over keyword matching. Falls back to
    /// `Style` when nothing matches, the least alarming bucket.
    pub fn infer(body: &str) -> Self {
        let lower = body.to_lowercase();
        if let Some(pos) = lower.find("category=") {
            let rest = &lower[pos + "category=".len()..];
            let token: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if let Some(cat) = Category::from_id(&token) {
                return cat;
            }
        }
        for cat in Self::ALL {
            if cat.keywords().iter().any(|k| lower.contains(k)) {
                return *cat;
            }
        }
        Category::Style
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

// ── Comment & Thread ─────────────────────────────────────────────

/// Who wrote a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable handle on the review host (e.g. "sentinel-bot", "hana.k").
    pub handle: String,
    /// Human reviewers override every automated signal.
    pub is_human: bool,
}

/// One normalized message within a review thread.
///
/// Created once per fetch and never mutated afterwards, except for
/// `severity`, which the normalizer stage fills in (comments leave the
/// collector as [`Severity::Unknown`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Opaque provider identifier.
    pub source_id: String,
    pub author: Author,
    /// Full comment text as posted.
    pub body: String,
    /// File the comment is anchored to, if inline.
    pub file_path: Option<String>,
    /// Anchored line, if inline.
    pub line: Option<u64>,
    /// The referenced diff region no longer matches current content.
    pub is_outdated: bool,
    /// Enclosing conversation on the review host.
    pub thread_id: String,
    /// Provider-specific severity markup extracted from `body`.
    pub raw_severity_token: Option<String>,
    /// Canonical severity (normalizer output).
    pub severity: Severity,
}

/// A conversation on the review host, anchored to a location or to the
/// review request as a whole. Resolution is monotonic: the host never
/// un-resolves a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub is_resolved: bool,
    pub is_outdated: bool,
    pub comments: Vec<Comment>,
}

// ── Disposition ──────────────────────────────────────────────────

/// The classifier's verdict for an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Dispatch to the fix worker.
    Fix,
    /// Record a rationale and resolve without changing code.
    Ignore,
}

impl Disposition {
    pub fn label(self) -> &'static str {
        match self {
            Self::Fix => "FIX",
            Self::Ignore => "IGNORE",
        }
    }
}

// ── Issue ────────────────────────────────────────────────────────

/// The pipeline's unit of triage: one or more comments judged to describe
/// the same underlying problem.
///
/// Invariants maintained by the clusterer:
/// - `comments` is never empty and every input comment lands in exactly
///   one issue;
/// - `severity` equals the maximum [`Severity::effective`] severity among
///   members;
/// - `sources` is the deduplicated author set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Member comments, in cluster order (line, then source order).
    pub comments: Vec<Comment>,
    pub file_path: Option<String>,
    /// Min/max member line, when any member is anchored.
    pub line_range: Option<(u64, u64)>,
    pub severity: Severity,
    /// Distinct author handles across members.
    pub sources: Vec<String>,
    pub category: Category,
    /// Classifier certainty, 0.0 - 1.0.
    pub confidence: f64,
    pub disposition: Disposition,
    /// Human-readable justification; never empty for `Ignore`.
    pub rationale: String,
}

impl Issue {
    /// Distinct enclosing thread ids across members, in first-seen order.
    pub fn thread_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for c in &self.comments {
            if !out.iter().any(|t| t == &c.thread_id) {
                out.push(c.thread_id.clone());
            }
        }
        out
    }

    /// Whether any member was written by a human reviewer.
    pub fn has_human(&self) -> bool {
        self.comments.iter().any(|c| c.author.is_human)
    }

    /// An issue is outdated only when every member comment is: a single
    /// live anchor keeps the whole cluster current.
    pub fn is_outdated(&self) -> bool {
        self.comments.iter().all(|c| c.is_outdated)
    }

    /// Number of distinct non-human sources.
    pub fn bot_source_count(&self) -> usize {
        let mut handles: Vec<&str> = self
            .comments
            .iter()
            .filter(|c| !c.author.is_human)
            .map(|c| c.author.handle.as_str())
            .collect();
        handles.sort_unstable();
        handles.dedup();
        handles.len()
    }

    /// Short location string for logs and the plan artifact.
    pub fn location(&self) -> String {
        match (&self.file_path, self.line_range) {
            (Some(path), Some((lo, hi))) if lo == hi => format!("{path}:{lo}"),
            (Some(path), Some((lo, hi))) => format!("{path}:{lo}-{hi}"),
            (Some(path), None) => path.clone(),
            (None, _) => "(review-level)".into(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(author: &str, human: bool, thread: &str) -> Comment {
        Comment {
            source_id: format!("c-{author}-{thread}"),
            author: Author {
                handle: author.into(),
                is_human: human,
            },
            body: "something looks off here".into(),
            file_path: Some("src/lib.rs".into()),
            line: Some(10),
            is_outdated: false,
            thread_id: thread.into(),
            raw_severity_token: None,
            severity: Severity::Unknown,
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Medium);
        assert!(Severity::Medium > Severity::Minor);
        assert!(Severity::Minor > Severity::Nitpick);
    }

    #[test]
    fn unknown_weighs_as_medium() {
        assert_eq!(Severity::Unknown.effective(), Severity::Medium);
        assert_eq!(Severity::Major.effective(), Severity::Major);
    }

    #[test]
    fn severity_id_round_trip() {
        for sev in [
            Severity::Unknown,
            Severity::Nitpick,
            Severity::Minor,
            Severity::Medium,
            Severity::Major,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_id(&sev.label().to_lowercase()), Some(sev));
        }
    }

    #[test]
    fn category_inference_priority() {
        // Security outranks style even when both match.
        assert_eq!(
            Category::infer("naming nit, but also a possible SQL injection"),
            Category::Security
        );
        assert_eq!(Category::infer("missing nil check"), Category::Bug);
        assert_eq!(Category::infer("this breaks backward compatibility"), Category::Correctness);
        assert_eq!(Category::infer("nothing matches here at all"), Category::Style);
    }

    #[test]
    fn category_structured_token_wins() {
        assert_eq!(
            Category::infer("looks slow <!-- category=docs -->"),
            Category::Docs
        );
    }

    #[test]
    fn issue_thread_and_source_helpers() {
        let issue = Issue {
            comments: vec![
                comment("bot-a", false, "t-1"),
                comment("bot-b", false, "t-2"),
                comment("bot-a", false, "t-1"),
            ],
            file_path: Some("src/lib.rs".into()),
            line_range: Some((10, 12)),
            severity: Severity::Major,
            sources: vec!["bot-a".into(), "bot-b".into()],
            category: Category::Bug,
            confidence: 0.8,
            disposition: Disposition::Fix,
            rationale: "two sources agree".into(),
        };
        assert_eq!(issue.thread_ids(), vec!["t-1".to_string(), "t-2".to_string()]);
        assert_eq!(issue.bot_source_count(), 2);
        assert!(!issue.has_human());
        assert_eq!(issue.location(), "src/lib.rs:10-12");
    }

    #[test]
    fn issue_outdated_requires_all_members() {
        let mut a = comment("bot-a", false, "t-1");
        a.is_outdated = true;
        let b = comment("bot-b", false, "t-2");
        let issue = Issue {
            comments: vec![a.clone(), b],
            file_path: None,
            line_range: None,
            severity: Severity::Medium,
            sources: vec![],
            category: Category::Style,
            confidence: 0.5,
            disposition: Disposition::Fix,
            rationale: String::new(),
        };
        assert!(!issue.is_outdated());

        let all_stale = Issue {
            comments: vec![a],
            ..issue
        };
        assert!(all_stale.is_outdated());
    }
}
