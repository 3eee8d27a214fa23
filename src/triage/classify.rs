//! Disposition classification: decide `fix` vs `ignore` per issue.
//!
//! The rules are ordered and total — classification never fails, and an
//! issue can never be silently dropped:
//!
//! 1. Any human-authored member forces `fix` at high confidence.
//! 2. Otherwise a confidence score starts neutral and moves with the
//!    corroboration signals (multi-source agreement, thread freshness)
//!    and against the noise signals (single uncorroborated bot,
//!    non-source artifact, outdated thread, project-convention match).
//! 3. Below the fix threshold the issue is ignored, always with a
//!    rationale suitable for posting back to the review host.

use crate::triage::types::{Category, Disposition, Issue};

/// Neutral starting confidence.
const BASE_CONFIDENCE: f64 = 0.5;
/// Two or more distinct bot sources flagged the same issue.
const MULTI_SOURCE_BONUS: f64 = 0.25;
/// The anchored diff region still matches current content.
const FRESH_THREAD_BONUS: f64 = 0.1;
/// One bot, no corroboration.
const SINGLE_SOURCE_PENALTY: f64 = 0.15;
/// Documentation/config file outside the security category.
const NON_SOURCE_PENALTY: f64 = 0.2;
/// Every member comment anchors to a stale diff region.
const OUTDATED_PENALTY: f64 = 0.3;
/// The guidance argues against a configured project convention.
const CONVENTION_PENALTY: f64 = 0.25;
/// Confidence assigned to human-forced fixes.
const HUMAN_CONFIDENCE: f64 = 0.95;
/// Scores below this dispose to `ignore`.
const FIX_THRESHOLD: f64 = 0.4;

/// Classify one issue in place: fills `disposition`, `confidence`, and
/// `rationale`. Total — unclassifiable edge cases default to `fix` at
/// low confidence rather than erroring or dropping the issue.
pub fn classify(issue: &mut Issue, conventions: &[String]) {
    if issue.has_human() {
        // Human feedback is never auto-ignored, regardless of every
        // other signal.
        issue.disposition = Disposition::Fix;
        issue.confidence = HUMAN_CONFIDENCE;
        issue.rationale = "flagged by a human reviewer".into();
        return;
    }

    if issue.comments.is_empty() {
        issue.disposition = Disposition::Fix;
        issue.confidence = 0.1;
        issue.rationale = "unclassifiable issue surfaced for manual review".into();
        return;
    }

    let mut score = BASE_CONFIDENCE;
    let mut for_fix: Vec<String> = Vec::new();
    let mut against: Vec<String> = Vec::new();

    let bots = issue.bot_source_count();
    if bots >= 2 {
        score += MULTI_SOURCE_BONUS;
        for_fix.push(format!("{bots} independent sources agree"));
    } else {
        score -= SINGLE_SOURCE_PENALTY;
        against.push("single uncorroborated bot source".into());
    }

    if issue.is_outdated() {
        score -= OUTDATED_PENALTY;
        against.push("thread is outdated (diff region has changed)".into());
    } else {
        score += FRESH_THREAD_BONUS;
    }

    if issue.category != Category::Security
        && issue
            .file_path
            .as_deref()
            .is_some_and(is_non_source_artifact)
    {
        score -= NON_SOURCE_PENALTY;
        against.push("non-source file".into());
    }

    if let Some(convention) = matched_convention(issue, conventions) {
        score -= CONVENTION_PENALTY;
        against.push(format!("contradicts project convention: {convention}"));
    }

    issue.confidence = score.clamp(0.0, 1.0);
    if issue.confidence >= FIX_THRESHOLD {
        issue.disposition = Disposition::Fix;
        issue.rationale = if for_fix.is_empty() {
            format!("surfaced at {} confidence for review", band(issue.confidence))
        } else {
            for_fix.join("; ")
        };
    } else {
        issue.disposition = Disposition::Ignore;
        if matches!(issue.category, Category::Style | Category::Docs) {
            against.push("stylistic category".into());
        }
        issue.rationale = against.join("; ");
        debug_assert!(!issue.rationale.is_empty());
    }
}

/// Classify a whole batch, returning it for chaining.
pub fn classify_all(mut issues: Vec<Issue>, conventions: &[String]) -> Vec<Issue> {
    for issue in &mut issues {
        classify(issue, conventions);
        tracing::debug!(
            location = issue.location().as_str(),
            disposition = issue.disposition.label(),
            confidence = issue.confidence,
            "Classified issue"
        );
    }
    issues
}

/// Confidence band label for artifacts and logs.
pub fn band(confidence: f64) -> &'static str {
    if confidence >= 0.75 {
        "high"
    } else if confidence >= FIX_THRESHOLD {
        "medium"
    } else {
        "low"
    }
}

/// Pure documentation/config artifacts, as opposed to source code.
fn is_non_source_artifact(path: &str) -> bool {
    const DOC_CONFIG_EXT: &[&str] = &[
        "md", "markdown", "txt", "rst", "adoc", "yml", "yaml", "toml", "json", "ini", "cfg",
        "conf", "lock",
    ];
    const DOC_NAMES: &[&str] = &["LICENSE", "NOTICE", "CHANGELOG", "AUTHORS", "CODEOWNERS"];

    let name = path.rsplit('/').next().unwrap_or(path);
    if DOC_NAMES.iter().any(|n| name.eq_ignore_ascii_case(n)) {
        return true;
    }
    name.rsplit_once('.')
        .map(|(_, ext)| DOC_CONFIG_EXT.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// First configured convention that the issue's guidance argues about.
fn matched_convention<'a>(issue: &Issue, conventions: &'a [String]) -> Option<&'a str> {
    for convention in conventions {
        let needle = convention.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if issue
            .comments
            .iter()
            .any(|c| c.body.to_lowercase().contains(&needle))
        {
            return Some(convention);
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────────
