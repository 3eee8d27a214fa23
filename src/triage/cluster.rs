//! Issue clustering: collapse comments that describe the same problem.
//!
//! Independent reviewers habitually flag the same defect at slightly
//! different line offsets (the function signature vs. the offending
//! statement inside it), so comments on the same file within a small
//! line window merge into one [`Issue`] regardless of author. The sweep
//! is deterministic for a fixed window and input order: comments are
//! sorted by line (stable, so equal lines keep source order) and a new
//! issue opens whenever the gap to the previous comment exceeds the
//! window. A comment exactly on the boundary between two candidate
//! windows therefore lands in the earlier-opened one.

use std::collections::BTreeMap;

use crate::triage::types::{Category, Comment, Disposition, Issue, Severity};

/// Partition a normalized comment set into issues.
///
/// Guarantees:
/// - every input comment lands in exactly one issue (coverage);
/// - issue severity is the max effective member severity (monotonicity);
/// - re-running on the same input yields the same partition (idempotence).
pub fn cluster(comments: Vec<Comment>, proximity_window: u64) -> Vec<Issue> {
    let total = comments.len();

    // Exact-path grouping; BTreeMap keeps file order stable across runs.
    let mut by_file: BTreeMap<String, Vec<Comment>> = BTreeMap::new();
    // Comments with no file anchor: one issue per thread, in input order.
    let mut floating: Vec<(String, Vec<Comment>)> = Vec::new();

    for comment in comments {
        match comment.file_path.clone() {
            Some(path) => by_file.entry(path).or_default().push(comment),
            None => match floating.iter_mut().find(|(t, _)| *t == comment.thread_id) {
                Some((_, members)) => members.push(comment),
                None => floating.push((comment.thread_id.clone(), vec![comment])),
            },
        }
    }

    let mut issues: Vec<Issue> = Vec::new();

    for (path, group) in by_file {
        // File-anchored comments without a line cannot join a proximity
        // window; they cluster per thread like review-level comments.
        let (anchored, unanchored): (Vec<Comment>, Vec<Comment>) =
            group.into_iter().partition(|c| c.line.is_some());

        let mut sorted = anchored;
        sorted.sort_by_key(|c| c.line.unwrap_or(0));

        let mut current: Vec<Comment> = Vec::new();
        for comment in sorted {
            let line = comment.line.unwrap_or(0);
            let split = current
                .last()
                .and_then(|prev| prev.line)
                .is_some_and(|prev_line| line.saturating_sub(prev_line) > proximity_window);
            if split {
                issues.push(build_issue(std::mem::take(&mut current)));
            }
            current.push(comment);
        }
        if !current.is_empty() {
            issues.push(build_issue(current));
        }

        let mut per_thread: Vec<(String, Vec<Comment>)> = Vec::new();
        for comment in unanchored {
            match per_thread.iter_mut().find(|(t, _)| *t == comment.thread_id) {
                Some((_, members)) => members.push(comment),
                None => per_thread.push((comment.thread_id.clone(), vec![comment])),
            }
        }
        for (_, members) in per_thread {
            issues.push(build_issue(members));
        }

        tracing::debug!(file = path.as_str(), "Clustered file group");
    }

    for (_, members) in floating {
        issues.push(build_issue(members));
    }

    let clustered: usize = issues.iter().map(|i| i.comments.len()).sum();
    debug_assert_eq!(clustered, total);
    tracing::info!(comments = total, issues = issues.len(), "Clustering complete");

    issues
}

/// Aggregate one member set into an issue. Classification fields are
/// placeholders until the classifier stage runs.
fn build_issue(members: Vec<Comment>) -> Issue {
    debug_assert!(!members.is_empty());

    let severity = members
        .iter()
        .map(|c| c.severity.effective())
        .max()
        .unwrap_or(Severity::Medium);

    let mut sources: Vec<String> = Vec::new();
    for c in &members {
        if !sources.iter().any(|s| s == &c.author.handle) {
            sources.push(c.author.handle.clone());
        }
    }

    let lines: Vec<u64> = members.iter().filter_map(|c| c.line).collect();
    let line_range = match (lines.iter().min(), lines.iter().max()) {
        (Some(&lo), Some(&hi)) => Some((lo, hi)),
        _ => None,
    };

    // The loudest member names the problem.
    let top = members
        .iter()
        .max_by_key(|c| c.severity.effective())
        .unwrap_or(&members[0]);
    let category = Category::infer(&top.body);

    Issue {
        file_path: members[0].file_path.clone(),
        line_range,
        severity,
        sources,
        category,
        confidence: 0.0,
        disposition: Disposition::Fix,
        rationale: String::new(),
        comments: members,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::types::Author;

    fn comment(
        handle: &str,
        file: Option<&str>,
        line: Option<u64>,
        severity: Severity,
        thread: &str,
    ) -> Comment {
        Comment {
            source_id: format!("c-{handle}-{thread}-{}", line.unwrap_or(0)),
            author: Author {
                handle: handle.into(),
                is_human: false,
            },
            body: "missing nil check".into(),
            file_path: file.map(String::from),
            line,
            is_outdated: false,
            thread_id: thread.into(),
            raw_severity_token: None,
            severity,
        }
    }

    #[test]
    fn nearby_comments_merge_across_authors() {
        // Scenario A: auth.go:40 (Major) + auth.go:42 (Minor), window 5.
        let comments = vec![
            comment("bot-a", Some("auth.go"), Some(40), Severity::Major, "t-1"),
            comment("bot-b", Some("auth.go"), Some(42), Severity::Minor, "t-2"),
        ];
        let issues = cluster(comments, 5);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Major);
        assert_eq!(issues[0].sources, vec!["bot-a".to_string(), "bot-b".to_string()]);
        assert_eq!(issues[0].line_range, Some((40, 42)));
    }

    #[test]
    fn gap_beyond_window_splits() {
        let comments = vec![
            comment("bot-a", Some("auth.go"), Some(40), Severity::Major, "t-1"),
            comment("bot-b", Some("auth.go"), Some(46), Severity::Minor, "t-2"),
        ];
        let issues = cluster(comments, 5);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn gap_exactly_window_joins_earlier_cluster() {
        // Distance of exactly `window` is within the window; the sweep
        // attaches the comment to the earlier-opened issue.
        let comments = vec![
            comment("bot-a", Some("auth.go"), Some(40), Severity::Medium, "t-1"),
            comment("bot-b", Some("auth.go"), Some(45), Severity::Medium, "t-2"),
            comment("bot-c", Some("auth.go"), Some(50), Severity::Medium, "t-3"),
        ];
        let issues = cluster(comments, 5);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].comments.len(), 3);
    }

    #[test]
    fn different_files_never_merge() {
        let comments = vec![
            comment("bot-a", Some("a.rs"), Some(10), Severity::Medium, "t-1"),
            comment("bot-a", Some("b.rs"), Some(10), Severity::Medium, "t-2"),
        ];
        assert_eq!(cluster(comments, 5).len(), 2);
    }

    #[test]
    fn floating_comments_cluster_per_thread() {
        let comments = vec![
            comment("bot-a", None, None, Severity::Medium, "t-1"),
            comment("hana", None, None, Severity::Unknown, "t-1"),
            comment("bot-b", None, None, Severity::Minor, "t-2"),
        ];
        let issues = cluster(comments, 5);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].comments.len(), 2);
        assert!(issues[0].file_path.is_none());
    }

    #[test]
    fn unknown_severity_weighs_as_medium() {
        let comments = vec![
            comment("bot-a", Some("a.rs"), Some(1), Severity::Unknown, "t-1"),
            comment("bot-b", Some("a.rs"), Some(2), Severity::Minor, "t-2"),
        ];
        let issues = cluster(comments, 5);
        assert_eq!(issues[0].severity, Severity::Medium);
    }

    #[test]
    fn coverage_and_idempotence() {
        let comments = vec![
            comment("bot-a", Some("a.rs"), Some(10), Severity::Major, "t-1"),
            comment("bot-b", Some("a.rs"), Some(12), Severity::Minor, "t-2"),
            comment("bot-a", Some("a.rs"), Some(90), Severity::Medium, "t-3"),
            comment("bot-c", Some("b.rs"), None, Severity::Nitpick, "t-4"),
            comment("hana", None, None, Severity::Unknown, "t-5"),
        ];

        let first = cluster(comments.clone(), 5);
        let second = cluster(comments.clone(), 5);

        // Coverage: every comment in exactly one issue.
        let mut seen: Vec<String> = first
            .iter()
            .flat_map(|i| i.comments.iter().map(|c| c.source_id.clone()))
            .collect();
        seen.sort();
        let mut expected: Vec<String> = comments.iter().map(|c| c.source_id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        // Idempotence: identical partition shape on re-run.
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.file_path, b.file_path);
            assert_eq!(a.line_range, b.line_range);
            assert_eq!(a.comments.len(), b.comments.len());
        }
    }

    #[test]
    fn severity_monotonicity_invariant() {
        let comments = vec![
            comment("bot-a", Some("a.rs"), Some(10), Severity::Critical, "t-1"),
            comment("bot-b", Some("a.rs"), Some(11), Severity::Nitpick, "t-2"),
            comment("bot-c", Some("a.rs"), Some(12), Severity::Unknown, "t-3"),
        ];
        for issue in cluster(comments, 5) {
            let max = issue
                .comments
                .iter()
                .map(|c| c.severity.effective())
                .max()
                .unwrap();
            assert_eq!(issue.severity, max);
        }
    }
}
