//! Severity normalization across heterogeneous reviewer encodings.
//!
//! Every reviewer source badges its findings differently: emoji/text
//! badges, image alt-text, shields.io-style priority labels, or embedded
//! structured metadata. Each encoding is one [`SeverityScheme`] — a pure
//! `body -> token -> Severity` function — and the [`AdapterRegistry`]
//! maps source handles onto schemes. Unrecognized sources and unparseable
//! tokens normalize to [`Severity::Unknown`], which is never auto-ignored
//! (it weighs as `Medium` during clustering).
//!
//! Adding a reviewer source is adding one scheme mapping in config; the
//! clusterer and classifier never change.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::SeverityConfig;
use crate::triage::types::{Comment, Severity};

// ── Schemes ──────────────────────────────────────────────────────

/// Closed set of known severity encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityScheme {
    /// Leading emoji or bracketed text badge: `🔴 ...`, `[major] ...`.
    Badge,
    /// Markdown image alt-text: `![Critical](...)`.
    ImageAlt,
    /// Priority labels: `P0`..`P4` or `priority-high` shield URLs.
    Shield,
    /// Embedded key/value metadata: `<!-- severity: major -->`.
    Metadata,
}

impl SeverityScheme {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "badge" => Some(Self::Badge),
            "image-alt" => Some(Self::ImageAlt),
            "shield" => Some(Self::Shield),
            "metadata" => Some(Self::Metadata),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Badge => "badge",
            Self::ImageAlt => "image-alt",
            Self::Shield => "shield",
            Self::Metadata => "metadata",
        }
    }

    /// Extract this scheme's raw severity token from a comment body.
    pub fn extract_token(self, body: &str) -> Option<String> {
        let re = match self {
            Self::Badge => badge_re(),
            Self::ImageAlt => image_alt_re(),
            Self::Shield => shield_re(),
            Self::Metadata => metadata_re(),
        };
        // The shield pattern alternates between a P-token group and a
        // word-label group; take whichever matched.
        re.captures(body)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Map an extracted token onto the canonical scale.
    pub fn parse_token(self, token: &str) -> Severity {
        let lower = token.to_lowercase();
        match self {
            Self::Shield => {
                // P0..P4 first, then word labels.
                match lower.as_str() {
                    "p0" => Severity::Critical,
                    "p1" => Severity::Major,
                    "p2" => Severity::Medium,
                    "p3" => Severity::Minor,
                    "p4" => Severity::Nitpick,
                    word => severity_word(word),
                }
            }
            Self::Badge => match lower.as_str() {
                "🔴" => Severity::Critical,
                "🟠" => Severity::Major,
                "🟡" => Severity::Medium,
                "🔵" => Severity::Minor,
                "⚪" => Severity::Nitpick,
                word => severity_word(word),
            },
            Self::ImageAlt | Self::Metadata => severity_word(&lower),
        }
    }
}

/// Canonical word mapping shared by the text-bearing schemes.
fn severity_word(word: &str) -> Severity {
    match word {
        "critical" | "blocker" => Severity::Critical,
        "major" | "high" => Severity::Major,
        "medium" | "moderate" => Severity::Medium,
        "minor" | "low" => Severity::Minor,
        "nitpick" | "nit" | "trivial" | "info" => Severity::Nitpick,
        _ => Severity::Unknown,
    }
}

fn badge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:\*\*)?\[?(🔴|🟠|🟡|🔵|⚪|critical|blocker|major|high|medium|minor|low|nitpick|nit|trivial)\]?(?:\*\*)?[\s:]")
            .unwrap()
    })
}

fn image_alt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!\[(?:severity[: ]*)?([A-Za-z]+)\]\(")
            .unwrap()
    })
}

fn shield_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(P[0-4])\b|priority[-_: ]+(critical|high|major|medium|moderate|low|minor|trivial|nitpick)")
            .unwrap()
    })
}

fn metadata_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)severity\s*[:=]\s*([a-z]+)")
            .unwrap()
    })
}

// ── Registry ─────────────────────────────────────────────────────

/// Source-handle → scheme lookup built from configuration.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    sources: HashMap<String, SeverityScheme>,
}

impl AdapterRegistry {
    /// Build from config, logging and skipping unknown scheme ids.
    pub fn from_config(config: &SeverityConfig) -> Self {
        let mut sources = HashMap::new();
        for (handle, scheme_id) in &config.sources {
            match SeverityScheme::from_id(scheme_id) {
                Some(scheme) => {
                    sources.insert(handle.clone(), scheme);
                }
                None => {
                    tracing::warn!(
                        source = handle.as_str(),
                        scheme = scheme_id.as_str(),
                        "Unknown severity scheme, source will normalize to UNKNOWN"
                    );
                }
            }
        }
        Self { sources }
    }

    #[cfg(test)]
    pub fn with_sources(pairs: &[(&str, SeverityScheme)]) -> Self {
        Self {
            sources: pairs
                .iter()
                .map(|(h, s)| (h.to_string(), *s))
                .collect(),
        }
    }

    pub fn scheme_for(&self, handle: &str) -> Option<SeverityScheme> {
        self.sources.get(handle).copied()
    }

    /// Normalize one comment: extract the raw token per the source's
    /// scheme and fill the canonical severity. Pure and stateless; same
    /// input always yields the same output.
    pub fn normalize(&self, mut comment: Comment) -> Comment {
        let Some(scheme) = self.scheme_for(&comment.author.handle) else {
            comment.severity = Severity::Unknown;
            return comment;
        };
        match scheme.extract_token(&comment.body) {
            Some(token) => {
                comment.severity = scheme.parse_token(&token);
                comment.raw_severity_token = Some(token);
            }
            None => comment.severity = Severity::Unknown,
        }
        comment
    }

    pub fn normalize_all(&self, comments: Vec<Comment>) -> Vec<Comment> {
        comments.into_iter().map(|c| self.normalize(c)).collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────
