//! Configuration loading for quorum.
//!
//! Configuration lives in `quorum.toml`, looked up in the current
//! directory first and then in the platform config directory
//! (`~/.config/quorum/quorum.toml` on Linux). Every field has a default
//! so a missing file yields a usable offline configuration (mock-friendly
//! for tests; the host base URL must be set for real runs).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default clustering proximity window, in lines.
pub const DEFAULT_PROXIMITY_WINDOW: u64 = 5;

/// Default bound on concurrently running fix tasks.
pub const DEFAULT_WORKER_POOL: usize = 4;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: HostConfig,
    pub pipeline: PipelineConfig,
    pub severity: SeverityConfig,
    pub conventions: ConventionsConfig,
    pub worker: WorkerConfig,
}

/// Review-host connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Base URL of the review host API (e.g. "https://review.example.com/api").
    pub base_url: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: "QUORUM_HOST_TOKEN".into(),
            request_timeout_secs: 30,
        }
    }
}

/// Tuning knobs for the triage stages and the dispatcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Max line gap between comments merged into one issue.
    pub proximity_window: u64,
    /// Concurrent fix-task bound.
    pub worker_pool: usize,
    /// Whole-listing retry bound for the collector.
    pub max_fetch_retries: u32,
    /// Per-page fetch timeout in seconds.
    pub page_timeout_secs: u64,
    /// Per-fix-task timeout in seconds.
    pub fix_timeout_secs: u64,
    /// Directory plan artifacts are written to.
    pub plan_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            proximity_window: DEFAULT_PROXIMITY_WINDOW,
            worker_pool: DEFAULT_WORKER_POOL,
            max_fetch_retries: 3,
            page_timeout_secs: 30,
            fix_timeout_secs: 600,
            plan_dir: PathBuf::from("."),
        }
    }
}

/// Maps reviewer source handles to their severity encoding scheme.
///
/// Scheme ids: "badge", "image-alt", "shield", "metadata". Unlisted
/// sources normalize to `Unknown`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityConfig {
    pub sources: HashMap<String, String>,
}

/// Project conventions that override bot guidance.
///
/// Each entry is a case-insensitive substring; an issue whose comments
/// argue against a listed convention is classified toward `ignore`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConventionsConfig {
    pub allow: Vec<String>,
}

/// External fix-worker invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Command to run per fix task; receives a JSON request on stdin and
    /// must print a JSON outcome on stdout.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "quorum-fix-worker".into(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config `{}`: {e}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config `{}`: {e}", path.display()))?;
        Ok(config)
    }

    /// Load from the first existing default location, or fall back to
    /// built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let mut candidates = vec![PathBuf::from("quorum.toml")];
        if let Some(dirs) = directories::ProjectDirs::from("dev", "quorum", "quorum") {
            candidates.push(dirs.config_dir().join("quorum.toml"));
        }
        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Config::default())
    }

    /// Resolve the bearer token from the configured environment variable.
    pub fn host_token(&self) -> Option<String> {
        std::env::var(&self.host.token_env).ok().filter(|t| !t.is_empty())
    }
}
