//! External fix worker invoked as a subprocess.
//!
//! Protocol: the worker command receives one [`FixRequest`] as JSON on
//! stdin and prints one [`FixOutcome`] as JSON on stdout. Exit code and
//! stderr are only consulted when stdout is unusable, so a worker can
//! log freely to stderr.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::traits::{FixOutcome, FixRequest, FixStatus, FixWorker};
use crate::config::WorkerConfig;
use crate::error::TriageError;

/// Fix worker that shells out to a configured command.
pub struct CommandFixWorker {
    command: String,
    args: Vec<String>,
}

impl CommandFixWorker {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl FixWorker for CommandFixWorker {
    async fn apply_fix(&self, request: &FixRequest) -> Result<FixOutcome, TriageError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TriageError::Host(format!("fix worker `{}`: spawn: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| TriageError::Host(format!("fix worker stdin: {e}")))?;
            // Dropping stdin closes the pipe so the worker sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TriageError::Host(format!("fix worker wait: {e}")))?;

        match serde_json::from_slice::<FixOutcome>(&output.stdout) {
            Ok(outcome) => Ok(outcome),
            Err(_) if !output.status.success() => Ok(FixOutcome {
                status: FixStatus::Failure,
                note: Some(format!(
                    "worker exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )),
            }),
            Err(e) => Err(TriageError::Host(format!(
                "fix worker produced unparseable output: {e}"
            ))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
