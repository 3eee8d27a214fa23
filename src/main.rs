//! quorum CLI entry point.
//!
//! Two commands mirror the two halves of the pipeline: `triage` writes
//! an approvable plan and halts; `execute` confirms and runs it. Exit
//! codes: 0 success, 2 partial (some fix tasks failed, reported in the
//! summary), 1 fatal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use quorum::config::Config;
use quorum::host::{CommandFixWorker, HttpReviewHost};
use quorum::{remedy, triage};

#[derive(Parser)]
#[command(name = "quorum", version, about = "Triage review feedback into one approved fix plan")]
struct Cli {
    /// Path to quorum.toml (defaults to ./quorum.toml, then the user
    /// config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect, cluster, and classify review feedback; write a plan
    /// awaiting approval.
    Triage {
        /// Review request identifier on the host.
        review_request_id: String,
        /// Override the plan output directory.
        #[arg(long)]
        plan_dir: Option<PathBuf>,
    },
    /// Confirm and execute an approved plan artifact.
    Execute {
        /// Path to the (possibly edited) plan markdown.
        plan: PathBuf,
        /// Skip the interactive confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quorum=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Triage {
            review_request_id,
            plan_dir,
        } => {
            if let Some(dir) = plan_dir {
                config.pipeline.plan_dir = dir;
            }
            let host = connect_host(&config)?;
            let outcome = triage::run_triage(&host, &config, &review_request_id)
                .await
                .context("triage failed")?;

            let fix = outcome.plan.fix_issues().count();
            let ignored = outcome.plan.ignored_issues().count();
            println!(
                "plan {}: {} issue(s) to fix, {} ignored",
                outcome.plan.id, fix, ignored
            );
            println!(
                "review the plan, then run: quorum execute {}",
                outcome.artifact_path.display()
            );
            Ok(())
        }
        Command::Execute { plan, yes } => {
            if !yes && !confirm_approval(&plan)? {
                // Rejection is always safe: no threads touched, no
                // fixes attempted.
                eprintln!("plan rejected; no actions taken");
                std::process::exit(1);
            }

            let host = connect_host(&config)?;
            let worker = Arc::new(CommandFixWorker::new(&config.worker));

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received; unstarted fix tasks will not dispatch");
                    signal_cancel.cancel();
                }
            });

            let summary = remedy::run_execute(&host, worker, &config, &plan, cancel)
                .await
                .context("execute failed")?;
            print!("{}", summary.render());
            if summary.is_partial() {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

fn connect_host(config: &Config) -> anyhow::Result<HttpReviewHost> {
    anyhow::ensure!(
        !config.host.base_url.is_empty(),
        "host.base_url is not configured; set it in quorum.toml"
    );
    let token = config.host_token();
    if token.is_none() {
        tracing::warn!(
            env = config.host.token_env.as_str(),
            "No host token in environment; requests will be unauthenticated"
        );
    }
    Ok(HttpReviewHost::new(&config.host, token))
}

fn confirm_approval(plan: &std::path::Path) -> anyhow::Result<bool> {
    let approved = dialoguer::Confirm::new()
        .with_prompt(format!(
            "Approve and execute the plan in {}?",
            plan.display()
        ))
        .default(false)
        .interact()
        .context("approval prompt failed")?;
    Ok(approved)
}
