//! Requeue CLI
//!
//! Re-runs CI workflow runs for labeled pull requests. One invocation
//! handles one repository event: a label change on a pull request, a
//! scheduled/broad scan, or a workflow-completion callback. Two control
//! labels drive behavior: the once-label requests a single retry and is
//! consumed on every handling pass, the continuous label keeps retrying
//! until all relevant runs are green (or cancelled).

mod config;
mod event;
mod github;
mod labels;
mod policy;
mod router;
mod selector;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::event::EventContext;
use crate::github::GithubClient;
use crate::router::Router;

/// Re-run CI workflow runs for labeled pull requests
#[derive(Parser)]
#[command(name = "requeue")]
#[command(about = "Re-runs CI workflow runs for labeled pull requests")]
#[command(version)]
struct Cli {
    /// GitHub API token
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    token: String,

    /// Label that requests a single retry and is consumed after one pass
    #[arg(long, env = "INPUT_ONCE_LABEL")]
    once_label: Option<String>,

    /// Label that keeps retrying until all runs are green or cancelled
    #[arg(long, env = "INPUT_CONTINUOUS_LABEL")]
    continuous_label: Option<String>,

    /// Comma-separated labels whose addition/removal triggers an
    /// unconditional rerun pass
    #[arg(long, env = "INPUT_TRIGGER_LABELS")]
    trigger_labels: Option<String>,

    /// Workflow identifier or filename whose runs are managed
    #[arg(long, env = "INPUT_WORKFLOW")]
    workflow: String,

    /// Re-run only the failed jobs of a run instead of the whole run
    #[arg(long, env = "INPUT_FAILED_JOBS_ONLY")]
    failed_jobs_only: bool,

    /// Repository in owner/name form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Name of the event that triggered this invocation
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: String,

    /// Path to the JSON event payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Configuration problems abort before any API call is made.
    let config = Config::new(
        cli.token,
        cli.once_label,
        cli.continuous_label,
        cli.trigger_labels,
        cli.workflow,
        cli.failed_jobs_only,
        &cli.repository,
    )
    .context("Invalid configuration")?;

    let context = EventContext::load(cli.event_name, &cli.event_path)?;
    info!(
        event = %context.event_name,
        workflow = %config.workflow,
        repository = %format!("{}/{}", config.owner, config.repo),
        "Handling repository event"
    );

    let gateway = GithubClient::new(&config).context("Failed to build GitHub client")?;
    Router::new(&gateway, &config).dispatch(&context).await
}
