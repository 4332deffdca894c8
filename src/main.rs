//! Pausas worker binary — thin glue around the scheduler library.
//!
//! The console UI maps the API operations onto its own pages; this binary
//! covers the fleet-side concerns: running the periodic sweep, one-shot
//! janitor passes, and state inspection for operators.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pausas_core::{SystemClock, WorkerConfig};
use pausas_scheduler::{FileStore, LogNotifier, Notifier, PauseScheduler, WebhookNotifier};

#[derive(Parser)]
#[command(name = "pausas", version, about = "PVD pause scheduler worker")]
struct Cli {
    /// Path to the worker config file (defaults to ~/.pausas/config.toml).
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default worker config file and exit.
    Init,
    /// Run the periodic sweep and janitor loop.
    Sweep,
    /// Print the queue state, or one agent's view.
    Status {
        /// Agent to inspect.
        #[arg(long)]
        agent: Option<String>,
    },
    /// Run one janitor pass and exit.
    Compact,
}

fn build_scheduler(config: &WorkerConfig) -> anyhow::Result<PauseScheduler> {
    let store = FileStore::open(&config.state_dir)
        .with_context(|| format!("opening state dir {}", config.state_dir.display()))?;
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };
    Ok(PauseScheduler::new(store, Arc::new(SystemClock), notifier))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Init) {
        let path = cli.config.unwrap_or_else(WorkerConfig::default_path);
        if path.exists() {
            anyhow::bail!("config already exists at {}", path.display());
        }
        WorkerConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing config {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => WorkerConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WorkerConfig::load().context("loading worker config")?,
    };
    tracing::info!("⏸️ pausas worker starting, state dir {}", config.state_dir.display());
    let scheduler = build_scheduler(&config)?;

    match cli.command {
        Command::Init => unreachable!(),
        Command::Sweep => {
            pausas_scheduler::run_sweep(
                Arc::new(scheduler),
                Duration::from_secs(config.sweep_interval_secs),
                Duration::from_secs(config.janitor_interval_secs),
            )
            .await;
        }
        Command::Status { agent } => {
            let view = scheduler
                .view_state(agent.as_deref().unwrap_or(""))
                .context("reading scheduler state")?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Compact => {
            let removed = scheduler.compact().await.context("janitor pass")?;
            println!("removed {removed} terminal request(s)");
        }
    }
    Ok(())
}
