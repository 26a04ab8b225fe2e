//! Small driver that schedules a handful of tasks and prints their final
//! snapshots as JSON.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tempo_core::{load_dotenv, SchedulerConfig};
use tempo_scheduler::{Action, Scheduler, TracingObserver};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tempo-demo", about = "Run a short delayed-task scheduling demo")]
struct Cli {
    /// Path to a scheduler TOML config. Defaults plus TEMPO_* env vars otherwise.
    #[arg(long, env = "TEMPO_CONFIG")]
    config: Option<String>,

    /// How long to let the scheduler run before shutting down.
    #[arg(long, env = "TEMPO_RUN_FOR_MS", default_value_t = 2_000)]
    run_for_ms: u64,

    /// Abandon queued work on exit instead of waiting for running tasks.
    #[arg(long)]
    no_drain: bool,
}

fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let cfg = SchedulerConfig::from_file(path)
                .with_context(|| format!("failed to load scheduler config from {path}"))?;
            info!(path = %path, "loaded scheduler config");
            cfg
        }
        None => SchedulerConfig::from_env()?,
    };
    config.log_summary();

    let scheduler = Scheduler::builder(config).observer(TracingObserver).start()?;

    let beats = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&beats);
    scheduler.schedule_recurring(
        "heartbeat",
        Utc::now(),
        Duration::from_millis(250),
        Some(5),
        Action::infallible(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            info!(beat = n, "heartbeat");
        }),
    )?;

    scheduler.schedule_after(
        "report",
        Duration::from_millis(500),
        Action::infallible(|| info!("generating report")),
    )?;

    scheduler.schedule_after(
        "flaky-upload",
        Duration::from_millis(300),
        Action::new(|| anyhow::bail!("upstream returned 503")),
    )?;

    // Scheduled far enough out that it is cancelled before it ever runs.
    let reminder = scheduler.schedule_after(
        "reminder",
        Duration::from_secs(3_600),
        Action::infallible(|| warn!("reminder should never fire")),
    )?;
    scheduler.cancel(reminder)?;

    std::thread::sleep(Duration::from_millis(cli.run_for_ms));
    scheduler.shutdown(!cli.no_drain);

    info!(beats = beats.load(Ordering::SeqCst), "demo finished");
    println!("{}", serde_json::to_string_pretty(&scheduler.tasks())?);
    Ok(())
}
