//! CLI entry point for the download queue worker pool.

use anyhow::{Context, Result};
use clap::Parser;
use dlqueue_core::{WorkerPool, YtDlpEngine};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_config(args.config.as_deref(), args.no_config)?;
    if let (true, Some(path)) = (loaded.loaded_from_file(), loaded.path.as_deref()) {
        info!(path = %path.display(), "Loaded config file");
    }

    let config = app_config::build_pool_config(&args, loaded.config.as_ref())?;
    debug!(?config, "Resolved configuration");
    info!(
        workers = config.workers,
        store = %config.store.describe(),
        program = %config.fetch.program.display(),
        "dlqueue starting"
    );

    let store = config.store.open();
    debug!(backend = store.backend(), "Opened queue store");
    let engine = YtDlpEngine::new(config.fetch.program.clone());
    let pool = WorkerPool::new(config.workers, store, engine, config.fetch)
        .context("Failed to build worker pool")?;

    let report = pool.run().await;

    for worker in &report.workers {
        debug!(
            worker = %worker.worker,
            processed = worker.processed(),
            done = worker.done,
            failed = worker.failed,
            exit = %worker.exit,
            "Worker report"
        );
    }
    if report.panicked > 0 {
        warn!(panicked = report.panicked, "Some workers panicked");
    }

    info!(
        done = report.done(),
        failed = report.failed(),
        resolve_failures = report.resolve_failures(),
        "Queue drained"
    );

    Ok(())
}
