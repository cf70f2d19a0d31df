//! habitus-watch - live transcript watcher
//!
//! Performs a catch-up sync, then watches the transcript root for changes and
//! prints each sync event as one JSON line, for composability with other
//! tools. Ctrl+C tears the watcher down cleanly.

use anyhow::{Context, Result};
use clap::Parser;
use habitus_core::ingest::SyncEngine;
use habitus_core::watch::TranscriptWatcher;
use habitus_core::{Config, Database};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "habitus-watch")]
#[command(about = "Watch transcripts and sync changes as they happen")]
#[command(version)]
struct Args {
    /// Override the transcript root directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Skip the initial catch-up sync
    #[arg(long)]
    no_catch_up: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        habitus_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("habitus-watch starting");

    let db = Database::open(&Config::database_path()).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let root = args
        .root
        .unwrap_or_else(|| config.transcripts.resolved_root());
    let engine = Arc::new(SyncEngine::new(Arc::new(db), root.clone()));

    // Catch up on anything that changed while we were not running
    if !args.no_catch_up {
        let summary = engine.sync_all().context("catch-up sync failed")?;
        eprintln!(
            "Catch-up: {} file(s) synced, {} skipped",
            summary.files_processed, summary.files_skipped
        );
        for event in &summary.events {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    let debounce = Duration::from_millis(args.debounce_ms.unwrap_or(config.watcher.debounce_ms));
    let mut watcher =
        TranscriptWatcher::start(Arc::clone(&engine), debounce).context("failed to start watcher")?;
    let events = watcher.subscribe();

    eprintln!(
        "Watching {} (debounce {}ms). Ctrl+C to stop...",
        root.display(),
        debounce.as_millis()
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    watcher.shutdown();
    eprintln!("Stopped.");
    tracing::info!("habitus-watch stopped");

    Ok(())
}
