//! habitus-sync - CLI tool to sync coding-assistant transcripts to the database
//!
//! Discovers transcript files under the configured root and performs a
//! catch-up sync, respecting each session's sync cursor.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/habitus/data.db (~/.local/share/habitus/data.db)
//! - Logs: $XDG_STATE_HOME/habitus/habitus.log (~/.local/state/habitus/habitus.log)
//! - Config: $XDG_CONFIG_HOME/habitus/config.toml (~/.config/habitus/config.toml)

use anyhow::{Context, Result};
use clap::Parser;
use habitus_core::ingest::SyncEngine;
use habitus_core::{Config, Database};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "habitus-sync")]
#[command(about = "Sync coding-assistant transcripts to the database")]
#[command(version)]
struct Args {
    /// Override the transcript root directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Verbose output (list per-file errors)
    #[arg(short, long)]
    verbose: bool,

    /// Dry run - discover files but don't sync
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        habitus_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("habitus-sync starting");

    // Open database
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());

    let root = args
        .root
        .unwrap_or_else(|| config.transcripts.resolved_root());
    let engine = SyncEngine::new(Arc::new(db), root.clone());

    let files = engine
        .discover_files()
        .context("failed to discover transcript files")?;
    println!("Discovered {} transcript file(s) under {}", files.len(), root.display());

    if args.dry_run {
        for file in &files {
            println!("  {}", file.display());
        }
        println!("\nDry run - no sync performed");
        tracing::info!("Dry run complete");
        return Ok(());
    }

    // Run sync with progress bar
    println!();
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let summary = engine
        .sync_all_with_progress(|current, total, path| {
            if current == 0 {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("...")
                    .to_string(),
            );
        })
        .context("sync failed")?;

    pb.finish_and_clear();

    // Print stats
    println!("\nSync complete:");
    println!("  Files processed: {}", summary.files_processed);
    println!("  Files skipped:   {}", summary.files_skipped);
    println!("  Change events:   {}", summary.events.len());

    // Show errors
    if !summary.errors.is_empty() {
        println!("\nErrors ({}):", summary.errors.len());
        if args.verbose {
            for (path, err) in &summary.errors {
                println!("  {}: {}", path.display(), err);
            }
        } else {
            println!("  (re-run with --verbose for details)");
        }
    }

    tracing::info!(
        files_processed = summary.files_processed,
        files_skipped = summary.files_skipped,
        events = summary.events.len(),
        "habitus-sync complete"
    );

    Ok(())
}
