//! # habitus-core
//!
//! Core library for habitus - a behavioral pattern miner for coding-assistant
//! transcripts.
//!
//! This library provides:
//! - A transcript parser reconstructing prompt/response turns from JSONL logs
//! - A sync engine performing idempotent, transactional ingestion
//! - A debounced change watcher that keeps the store current
//! - Five pattern-mining analyses over the accumulated history
//!
//! ## Architecture
//!
//! Data flows one way:
//! raw transcript file → parser → sync engine (persist) → record store →
//! pattern mining (on demand) → pattern report. The watcher triggers the sync
//! engine on file changes and fans sync events out to subscribers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use habitus_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{SyncEngine, SyncSummary};
pub use types::*;
pub use watch::TranscriptWatcher;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod mining;
pub mod types;
pub mod watch;
