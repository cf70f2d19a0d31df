//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/habitus/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/habitus/` (~/.config/habitus/)
//! - Data: `$XDG_DATA_HOME/habitus/` (~/.local/share/habitus/)
//! - State/Logs: `$XDG_STATE_HOME/habitus/` (~/.local/state/habitus/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Transcript source configuration
    #[serde(default)]
    pub transcripts: TranscriptConfig,

    /// Change watcher configuration
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Pattern mining defaults
    #[serde(default)]
    pub mining: MiningConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transcript source configuration
#[derive(Debug, Deserialize, Default)]
pub struct TranscriptConfig {
    /// Override path for the transcript root directory.
    ///
    /// Defaults to `~/.claude` when unset. Transcript files are discovered
    /// under `<root>/projects/*/*.jsonl`.
    pub root: Option<PathBuf>,
}

impl TranscriptConfig {
    /// Resolve the transcript root, falling back to the default location.
    pub fn resolved_root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude"))
    }
}

/// Change watcher configuration
#[derive(Debug, Deserialize)]
pub struct WatcherConfig {
    /// Debounce window in milliseconds per transcript file.
    ///
    /// Transcripts are appended rapidly during an active session; each raw
    /// notification for a path resets its pending timer, and a sync runs only
    /// once the window elapses quietly.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    400
}

/// Pattern mining defaults
#[derive(Debug, Deserialize)]
pub struct MiningConfig {
    /// Lookback window in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Minimum occurrence/session count for a pattern to be reported
    #[serde(default = "default_min_frequency")]
    pub min_frequency: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            min_frequency: default_min_frequency(),
        }
    }
}

fn default_lookback_days() -> u32 {
    30
}

fn default_min_frequency() -> usize {
    3
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/habitus/config.toml` (~/.config/habitus/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("habitus").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/habitus/` (~/.local/share/habitus/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("habitus")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/habitus/` (~/.local/state/habitus/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("habitus")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/habitus/data.db` (~/.local/share/habitus/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/habitus/habitus.log` (~/.local/state/habitus/habitus.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("habitus.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
