//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/pagelens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pagelens/` (~/.config/pagelens/)
//! - Data: `$XDG_DATA_HOME/pagelens/` (~/.local/share/pagelens/)
//! - State/Logs: `$XDG_STATE_HOME/pagelens/` (~/.local/state/pagelens/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

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
    /// Analytics defaults and thresholds
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Event store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analytics defaults and thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Inter-event gaps longer than this are idle time, not dwell time
    #[serde(default = "default_dwell_threshold_minutes")]
    pub dwell_threshold_minutes: u32,

    /// Bucket count for the interval histogram when none is given
    #[serde(default = "default_intervals")]
    pub default_intervals: u32,

    /// Number of retention weeks for cohort analysis when none is given
    #[serde(default = "default_cohort_weeks")]
    pub default_cohort_weeks: u32,

    /// Window used to count currently active sessions
    #[serde(default = "default_active_window_minutes")]
    pub active_window_minutes: u32,

    /// Length of the query range when no start date is given
    #[serde(default = "default_range_hours")]
    pub default_range_hours: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dwell_threshold_minutes: default_dwell_threshold_minutes(),
            default_intervals: default_intervals(),
            default_cohort_weeks: default_cohort_weeks(),
            active_window_minutes: default_active_window_minutes(),
            default_range_hours: default_range_hours(),
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("dwell_threshold_minutes", self.dwell_threshold_minutes),
            ("default_intervals", self.default_intervals),
            ("default_cohort_weeks", self.default_cohort_weeks),
            ("active_window_minutes", self.active_window_minutes),
            ("default_range_hours", self.default_range_hours),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::Config(format!(
                    "analytics.{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn default_dwell_threshold_minutes() -> u32 {
    5
}

fn default_intervals() -> u32 {
    10
}

fn default_cohort_weeks() -> u32 {
    12
}

fn default_active_window_minutes() -> u32 {
    5
}

fn default_range_hours() -> u32 {
    24
}

/// Event store location
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DatabaseConfig {
    /// Override path for the SQLite event store
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.analytics.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pagelens/config.toml` (~/.config/pagelens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pagelens").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/pagelens/` (~/.local/share/pagelens/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("pagelens")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/pagelens/` (~/.local/state/pagelens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pagelens")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/pagelens/events.db` (~/.local/share/pagelens/events.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("events.db")
    }

    /// Returns the database path, honoring the `[database] path` override.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/pagelens/pagelens.log` (~/.local/state/pagelens/pagelens.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("pagelens.log")
    }

    /// Ensure XDG env vars are set so every path helper agrees on locations.
    ///
    /// Unset variables get their XDG default under the home directory.
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
