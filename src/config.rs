//! Configuration module for pingwatch.
//!
//! Application settings come from environment variables with sensible
//! defaults. Session settings ([`PollConfig`]) are validated here, before
//! any polling starts.

use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Rejected configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target must not be empty")]
    EmptyTarget,
    #[error("invalid target {0:?}")]
    InvalidTarget(String),
    #[error("interval must be at least 1 second, got {0}")]
    IntervalTooShort(u64),
}

/// Settings for one polling session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    target: String,
    interval_seconds: u64,
}

impl PollConfig {
    /// Validate a target and interval.
    ///
    /// The target is trimmed. It must be non-empty, and must not look like
    /// a command-line flag or contain whitespace since it is handed to the
    /// system `ping` binary.
    pub fn new(target: &str, interval_seconds: u64) -> Result<Self, ConfigError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if target.starts_with('-') || target.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidTarget(target.to_string()));
        }
        if interval_seconds < 1 {
            return Err(ConfigError::IntervalTooShort(interval_seconds));
        }

        Ok(Self {
            target: target.to_string(),
            interval_seconds,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP port for the API server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "ping_log.db")
    pub db_path: String,
    /// Target to start polling at boot, if any
    pub target: Option<String>,
    /// Seconds between probes for the boot session (default: 1)
    pub interval_seconds: u64,
    /// Bound on a single probe (default: 3s)
    pub probe_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "ping_log.db".to_string(),
            target: None,
            interval_seconds: 1,
            probe_timeout: Duration::from_secs(3),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PINGWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `PINGWATCH_DB_PATH`: Database file path (default: "ping_log.db")
    /// - `PINGWATCH_TARGET`: Host to poll at startup (default: none)
    /// - `PINGWATCH_INTERVAL`: Seconds between probes (default: 1)
    /// - `PINGWATCH_PROBE_TIMEOUT`: Probe timeout in seconds (default: 3)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Malformed values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("PINGWATCH_HTTP_PORT").and_then(|v| v.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("PINGWATCH_DB_PATH").filter(|v| !v.is_empty()) {
            cfg.db_path = db_path;
        }

        cfg.target = lookup("PINGWATCH_TARGET")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if let Some(interval) = lookup("PINGWATCH_INTERVAL").and_then(|v| v.parse().ok()) {
            cfg.interval_seconds = interval;
        }

        if let Some(secs) = lookup("PINGWATCH_PROBE_TIMEOUT")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            cfg.probe_timeout = Duration::from_secs(secs);
        }

        cfg
    }

    /// Create the directory holding the database file if it is missing.
    pub fn ensure_db_dir(&self) -> std::io::Result<()> {
        match Path::new(&self.db_path).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}
