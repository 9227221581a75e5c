//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use scheduler::WorkerConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; in-memory storage when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `AUTO_ROLL_POLL_INTERVAL_MS`: worker poll interval (default: `500`)
/// - `AUTO_ROLL_BATCH_SIZE`: tasks claimed per poll (default: `32`)
/// - `AUTO_ROLL_RETRY_DELAY_SECS`: delay before a failed task fires again (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub auto_roll_poll_interval: Duration,
    pub auto_roll_batch_size: u32,
    pub auto_roll_retry_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed(&var, "PORT").unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            auto_roll_poll_interval: parsed(&var, "AUTO_ROLL_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.auto_roll_poll_interval),
            auto_roll_batch_size: parsed(&var, "AUTO_ROLL_BATCH_SIZE")
                .unwrap_or(defaults.auto_roll_batch_size),
            auto_roll_retry_delay: parsed(&var, "AUTO_ROLL_RETRY_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.auto_roll_retry_delay),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the auto-roll worker settings.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: self.auto_roll_poll_interval,
            batch_size: self.auto_roll_batch_size,
        }
    }
}

/// Parses a variable, treating unparseable values as unset.
fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            auto_roll_poll_interval: worker.poll_interval,
            auto_roll_batch_size: worker.batch_size,
            auto_roll_retry_delay: scheduler::DEFAULT_RETRY_DELAY,
        }
    }
}
