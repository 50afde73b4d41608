//! Logging setup for the voice pipeline host.
//!
//! Structured JSON by default (for log shipping off-device), pretty printing
//! for bench work. Output goes to stderr or a file; the core itself never
//! opens sockets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. "info" or "voxcore=debug".
    pub level: String,
    /// Log file path; stderr when unset.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, level: "info".to_string(), output_path: None }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to open log file: {0}")]
    FileOpen(String),

    #[error("subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber. Call once at host startup.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter =
        EnvFilter::try_new(&config.level).map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match (&config.format, &config.output_path) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::File::create(path)
                .map_err(|e| LogError::FileOpen(e.to_string()))?;
            registry
                .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
                .try_init()
                .map_err(|_| LogError::AlreadyInitialized)
        }
        (LogFormat::Json, None) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
        (LogFormat::Pretty, _) => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_rejected() {
        let config = LogConfig { level: "not[a]filter=".to_string(), ..LogConfig::default() };
        assert!(matches!(init_logging(&config), Err(LogError::InvalidFilter(_))));
    }

    #[test]
    fn default_config_is_json_to_stderr() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.output_path.is_none());
    }
}
