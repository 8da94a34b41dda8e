//! Tracing subscriber setup.
//!
//! Logs go to stderr with local RFC 3339 timestamps. When a directory is
//! configured they are also written to a daily rolling file through a
//! non-blocking writer; keep the returned [`LoggingGuard`] alive until exit
//! or buffered lines are lost. `RUST_LOG` overrides the configured level.

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE_PREFIX: &str = "sanctuary.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `sanctuary::gps=debug,info`.
    pub level: String,
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Keeps the file writer flushing. Dropping it stops file output.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    file_path: Option<PathBuf>,
}

impl LoggingGuard {
    /// Base path of the rolling file (the date is appended per day).
    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }
}

/// The filter directive to use: `RUST_LOG` when set, else the configured level.
fn effective_directive(config: &LoggingConfig, env: Option<String>) -> String {
    env.filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::Filter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let directive = effective_directive(config, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let filter = build_filter(&directive)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(config.ansi)
        .with_target(true);

    let (file_layer, guard, file_path) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (
                Some(layer),
                Some(guard),
                Some(directory.join(&config.file_prefix)),
            )
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(directive = %directive, file = ?file_path, "Logging initialized");
    Ok(LoggingGuard {
        _file: guard,
        file_path,
    })
}
