//! User configuration file.
//!
//! Settings live in an INI file at `<config_dir>/eldritch-sanctuary/config.ini`:
//!
//! ```ini
//! [gps]
//! enable_high_accuracy = true
//! timeout_ms = 15000
//! maximum_age_ms = 5000
//! retry_attempts = 3
//! retry_delay_ms = 2000
//! fallback_lat = 61.2925
//! fallback_lng = 23.7153
//! fallback_name = Härmälä, Finland
//! staleness_ms = 3600000
//!
//! [map]
//! default_zoom = 18
//! performance_threshold = 500
//! invalidate_interval_ms = 250
//!
//! [input]
//! drag_threshold_px = 10
//!
//! [render]
//! width = 800
//! height = 600
//! debug_layer = false
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! A missing file yields defaults. Unknown keys are ignored. Malformed values
//! are rejected with [`ConfigError::InvalidValue`].

mod file;
mod keys;

pub use file::{
    ConfigFile, GpsSettings, InputSettings, LoggingSettings, MapSettings, RenderSettings,
};
pub use keys::ConfigKey;

use crate::APP_DIR_NAME;
use std::path::PathBuf;
use thiserror::Error;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while loading, editing or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
