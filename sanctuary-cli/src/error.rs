//! CLI error type.

use sanctuary::app::AppError;
use sanctuary::canvas::CanvasError;
use sanctuary::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("Failed to save configuration: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to start the core: {0}")]
    App(#[from] AppError),

    #[error("Failed to write frame: {0}")]
    Canvas(#[from] CanvasError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Marker invariant violated: {0}")]
    Invariant(String),
}
