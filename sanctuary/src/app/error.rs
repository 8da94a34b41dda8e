//! Application error types.

use crate::canvas::CanvasError;
use crate::config::ConfigError;
use crate::layers::LayerError;
use thiserror::Error;

/// Errors that can occur while bringing the application up.
#[derive(Debug, Error)]
pub enum AppError {
    /// No Tokio runtime to run the GPS driver on.
    #[error("No Tokio runtime available: {0}")]
    Runtime(String),

    #[error("Failed to create canvas: {0}")]
    Canvas(#[from] CanvasError),

    #[error("Failed to register layer: {0}")]
    Layer(#[from] LayerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Runtime("must be called from within a runtime".to_string());
        assert_eq!(
            err.to_string(),
            "No Tokio runtime available: must be called from within a runtime"
        );

        let err: AppError = LayerError::DuplicateName("ui".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Failed to register layer: layer already registered: ui"
        );
    }
}
