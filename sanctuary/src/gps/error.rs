//! GPS acquisition errors.

use thiserror::Error;

/// Canonical acquisition error classes, numbered like the W3C geolocation
/// error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpsErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl GpsErrorCode {
    pub fn code(&self) -> u8 {
        match self {
            GpsErrorCode::PermissionDenied => 1,
            GpsErrorCode::PositionUnavailable => 2,
            GpsErrorCode::Timeout => 3,
        }
    }

    /// Map a numeric device code. Unrecognized codes count as unavailable.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GpsErrorCode::PermissionDenied,
            3 => GpsErrorCode::Timeout,
            _ => GpsErrorCode::PositionUnavailable,
        }
    }

    /// Short label for status text.
    pub fn label(&self) -> &'static str {
        match self {
            GpsErrorCode::PermissionDenied => "Permission Denied",
            GpsErrorCode::PositionUnavailable => "Unavailable",
            GpsErrorCode::Timeout => "Timeout",
        }
    }

    /// User-facing message used when the device gives none.
    pub fn default_message(&self) -> &'static str {
        match self {
            GpsErrorCode::PermissionDenied => {
                "Location access denied. Please enable location services."
            }
            GpsErrorCode::PositionUnavailable => "Location information unavailable.",
            GpsErrorCode::Timeout => "Location request timed out.",
        }
    }
}

/// A structured acquisition error `{code, message}`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {})", .code.code())]
pub struct GpsError {
    pub code: GpsErrorCode,
    pub message: String,
}

impl GpsError {
    pub fn new(code: GpsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Error with the canonical message for `code`.
    pub fn from_code(code: GpsErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn permission_denied() -> Self {
        Self::from_code(GpsErrorCode::PermissionDenied)
    }

    pub fn unavailable() -> Self {
        Self::from_code(GpsErrorCode::PositionUnavailable)
    }

    pub fn timeout() -> Self {
        Self::from_code(GpsErrorCode::Timeout)
    }

    /// A fix whose coordinates failed validation.
    pub fn invalid_coordinates() -> Self {
        Self::new(GpsErrorCode::PositionUnavailable, "Invalid coordinates")
    }

    /// Whether the machine may retry after this error.
    pub fn is_retryable(&self) -> bool {
        self.code == GpsErrorCode::Timeout
    }
}
