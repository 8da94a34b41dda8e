//! GPS state snapshot types.

use super::{GpsError, GpsErrorCode, Position};
use std::fmt;

/// Location permission as last reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
    Prompt,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the acquisition flow currently is.
///
/// ```text
/// Idle ──► Requesting ──► Located
///              │
///              └──► Failed ──► Retrying(n) ──► Requesting
///                     │
///                     └──────► Fallback
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionPhase {
    #[default]
    Idle,
    Requesting,
    Located,
    Failed,
    /// Waiting for retry timer `attempt` to fire.
    Retrying {
        attempt: u32,
    },
    Fallback,
}

impl AcquisitionPhase {
    /// True once the flow produced a position, real or synthesized.
    pub fn is_settled(&self) -> bool {
        matches!(self, AcquisitionPhase::Located | AcquisitionPhase::Fallback)
    }
}

/// Status pushed to the UI on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsStatus {
    #[default]
    Ready,
    Requesting,
    Tracking,
    Success,
    Error(GpsErrorCode),
    Fallback,
}

impl GpsStatus {
    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            GpsStatus::Ready => "LOCATE",
            GpsStatus::Requesting => "REQUESTING",
            GpsStatus::Tracking => "TRACKING",
            GpsStatus::Success => "LOCATED",
            GpsStatus::Error(_) => "ERROR",
            GpsStatus::Fallback => "FALLBACK",
        }
    }

    /// Human-readable status line.
    pub fn text(&self) -> String {
        match self {
            GpsStatus::Ready => "GPS Ready".to_string(),
            GpsStatus::Requesting => "Getting location...".to_string(),
            GpsStatus::Tracking => "GPS Active".to_string(),
            GpsStatus::Success => "Position Found".to_string(),
            GpsStatus::Error(code) => format!("GPS Failed: {}", code.label()),
            GpsStatus::Fallback => "Using Default".to_string(),
        }
    }
}

impl fmt::Display for GpsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Snapshot of the acquisition state, owned by the state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsState {
    pub initialized: bool,
    pub permission: PermissionState,
    /// A device watch is active.
    pub tracking: bool,
    /// Latest position, fallback included.
    pub position: Option<Position>,
    /// Latest measured position. Never a fallback.
    pub last_valid_position: Option<Position>,
    pub accuracy: Option<f64>,
    pub error: Option<GpsError>,
    pub retry_count: u32,
    pub phase: AcquisitionPhase,
    pub status: GpsStatus,
    /// Map centering and `gps:map:initialized` already ran this session.
    pub downstream_initialized: bool,
    pub destroyed: bool,
}
