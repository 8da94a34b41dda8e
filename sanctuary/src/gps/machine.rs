//! Pure acquisition state machine.
//!
//! [`GpsStateMachine::handle`] takes one input and the current wall-clock time
//! and returns the effects the driver must perform. It never sleeps, spawns or
//! touches the device, which keeps the retry and fallback policy testable
//! without a runtime.
//!
//! # Policy
//!
//! ```text
//! RequestLocation ──► Requesting ──fix──► Located
//!                          │
//!                        error
//!                          ├─ PERMISSION_DENIED ─────────────► Fallback
//!                          ├─ TIMEOUT, retries left ─► Retrying(n) ──delay n×base──► Requesting
//!                          └─ otherwise ─────────────────────► Fallback
//! ```
//!
//! - A user request resets the retry counter. A retry does not.
//! - A request error that arrives outside `Requesting` is stale and ignored,
//!   so fallback happens at most once per attempt.
//! - The first position of the session, measured or fallback, triggers
//!   downstream initialization. Later fixes never do.

use super::{
    AcquisitionPhase, GpsConfig, GpsError, GpsErrorCode, GpsState, GpsStatus, PermissionState,
    Position, PositionOptions, RawReading,
};
use crate::events::Event;
use std::time::Duration;

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum GpsInput {
    /// Startup, with the persisted position if it passed the staleness check.
    Initialize { restored: Option<Position> },
    RequestLocation,
    /// Retry timer `attempt` fired.
    RetryElapsed { attempt: u32 },
    PositionAcquired(RawReading),
    PositionFailed(GpsError),
    WatchUpdate(RawReading),
    WatchFailed(GpsError),
    PermissionChanged(PermissionState),
    StartTracking,
    StopTracking,
    Destroy,
}

/// Work the driver performs on behalf of the machine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GpsEffect {
    RequestPosition(PositionOptions),
    ScheduleRetry { attempt: u32, delay: Duration },
    CancelRetry,
    StartWatch(PositionOptions),
    ClearWatch,
    Persist(Position),
    /// Center the map and announce `gps:map:initialized`.
    InitializeDownstream(Position),
    Emit(Event),
    Status(GpsStatus),
}

/// The acquisition policy and the state it owns.
#[derive(Debug, Clone)]
pub struct GpsStateMachine {
    config: GpsConfig,
    state: GpsState,
}

impl GpsStateMachine {
    pub fn new(config: GpsConfig) -> Self {
        Self {
            config,
            state: GpsState::default(),
        }
    }

    pub fn state(&self) -> &GpsState {
        &self.state
    }

    pub fn config(&self) -> &GpsConfig {
        &self.config
    }

    /// Apply one input.
    pub fn handle(&mut self, input: GpsInput, now_ms: u64) -> Vec<GpsEffect> {
        let mut effects = Vec::new();

        if self.state.destroyed {
            tracing::debug!(input = ?input, "GPS input after destroy ignored");
            return effects;
        }

        match input {
            GpsInput::Initialize { restored } => self.initialize(restored, &mut effects),
            GpsInput::RequestLocation => self.request_location(&mut effects),
            GpsInput::RetryElapsed { attempt } => self.retry_elapsed(attempt, &mut effects),
            GpsInput::PositionAcquired(reading) => {
                self.accept_reading(reading, false, now_ms, &mut effects)
            }
            GpsInput::PositionFailed(error) => self.request_failed(error, now_ms, &mut effects),
            GpsInput::WatchUpdate(reading) => {
                if self.state.tracking {
                    self.accept_reading(reading, true, now_ms, &mut effects);
                }
            }
            GpsInput::WatchFailed(error) => {
                if self.state.tracking {
                    self.watch_failed(error, now_ms, &mut effects);
                }
            }
            GpsInput::PermissionChanged(permission) => {
                self.permission_changed(permission, now_ms, &mut effects)
            }
            GpsInput::StartTracking => self.start_tracking(&mut effects),
            GpsInput::StopTracking => self.stop_tracking(&mut effects),
            GpsInput::Destroy => self.destroy(&mut effects),
        }

        effects
    }

    fn set_status(&mut self, status: GpsStatus, effects: &mut Vec<GpsEffect>) {
        self.state.status = status;
        effects.push(GpsEffect::Status(status));
    }

    fn initialize(&mut self, restored: Option<Position>, effects: &mut Vec<GpsEffect>) {
        if self.state.initialized {
            return;
        }
        self.state.initialized = true;
        self.state.last_valid_position = restored.filter(|p| !p.is_fallback);
        self.set_status(GpsStatus::Ready, effects);
        effects.push(GpsEffect::Emit(Event::GpsReady));
    }

    fn request_location(&mut self, effects: &mut Vec<GpsEffect>) {
        if self.state.tracking {
            self.stop_tracking(effects);
            return;
        }
        if self.state.phase == AcquisitionPhase::Requesting {
            tracing::debug!("Location request already in flight");
            return;
        }

        self.state.retry_count = 0;
        self.state.error = None;
        effects.push(GpsEffect::CancelRetry);
        self.begin_request(effects);
    }

    fn begin_request(&mut self, effects: &mut Vec<GpsEffect>) {
        self.state.phase = AcquisitionPhase::Requesting;
        self.set_status(GpsStatus::Requesting, effects);
        effects.push(GpsEffect::Emit(Event::GpsRequesting));
        effects.push(GpsEffect::RequestPosition(self.config.options));
    }

    fn retry_elapsed(&mut self, attempt: u32, effects: &mut Vec<GpsEffect>) {
        if self.state.phase != (AcquisitionPhase::Retrying { attempt }) {
            tracing::debug!(attempt, phase = ?self.state.phase, "Stale retry timer ignored");
            return;
        }
        tracing::info!(
            attempt,
            max_attempts = self.config.retry_attempts,
            "Retrying location request"
        );
        self.begin_request(effects);
    }

    fn accept_reading(
        &mut self,
        reading: RawReading,
        from_watch: bool,
        now_ms: u64,
        effects: &mut Vec<GpsEffect>,
    ) {
        let Some(position) = reading.normalize(now_ms) else {
            tracing::warn!(
                lat = reading.latitude,
                lng = reading.longitude,
                "Rejected GPS reading with invalid coordinates"
            );
            let error = GpsError::invalid_coordinates();
            if from_watch {
                self.watch_failed(error, now_ms, effects);
            } else {
                self.request_failed(error, now_ms, effects);
            }
            return;
        };

        self.state.phase = AcquisitionPhase::Located;
        self.state.position = Some(position);
        self.state.last_valid_position = Some(position);
        self.state.accuracy = position.accuracy;
        self.state.error = None;
        self.state.retry_count = 0;

        effects.push(GpsEffect::CancelRetry);
        effects.push(GpsEffect::Persist(position));

        let status = if from_watch {
            GpsStatus::Tracking
        } else {
            GpsStatus::Success
        };
        self.set_status(status, effects);
        effects.push(GpsEffect::Emit(Event::GpsPositionUpdated(position)));
        effects.push(GpsEffect::Emit(Event::GpsSuccess(position)));

        self.initialize_downstream(position, effects);

        // A delivered fix implies access was granted. Emitted after the fix
        // events so a watch started in response sees the final status.
        self.set_permission(PermissionState::Granted, effects);
    }

    fn request_failed(&mut self, error: GpsError, now_ms: u64, effects: &mut Vec<GpsEffect>) {
        if self.state.phase != AcquisitionPhase::Requesting {
            tracing::debug!(error = %error, phase = ?self.state.phase, "Stale request error ignored");
            return;
        }

        tracing::warn!(code = error.code.code(), message = %error.message, "GPS request failed");
        self.state.phase = AcquisitionPhase::Failed;
        self.state.error = Some(error.clone());
        self.set_status(GpsStatus::Error(error.code), effects);
        effects.push(GpsEffect::Emit(Event::GpsError(error.clone())));

        match error.code {
            GpsErrorCode::PermissionDenied => {
                self.set_permission(PermissionState::Denied, effects);
                self.clear_watch(effects);
                self.fallback(now_ms, effects);
            }
            GpsErrorCode::Timeout if self.state.retry_count < self.config.retry_attempts => {
                self.state.retry_count += 1;
                let attempt = self.state.retry_count;
                let delay = self.config.retry_delay_for(attempt);
                self.state.phase = AcquisitionPhase::Retrying { attempt };
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling GPS retry after timeout"
                );
                effects.push(GpsEffect::ScheduleRetry { attempt, delay });
            }
            _ => self.fallback(now_ms, effects),
        }
    }

    fn watch_failed(&mut self, error: GpsError, now_ms: u64, effects: &mut Vec<GpsEffect>) {
        tracing::warn!(code = error.code.code(), message = %error.message, "GPS watch error");
        self.state.error = Some(error.clone());
        self.set_status(GpsStatus::Error(error.code), effects);
        effects.push(GpsEffect::Emit(Event::GpsError(error.clone())));

        if error.code == GpsErrorCode::PermissionDenied {
            self.set_permission(PermissionState::Denied, effects);
            self.clear_watch(effects);
            self.fallback(now_ms, effects);
        }
    }

    fn permission_changed(
        &mut self,
        permission: PermissionState,
        now_ms: u64,
        effects: &mut Vec<GpsEffect>,
    ) {
        if permission == self.state.permission {
            return;
        }
        tracing::info!(permission = %permission, "Location permission changed");
        self.set_permission(permission, effects);

        if permission == PermissionState::Denied {
            self.clear_watch(effects);
            self.fallback(now_ms, effects);
        }
    }

    fn set_permission(&mut self, permission: PermissionState, effects: &mut Vec<GpsEffect>) {
        if self.state.permission != permission {
            self.state.permission = permission;
            effects.push(GpsEffect::Emit(Event::GpsPermission(permission)));
        }
    }

    fn fallback(&mut self, now_ms: u64, effects: &mut Vec<GpsEffect>) {
        if self.state.phase == AcquisitionPhase::Fallback {
            return;
        }

        let position = Position::fallback(
            self.config.fallback.position,
            self.config.fallback_accuracy_m,
            now_ms,
        );
        tracing::info!(
            location = %self.config.fallback.name,
            lat = position.lat,
            lng = position.lng,
            "Using fallback location"
        );

        self.state.phase = AcquisitionPhase::Fallback;
        self.state.position = Some(position);
        self.state.accuracy = position.accuracy;

        effects.push(GpsEffect::CancelRetry);
        self.set_status(GpsStatus::Fallback, effects);
        effects.push(GpsEffect::Emit(Event::GpsPositionUpdated(position)));
        effects.push(GpsEffect::Emit(Event::GpsFallback(position)));

        self.initialize_downstream(position, effects);
    }

    fn initialize_downstream(&mut self, position: Position, effects: &mut Vec<GpsEffect>) {
        if !self.state.downstream_initialized {
            self.state.downstream_initialized = true;
            effects.push(GpsEffect::InitializeDownstream(position));
        }
    }

    fn start_tracking(&mut self, effects: &mut Vec<GpsEffect>) {
        if self.state.tracking {
            return;
        }
        if self.state.permission == PermissionState::Denied {
            tracing::warn!("Tracking not started: location permission denied");
            return;
        }
        self.state.tracking = true;
        effects.push(GpsEffect::StartWatch(self.config.options));
        self.set_status(GpsStatus::Tracking, effects);
        effects.push(GpsEffect::Emit(Event::GpsTrackingStarted));
    }

    fn stop_tracking(&mut self, effects: &mut Vec<GpsEffect>) {
        if !self.state.tracking {
            return;
        }
        self.clear_watch(effects);
        self.set_status(GpsStatus::Ready, effects);
    }

    fn clear_watch(&mut self, effects: &mut Vec<GpsEffect>) {
        if self.state.tracking {
            self.state.tracking = false;
            effects.push(GpsEffect::ClearWatch);
            effects.push(GpsEffect::Emit(Event::GpsTrackingStopped));
        }
    }

    fn destroy(&mut self, effects: &mut Vec<GpsEffect>) {
        effects.push(GpsEffect::CancelRetry);
        if self.state.tracking {
            self.state.tracking = false;
            effects.push(GpsEffect::ClearWatch);
        }
        self.state.destroyed = true;
    }
}
