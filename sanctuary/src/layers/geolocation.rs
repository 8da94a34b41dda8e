//! "You are here" indicator and permission UX.
//!
//! The layer owns no position truth. It mirrors `gps:*` events into a small
//! UX state and draws a pulsing dot at the last reported position. Handlers
//! are idempotent and tolerate events arriving late or out of order.

use super::interaction::GPS_BUTTON;
use super::{Frame, Layer, LayerContext, LayerError};
use crate::canvas::Rgba;
use crate::events::{topics, Event, EventBus, SubscriptionSet};
use crate::gps::{GpsErrorCode, PermissionState, Position};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

const Z_INDEX: i32 = 10;
const INDICATOR_RADIUS: f32 = 8.0;
const PULSE_AMPLITUDE: f32 = 3.0;
const PULSE_RATE: f64 = 0.005;
const INDICATOR: Rgba = Rgba::rgb(0x00, 0xff, 0x00);
const INDICATOR_FALLBACK: Rgba = Rgba::rgb(0xff, 0xa5, 0x00);

/// Permission flow as presented to the player.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PermissionUx {
    #[default]
    Idle,
    Requesting,
    Granted,
    Denied(String),
    Fallback,
}

impl fmt::Display for PermissionUx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionUx::Idle => f.write_str("idle"),
            PermissionUx::Requesting => f.write_str("requesting"),
            PermissionUx::Granted => f.write_str("granted"),
            PermissionUx::Denied(message) => write!(f, "denied: {message}"),
            PermissionUx::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Default)]
struct UxState {
    ux: PermissionUx,
    tracking: bool,
    /// A `gps:tracking:request` is outstanding.
    tracking_requested: bool,
    indicator: Option<Position>,
}

impl UxState {
    /// Apply one event. Returns true if tracking should be requested.
    fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::GpsRequesting => {
                if self.ux != PermissionUx::Granted {
                    self.ux = PermissionUx::Requesting;
                }
            }
            Event::GpsPermission(PermissionState::Granted) => {
                let entering = self.ux != PermissionUx::Granted;
                self.ux = PermissionUx::Granted;
                if entering && !self.tracking && !self.tracking_requested {
                    self.tracking_requested = true;
                    return true;
                }
            }
            Event::GpsPermission(PermissionState::Denied) => {
                // A late denial does not hide an already shown fallback.
                if self.ux != PermissionUx::Fallback {
                    self.ux = PermissionUx::Denied(
                        GpsErrorCode::PermissionDenied.default_message().to_string(),
                    );
                }
            }
            Event::GpsError(error) if error.code == GpsErrorCode::PermissionDenied => {
                if self.ux != PermissionUx::Fallback {
                    self.ux = PermissionUx::Denied(error.message.clone());
                }
            }
            Event::GpsFallback(position) => {
                self.ux = PermissionUx::Fallback;
                self.indicator = Some(*position);
            }
            Event::GpsPositionUpdated(position) | Event::GpsSuccess(position) => {
                // Keep the fallback marker until a real fix replaces it.
                if !position.is_fallback || self.indicator.map_or(true, |p| p.is_fallback) {
                    self.indicator = Some(*position);
                }
            }
            Event::GpsTrackingStarted => {
                self.tracking = true;
                self.tracking_requested = false;
            }
            Event::GpsTrackingStopped => {
                self.tracking = false;
                self.tracking_requested = false;
            }
            _ => {}
        }
        false
    }
}

/// Mirrors the GPS flow into an on-screen indicator.
#[derive(Debug, Default)]
pub struct GeolocationLayer {
    state: Arc<Mutex<UxState>>,
    subscriptions: Option<SubscriptionSet>,
}

impl GeolocationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ux(&self) -> PermissionUx {
        self.state.lock().ux.clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.state.lock().tracking
    }

    /// Last position mirrored from the bus.
    pub fn indicator(&self) -> Option<Position> {
        self.state.lock().indicator
    }

    fn handle(state: &Mutex<UxState>, bus: &Weak<EventBus>, event: &Event) {
        let request_tracking = state.lock().apply(event);
        if request_tracking {
            if let Some(bus) = bus.upgrade() {
                tracing::info!("Location granted, requesting tracking");
                bus.emit(Event::GpsTrackingRequest);
            }
        }
    }
}

impl Layer for GeolocationLayer {
    fn name(&self) -> &str {
        "geolocation"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn init(&mut self, ctx: &LayerContext) -> Result<(), LayerError> {
        let mut subscriptions = SubscriptionSet::new(ctx.bus.clone());
        for topic in [
            topics::GPS_REQUESTING,
            topics::GPS_PERMISSION_GRANTED,
            topics::GPS_PERMISSION_DENIED,
            topics::GPS_ERROR,
            topics::GPS_FALLBACK,
            topics::GPS_SUCCESS,
            topics::GPS_POSITION_UPDATED,
            topics::GPS_TRACKING_STARTED,
            topics::GPS_TRACKING_STOPPED,
        ] {
            let state = self.state.clone();
            let bus = Arc::downgrade(&ctx.bus);
            subscriptions.on(topic, move |event| Self::handle(&state, &bus, event));
        }

        let bus = Arc::downgrade(&ctx.bus);
        subscriptions.on(topics::UI_ELEMENT_CLICK, move |event| {
            if let Event::UiElementClick { element, .. } = event {
                if element == GPS_BUTTON {
                    if let Some(bus) = bus.upgrade() {
                        bus.emit(Event::GpsRequest);
                    }
                }
            }
        });

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let Some(position) = self.indicator() else {
            return Ok(());
        };
        let view = frame.viewport();
        let at = view.to_screen(position.lat_lng());
        let pulse = PULSE_AMPLITUDE * ((frame.now_ms as f64 * PULSE_RATE).sin() as f32);
        let radius = INDICATOR_RADIUS + pulse;
        if !view.is_on_screen(at, radius) {
            return Ok(());
        }

        let color = if position.is_fallback {
            INDICATOR_FALLBACK
        } else {
            INDICATOR
        };
        frame.canvas.fill_circle(at, radius, color.with_alpha(0x99));
        frame.canvas.stroke_circle(at, radius, color, 2.0);
        Ok(())
    }

    fn destroy(&mut self) {
        self.subscriptions = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::geo::{LatLng, ScreenPoint};
    use crate::gps::GpsError;
    use crate::state::{GameState, GameStore};

    fn init() -> (Arc<EventBus>, GeolocationLayer) {
        let bus = Arc::new(EventBus::new());
        let mut layer = GeolocationLayer::new();
        layer
            .init(&LayerContext {
                bus: bus.clone(),
                store: Arc::new(GameStore::default()),
            })
            .unwrap();
        (bus, layer)
    }

    fn fix(lat: f64, lng: f64) -> Position {
        Position {
            lat,
            lng,
            accuracy: Some(8.0),
            timestamp_ms: 0,
            is_fallback: false,
        }
    }

    #[test]
    fn test_repeated_grant_requests_tracking_once() {
        let (bus, layer) = init();
        bus.emit(Event::GpsRequesting);
        assert_eq!(layer.ux(), PermissionUx::Requesting);

        bus.emit(Event::GpsPermission(PermissionState::Granted));
        bus.emit(Event::GpsPermission(PermissionState::Granted));
        assert_eq!(layer.ux(), PermissionUx::Granted);
        assert_eq!(bus.history_for(topics::GPS_TRACKING_REQUEST).len(), 1);
    }

    #[test]
    fn test_grant_while_tracking_does_not_request() {
        let (bus, layer) = init();
        bus.emit(Event::GpsTrackingStarted);
        bus.emit(Event::GpsPermission(PermissionState::Granted));
        assert!(layer.is_tracking());
        assert!(bus.history_for(topics::GPS_TRACKING_REQUEST).is_empty());
    }

    #[test]
    fn test_regrant_after_stop_requests_again() {
        let (bus, _layer) = init();
        bus.emit(Event::GpsPermission(PermissionState::Granted));
        bus.emit(Event::GpsTrackingStarted);
        bus.emit(Event::GpsTrackingStopped);
        bus.emit(Event::GpsPermission(PermissionState::Denied));
        bus.emit(Event::GpsPermission(PermissionState::Granted));
        assert_eq!(bus.history_for(topics::GPS_TRACKING_REQUEST).len(), 2);
    }

    #[test]
    fn test_denial_then_fallback_and_late_denial() {
        let (bus, layer) = init();
        bus.emit(Event::GpsError(GpsError::permission_denied()));
        assert!(matches!(layer.ux(), PermissionUx::Denied(_)));

        let fallback = Position::fallback(LatLng::new(61.2925, 23.7153), 1000.0, 0);
        bus.emit(Event::GpsFallback(fallback));
        bus.emit(Event::GpsPermission(PermissionState::Denied));
        assert_eq!(layer.ux(), PermissionUx::Fallback);
        assert_eq!(layer.indicator(), Some(fallback));
    }

    #[test]
    fn test_real_fix_replaces_fallback_indicator() {
        let (bus, layer) = init();
        let fallback = Position::fallback(LatLng::new(61.2925, 23.7153), 1000.0, 0);
        bus.emit(Event::GpsFallback(fallback));
        bus.emit(Event::GpsPositionUpdated(fix(61.5, 23.76)));
        assert_eq!(layer.indicator(), Some(fix(61.5, 23.76)));
    }

    #[test]
    fn test_gps_button_click_requests_location() {
        let (bus, _layer) = init();
        bus.emit(Event::UiElementClick {
            element: GPS_BUTTON.to_string(),
            point: ScreenPoint::new(40.0, 30.0),
        });
        assert_eq!(bus.history_for(topics::GPS_REQUEST).len(), 1);
    }

    #[test]
    fn test_indicator_pulses_around_position() {
        let (bus, mut layer) = init();
        bus.emit(Event::GpsSuccess(fix(61.5, 23.76)));

        let mut state = GameState::default();
        state.map.center = LatLng::new(61.5, 23.76);
        state.map.zoom = 18;
        let store = GameStore::new(state);
        let mut canvas = RecordingCanvas::new(200, 200);
        let log = canvas.log();
        let mut frame = Frame {
            canvas: &mut canvas,
            store: &store,
            delta_ms: 16.0,
            frame_index: 0,
            now_ms: 0,
        };
        layer.render(&mut frame).unwrap();

        let commands = log.commands();
        assert!(matches!(
            commands[0],
            DrawCommand::FillCircle(at, r, _) if at == ScreenPoint::new(100.0, 100.0) && r == INDICATOR_RADIUS
        ));
    }
}
