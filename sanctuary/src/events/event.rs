//! Typed event payloads and the topic catalog.

use crate::geo::{LatLng, ScreenPoint};
use crate::gps::{GpsError, GpsStatus, PermissionState, Position};
use crate::map::{ObjectId, ObjectKind};

/// Topic strings, one per [`Event`] variant (permission events fan out to
/// three topics).
pub mod topics {
    pub const GPS_READY: &str = "gps:ready";
    pub const GPS_REQUEST: &str = "gps:request";
    pub const GPS_REQUESTING: &str = "gps:requesting";
    pub const GPS_SUCCESS: &str = "gps:success";
    pub const GPS_ERROR: &str = "gps:error";
    pub const GPS_FALLBACK: &str = "gps:fallback";
    pub const GPS_PERMISSION_GRANTED: &str = "gps:permission:granted";
    pub const GPS_PERMISSION_DENIED: &str = "gps:permission:denied";
    pub const GPS_PERMISSION_PROMPT: &str = "gps:permission:prompt";
    pub const GPS_POSITION_UPDATED: &str = "gps:position:updated";
    pub const GPS_TRACKING_STARTED: &str = "gps:tracking:started";
    pub const GPS_TRACKING_STOPPED: &str = "gps:tracking:stopped";
    pub const GPS_TRACKING_REQUEST: &str = "gps:tracking:request";
    pub const GPS_STATUS: &str = "gps:status";
    pub const GPS_MAP_INITIALIZED: &str = "gps:map:initialized";

    pub const MAP_OBJECT_CREATED: &str = "map:object:created";
    pub const MAP_OBJECT_REMOVED: &str = "map:object:removed";
    pub const MAP_OBJECT_UPDATED: &str = "map:object:updated";
    pub const MAP_OBJECT_MANAGER_TOGGLED: &str = "map:object:manager:toggled";
    pub const MAP_PERFORMANCE_MODE: &str = "map:performance:mode";

    pub const UI_ELEMENT_ENTER: &str = "ui:element:enter";
    pub const UI_ELEMENT_LEAVE: &str = "ui:element:leave";
    pub const UI_ELEMENT_CLICK: &str = "ui:element:click";
    pub const UI_MENU_TOGGLE: &str = "ui:menu:toggle";

    pub const INTERACTION_TAP: &str = "interaction:tap";
    pub const INTERACTION_DRAG_START: &str = "interaction:drag:start";
    pub const INTERACTION_DRAG_MOVE: &str = "interaction:drag:move";
    pub const INTERACTION_DRAG_END: &str = "interaction:drag:end";

    pub const LAYER_ADDED: &str = "layer:added";
    pub const LAYER_REMOVED: &str = "layer:removed";
    pub const LAYER_SHOWN: &str = "layer:shown";
    pub const LAYER_HIDDEN: &str = "layer:hidden";
    pub const LAYER_SHOW_REQUEST: &str = "layer:show:request";
    pub const LAYER_HIDE_REQUEST: &str = "layer:hide:request";
    pub const RENDER_PAUSE: &str = "render:pause";
    pub const RENDER_RESUME: &str = "render:resume";
}

/// Drag gesture payload. Mouse and touch input produce the same shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragEvent {
    /// Where the pointer went down.
    pub origin: ScreenPoint,
    /// Current pointer position.
    pub current: ScreenPoint,
    /// Movement since the previous drag event.
    pub delta: ScreenPoint,
}

/// Every message that crosses the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    GpsReady,
    GpsRequest,
    GpsRequesting,
    GpsSuccess(Position),
    GpsError(GpsError),
    GpsFallback(Position),
    GpsPermission(PermissionState),
    GpsPositionUpdated(Position),
    GpsTrackingStarted,
    GpsTrackingStopped,
    GpsTrackingRequest,
    GpsStatus(GpsStatus),
    GpsMapInitialized(Position),

    MapObjectCreated {
        id: ObjectId,
        kind: ObjectKind,
        position: LatLng,
    },
    MapObjectRemoved {
        id: ObjectId,
        kind: ObjectKind,
    },
    MapObjectUpdated {
        id: ObjectId,
        position: LatLng,
        moved: bool,
    },
    MapObjectManagerToggled {
        active: bool,
        selected: ObjectKind,
    },
    MapPerformanceMode {
        enabled: bool,
        object_count: usize,
    },

    UiElementEnter {
        element: String,
    },
    UiElementLeave {
        element: String,
    },
    UiElementClick {
        element: String,
        point: ScreenPoint,
    },
    UiMenuToggle,

    InteractionTap(ScreenPoint),
    InteractionDragStart(DragEvent),
    InteractionDragMove(DragEvent),
    InteractionDragEnd(DragEvent),

    LayerAdded {
        name: String,
        z_index: i32,
    },
    LayerRemoved {
        name: String,
    },
    LayerShown {
        name: String,
    },
    LayerHidden {
        name: String,
    },
    LayerShowRequest {
        name: String,
    },
    LayerHideRequest {
        name: String,
    },
    RenderPause,
    RenderResume,
}

impl Event {
    /// The catalog topic this event is delivered on.
    pub fn topic(&self) -> &'static str {
        use topics::*;

        match self {
            Event::GpsReady => GPS_READY,
            Event::GpsRequest => GPS_REQUEST,
            Event::GpsRequesting => GPS_REQUESTING,
            Event::GpsSuccess(_) => GPS_SUCCESS,
            Event::GpsError(_) => GPS_ERROR,
            Event::GpsFallback(_) => GPS_FALLBACK,
            Event::GpsPermission(state) => match state {
                PermissionState::Granted => GPS_PERMISSION_GRANTED,
                PermissionState::Denied => GPS_PERMISSION_DENIED,
                PermissionState::Prompt | PermissionState::Unknown => GPS_PERMISSION_PROMPT,
            },
            Event::GpsPositionUpdated(_) => GPS_POSITION_UPDATED,
            Event::GpsTrackingStarted => GPS_TRACKING_STARTED,
            Event::GpsTrackingStopped => GPS_TRACKING_STOPPED,
            Event::GpsTrackingRequest => GPS_TRACKING_REQUEST,
            Event::GpsStatus(_) => GPS_STATUS,
            Event::GpsMapInitialized(_) => GPS_MAP_INITIALIZED,

            Event::MapObjectCreated { .. } => MAP_OBJECT_CREATED,
            Event::MapObjectRemoved { .. } => MAP_OBJECT_REMOVED,
            Event::MapObjectUpdated { .. } => MAP_OBJECT_UPDATED,
            Event::MapObjectManagerToggled { .. } => MAP_OBJECT_MANAGER_TOGGLED,
            Event::MapPerformanceMode { .. } => MAP_PERFORMANCE_MODE,

            Event::UiElementEnter { .. } => UI_ELEMENT_ENTER,
            Event::UiElementLeave { .. } => UI_ELEMENT_LEAVE,
            Event::UiElementClick { .. } => UI_ELEMENT_CLICK,
            Event::UiMenuToggle => UI_MENU_TOGGLE,

            Event::InteractionTap(_) => INTERACTION_TAP,
            Event::InteractionDragStart(_) => INTERACTION_DRAG_START,
            Event::InteractionDragMove(_) => INTERACTION_DRAG_MOVE,
            Event::InteractionDragEnd(_) => INTERACTION_DRAG_END,

            Event::LayerAdded { .. } => LAYER_ADDED,
            Event::LayerRemoved { .. } => LAYER_REMOVED,
            Event::LayerShown { .. } => LAYER_SHOWN,
            Event::LayerHidden { .. } => LAYER_HIDDEN,
            Event::LayerShowRequest { .. } => LAYER_SHOW_REQUEST,
            Event::LayerHideRequest { .. } => LAYER_HIDE_REQUEST,
            Event::RenderPause => RENDER_PAUSE,
            Event::RenderResume => RENDER_RESUME,
        }
    }

    /// The position carried by GPS events, if any.
    pub fn position(&self) -> Option<&Position> {
        match self {
            Event::GpsSuccess(p)
            | Event::GpsFallback(p)
            | Event::GpsPositionUpdated(p)
            | Event::GpsMapInitialized(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::GpsErrorCode;

    #[test]
    fn test_permission_topics() {
        assert_eq!(
            Event::GpsPermission(PermissionState::Granted).topic(),
            "gps:permission:granted"
        );
        assert_eq!(
            Event::GpsPermission(PermissionState::Denied).topic(),
            "gps:permission:denied"
        );
        assert_eq!(
            Event::GpsPermission(PermissionState::Prompt).topic(),
            "gps:permission:prompt"
        );
    }

    #[test]
    fn test_error_topic_and_payload() {
        let event = Event::GpsError(GpsError::timeout());
        assert_eq!(event.topic(), topics::GPS_ERROR);
        match event {
            Event::GpsError(err) => assert_eq!(err.code, GpsErrorCode::Timeout),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_position_accessor() {
        let p = Position::fallback(LatLng::new(61.2925, 23.7153), 1000.0, 5);
        assert_eq!(Event::GpsFallback(p).position(), Some(&p));
        assert_eq!(Event::GpsReady.position(), None);
    }
}
