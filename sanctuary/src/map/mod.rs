//! Map surface and the game objects placed on it.
//!
//! - [`MapSurface`]: the slippy-map contract (markers plus camera).
//! - [`HeadlessMap`]: in-memory implementation drawn by the map layer.
//! - [`MapObjectManager`]: registry of typed objects, the only writer of
//!   marker handles.
//! - [`InvalidationThrottle`]: spaces map redraws once the object count
//!   crosses the performance threshold.

mod headless;
mod kinds;
mod objects;
mod surface;
mod throttle;

pub use headless::{HeadlessMap, MarkerState};
pub use kinds::{ObjectKind, ObjectTypeSpec, UnknownObjectKind};
pub use objects::{
    MapObject, MapObjectConfig, MapObjectError, MapObjectManager, ObjectId, ObjectOptions,
    ObjectStats, ObjectUpdate, TEST_OBJECT_SPREAD_DEG,
};
pub use surface::{IconSpec, MapError, MapSurface, MarkerHandle, ViewOptions};
pub use throttle::{
    InvalidationThrottle, ThrottleDecision, ThrottleMode, DEFAULT_INVALIDATE_INTERVAL,
    DEFAULT_PERFORMANCE_THRESHOLD, PERFORMANCE_EXIT_RATIO,
};
