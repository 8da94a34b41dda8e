//! Eldritch Sanctuary core.
//!
//! Layer coordination and GPS-position reconciliation for a map-driven
//! location game. Independently owned rendering layers are composed into one
//! scene, all of them fed by a single GPS acquisition state machine, and every
//! component talks to the others only through the [`events::EventBus`].
//!
//! # Architecture
//!
//! ```text
//! device GPS ──► GpsCore (acquire / validate / retry / fallback)
//!                   │
//!                   ▼  gps:* events
//!               EventBus ──► GeolocationLayer, PathLayer, UiLayer,
//!                   │        GameStore sync, MapObjectManager consumers
//!                   ▼
//!              LayerManager ──► paints visible layers in ascending z order
//! ```
//!
//! [`app::SanctuaryApp`] is the composition root: it builds every service
//! exactly once and injects the shared handles. There are no globals.

pub mod app;
pub mod canvas;
pub mod clock;
pub mod config;
pub mod events;
pub mod geo;
pub mod gps;
pub mod layers;
pub mod logging;
pub mod map;
pub mod state;

/// Version of the sanctuary core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application directory name under the platform config/data directories.
pub const APP_DIR_NAME: &str = "eldritch-sanctuary";
