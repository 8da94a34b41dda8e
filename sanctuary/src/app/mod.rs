//! Composition root.
//!
//! [`SanctuaryApp`] builds every service exactly once and hands each
//! component the shared handles it needs. Nothing is global.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── SanctuaryApp ─────────────────────────────┐
//! │                                                                       │
//! │  EventBus ◄──────────── every component publishes and subscribes      │
//! │  GameStore ◄─────────── store sync listeners (position, map, input)   │
//! │  HeadlessMap ◄───────── MapObjectManager (markers), GpsCore (view)    │
//! │  LayerManager ──► background, terrain, territory, path, map,          │
//! │                   interaction, player, ui, geolocation, debug         │
//! │  GpsCore ◄──────────── GeolocationProvider, PositionStore,            │
//! │                        PermissionSource                               │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sanctuary::app::{AppConfig, AppDeps, SanctuaryApp};
//! use sanctuary::gps::SimulatedProvider;
//! use std::sync::Arc;
//!
//! let app = SanctuaryApp::start(AppConfig::default(), AppDeps::new(Arc::new(SimulatedProvider::new())))?;
//! app.gps().request_location();
//! app.render_frame(16.0);
//! app.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{AppDeps, SanctuaryApp};
pub use config::{AppConfig, RenderConfig};
pub use error::AppError;
