//! GPS acquisition, validation, retry and fallback.
//!
//! The policy lives in [`GpsStateMachine`], a pure transition function. The
//! I/O lives in [`GpsCore`], which drives the machine from a tokio runtime.
//! The machine is the only writer of [`GpsState`]. Everyone else reads
//! snapshots or listens to `gps:*` events.
//!
//! # Seams
//!
//! | trait | purpose | implementations |
//! |---|---|---|
//! | [`GeolocationProvider`] | device requests and watches | [`SimulatedProvider`], [`UnsupportedProvider`] |
//! | [`PermissionSource`] | permission push stream | [`SimulatedPermissions`] |
//! | [`PositionStore`] | last known position | [`JsonFileStore`], [`MemoryStore`] |
//!
//! # Example
//!
//! ```
//! use sanctuary::events::EventBus;
//! use sanctuary::gps::{GpsConfig, GpsCore, RawReading, SimulatedProvider};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = Arc::new(EventBus::new());
//! let device = Arc::new(SimulatedProvider::scripted([Ok(RawReading::new(61.5, 23.76, Some(8.0)))]));
//! let gps = GpsCore::builder(GpsConfig::default(), bus, device)
//!     .start(&tokio::runtime::Handle::current());
//! gps.request_location();
//! # }
//! ```

mod config;
mod driver;
mod error;
mod machine;
mod permission;
mod position;
mod provider;
mod state;
mod storage;

pub use config::{
    FallbackLocation, GpsConfig, PositionOptions, DEFAULT_MAP_ZOOM, DEFAULT_MAXIMUM_AGE,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_STALENESS_CEILING, DEFAULT_TIMEOUT,
    FALLBACK_ACCURACY_M,
};
pub use driver::{GpsCore, GpsCoreBuilder};
pub use error::{GpsError, GpsErrorCode};
pub use machine::{GpsEffect, GpsInput, GpsStateMachine};
pub use permission::{PermissionSource, SimulatedPermissions};
pub use position::{Position, RawReading};
pub use provider::{
    BoxFuture, GeolocationProvider, SimulatedProvider, UnsupportedProvider, WatchId, WatchSink,
};
pub use state::{AcquisitionPhase, GpsState, GpsStatus, PermissionState};
pub use storage::{
    default_store_path, load_recent, JsonFileStore, MemoryStore, PositionStore, StoreError,
    StoredPosition, STORE_FILE_NAME,
};
