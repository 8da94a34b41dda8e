//! Layered scene composition.
//!
//! Each [`Layer`] owns its data and draws into the one shared [`Canvas`].
//! The [`LayerManager`] paints visible layers in ascending `z_index` order
//! every frame. Layers never reference each other: cross-layer effects travel
//! over the [`EventBus`] or through the [`GameStore`].
//!
//! | layer | z |
//! |---|---|
//! | background | 0 |
//! | terrain | 1 |
//! | territory | 2 |
//! | path | 3 |
//! | map | 4 |
//! | interaction | 5 |
//! | player | 6 |
//! | ui | 8 |
//! | geolocation | 10 |
//! | debug | 100 (hidden) |

mod background;
mod debug;
mod geolocation;
pub mod interaction;
mod manager;
mod map_layer;
mod path;
mod player;
mod render_loop;
mod terrain;
mod territory;
mod ui;

pub use background::BackgroundLayer;
pub use debug::DebugLayer;
pub use geolocation::{GeolocationLayer, PermissionUx};
pub use interaction::{
    InputHandle, InteractionConfig, InteractionLayer, PointerInput, PointerModality,
    PointerPhase, UiElement, DEFAULT_DRAG_THRESHOLD_PX, GPS_BUTTON, MENU_BUTTON,
};
pub use manager::{LayerCommand, LayerInfo, LayerManager, LayerTiming, RenderSummary};
pub use map_layer::MapLayer;
pub use path::{PathConfig, PathLayer, PathTrail, TrailPoint};
pub use player::PlayerLayer;
pub use render_loop::run_render_loop;
pub use terrain::TerrainLayer;
pub use territory::TerritoryLayer;
pub use ui::UiLayer;

use crate::canvas::Canvas;
use crate::events::EventBus;
use crate::geo::MapViewport;
use crate::state::GameStore;
use std::sync::Arc;
use thiserror::Error;

/// Errors from layer registration and painting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("layer already registered: {0}")]
    DuplicateName(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    #[error("layer {layer} failed to initialize: {reason}")]
    Init { layer: String, reason: String },

    #[error("layer {layer} failed to render: {reason}")]
    Render { layer: String, reason: String },
}

/// Shared services handed to [`Layer::init`].
#[derive(Debug, Clone)]
pub struct LayerContext {
    pub bus: Arc<EventBus>,
    pub store: Arc<GameStore>,
}

/// Everything a layer may touch while painting one frame.
pub struct Frame<'a> {
    pub canvas: &'a mut dyn Canvas,
    pub store: &'a GameStore,
    /// Milliseconds since the previous frame.
    pub delta_ms: f64,
    pub frame_index: u64,
    /// Wall clock at the start of the pass.
    pub now_ms: u64,
}

impl Frame<'_> {
    /// Projection of the current map view onto this canvas.
    pub fn viewport(&self) -> MapViewport {
        let (center, zoom) = self.store.read(|s| (s.map.center, s.map.zoom));
        MapViewport::new(
            center,
            f64::from(zoom),
            self.canvas.width() as f32,
            self.canvas.height() as f32,
        )
    }
}

/// A named, z-ordered drawing unit.
pub trait Layer: Send {
    /// Unique name.
    fn name(&self) -> &str;

    /// Paint order. Lower paints first.
    fn z_index(&self) -> i32;

    /// Called once when added to a manager. Subscribe to the bus here.
    fn init(&mut self, _ctx: &LayerContext) -> Result<(), LayerError> {
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError>;

    /// Called once on removal. Drop subscriptions and buffers here.
    fn destroy(&mut self) {}

    fn visible_by_default(&self) -> bool {
        true
    }
}
