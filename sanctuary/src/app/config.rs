//! Application configuration for `SanctuaryApp`.

use crate::config::ConfigFile;
use crate::gps::GpsConfig;
use crate::layers::{InteractionConfig, PathConfig};
use crate::map::MapObjectConfig;

/// Default canvas width in pixels.
pub const DEFAULT_RENDER_WIDTH: u32 = 800;

/// Default canvas height in pixels.
pub const DEFAULT_RENDER_HEIGHT: u32 = 600;

/// Canvas and overlay settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Show the debug overlay from the first frame.
    pub debug_layer: bool,
    /// Seed for the background particles. Random when unset.
    pub background_seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_RENDER_WIDTH,
            height: DEFAULT_RENDER_HEIGHT,
            debug_layer: false,
            background_seed: None,
        }
    }
}

impl RenderConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_debug_layer(mut self, enabled: bool) -> Self {
        self.debug_layer = enabled;
        self
    }

    pub fn with_background_seed(mut self, seed: u64) -> Self {
        self.background_seed = Some(seed);
        self
    }
}

/// Everything needed to bring the application up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub gps: GpsConfig,
    pub objects: MapObjectConfig,
    pub interaction: InteractionConfig,
    pub render: RenderConfig,
    pub path: PathConfig,
}

impl AppConfig {
    /// Translate the user configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            gps: config.gps_config(),
            objects: config.map_object_config(),
            interaction: config.interaction_config(),
            render: RenderConfig {
                width: config.render.width,
                height: config.render.height,
                debug_layer: config.render.debug_layer,
                background_seed: None,
            },
            path: PathConfig::default(),
        }
    }

    pub fn with_gps(mut self, gps: GpsConfig) -> Self {
        self.gps = gps;
        self
    }

    pub fn with_objects(mut self, objects: MapObjectConfig) -> Self {
        self.objects = objects;
        self
    }

    /// Set the render settings. The interaction layer anchors right-aligned
    /// elements to the same width.
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.interaction.canvas_width = render.width as f32;
        self.render = render;
        self
    }
}

impl From<&ConfigFile> for AppConfig {
    fn from(config: &ConfigFile) -> Self {
        Self::from_config_file(config)
    }
}
