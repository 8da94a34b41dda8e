//! The map widget contract.

use crate::canvas::Rgba;
use crate::geo::LatLng;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque handle to a marker placed on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

impl fmt::Display for MarkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// How a marker is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct IconSpec {
    pub icon: &'static str,
    pub color: Rgba,
    /// Diameter in pixels.
    pub size: f32,
    /// Paint order among markers (higher on top).
    pub z_offset: i32,
    /// Inclusive zoom range in which the marker is drawn.
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub label: Option<String>,
}

impl IconSpec {
    pub fn visible_at(&self, zoom: u8) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }
}

/// Camera movement options for [`MapSurface::set_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewOptions {
    pub animate: bool,
    pub duration: Duration,
}

impl ViewOptions {
    pub fn animated() -> Self {
        Self {
            animate: true,
            duration: Duration::from_secs(1),
        }
    }

    pub fn instant() -> Self {
        Self::default()
    }
}

/// Errors reported by a map surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("map is not ready")]
    NotReady,

    #[error("unknown marker {0}")]
    UnknownMarker(MarkerHandle),
}

/// The slippy-map widget. Tile loading and styling belong to the
/// implementation. The core only places markers and moves the camera.
pub trait MapSurface: Send + Sync {
    /// Whether the map accepts markers yet.
    fn is_ready(&self) -> bool;

    fn add_marker(&self, at: LatLng, icon: &IconSpec) -> Result<MarkerHandle, MapError>;

    fn remove_marker(&self, handle: MarkerHandle) -> Result<(), MapError>;

    fn set_lat_lng(&self, handle: MarkerHandle, at: LatLng) -> Result<(), MapError>;

    fn set_view(&self, center: LatLng, zoom: u8, options: ViewOptions);

    /// Ask the map to recompute its layout and redraw.
    fn invalidate(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_zoom_range_is_inclusive() {
        let icon = IconSpec {
            icon: "x",
            color: Rgba::WHITE,
            size: 10.0,
            z_offset: 0,
            min_zoom: 12,
            max_zoom: 16,
            label: None,
        };
        assert!(!icon.visible_at(11));
        assert!(icon.visible_at(12));
        assert!(icon.visible_at(16));
        assert!(!icon.visible_at(17));
    }
}
