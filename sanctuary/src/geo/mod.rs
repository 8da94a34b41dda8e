//! Geographic and screen-space primitives.
//!
//! [`LatLng`] is the world coordinate every component agrees on. Screen
//! geometry ([`ScreenPoint`], [`ScreenRect`]) is in canvas pixels with the
//! origin at the top-left corner.

mod projection;

pub use projection::{
    bearing_deg, distance_m, meters_per_pixel, world_pixel, world_pixel_to_lat_lng, MapViewport,
    MAX_LAT, MIN_LAT, TILE_SIZE,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns true when `lat`/`lng` are finite and within the WGS84 ranges
/// (`[-90, 90]` and `[-180, 180]`).
#[inline]
pub fn is_valid_coordinates(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// See [`is_valid_coordinates`].
    pub fn is_valid(&self) -> bool {
        is_valid_coordinates(self.lat, self.lng)
    }

    /// Offset by whole degrees, used for scattering test objects.
    pub fn offset(&self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// A point on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: ScreenPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An axis-aligned rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive on the top/left edges, exclusive on the bottom/right edges.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Grow (or shrink, for negative `by`) on every side.
    pub fn inflate(&self, by: f32) -> Self {
        Self::new(
            self.x - by,
            self.y - by,
            self.width + 2.0 * by,
            self.height + 2.0 * by,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_coordinates_bounds() {
        assert!(is_valid_coordinates(90.0, 180.0));
        assert!(is_valid_coordinates(-90.0, -180.0));
        assert!(is_valid_coordinates(61.2925, 23.7153));
        assert!(!is_valid_coordinates(90.0001, 0.0));
        assert!(!is_valid_coordinates(0.0, -180.0001));
        assert!(!is_valid_coordinates(f64::NAN, 0.0));
        assert!(!is_valid_coordinates(0.0, f64::INFINITY));
    }

    #[test]
    fn test_rect_contains_edges() {
        let rect = ScreenRect::new(20.0, 20.0, 120.0, 40.0);
        assert!(rect.contains(ScreenPoint::new(20.0, 20.0)));
        assert!(rect.contains(ScreenPoint::new(139.9, 59.9)));
        assert!(!rect.contains(ScreenPoint::new(140.0, 30.0)));
        assert!(!rect.contains(ScreenPoint::new(19.9, 30.0)));
    }

    #[test]
    fn test_screen_distance() {
        let a = ScreenPoint::new(0.0, 0.0);
        assert!((a.distance_to(ScreenPoint::new(3.0, 4.0)) - 5.0).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_in_range_coordinates_are_valid(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
            prop_assert!(is_valid_coordinates(lat, lng));
        }

        #[test]
        fn prop_out_of_range_latitude_is_invalid(
            lat in prop_oneof![90.000_001f64..1e6, -1e6f64..-90.000_001],
            lng in -180.0f64..=180.0,
        ) {
            prop_assert!(!is_valid_coordinates(lat, lng));
        }

        #[test]
        fn prop_out_of_range_longitude_is_invalid(
            lat in -90.0f64..=90.0,
            lng in prop_oneof![180.000_001f64..1e6, -1e6f64..-180.000_001],
        ) {
            prop_assert!(!is_valid_coordinates(lat, lng));
        }
    }
}
