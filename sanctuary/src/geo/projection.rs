//! Web Mercator projection between geographic coordinates and screen pixels.
//!
//! The map is a square world of `TILE_SIZE * 2^zoom` pixels per side. A
//! [`MapViewport`] places that world on the canvas so the viewport center sits
//! in the middle of the canvas.

use super::{LatLng, ScreenPoint};
use std::f64::consts::PI;

/// Pixel size of one map tile at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Ground resolution at the equator for zoom 0, in meters per pixel.
const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;

#[inline]
fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2.0_f64.powf(zoom)
}

/// Project a coordinate to absolute world pixels at `zoom`.
///
/// Latitude is clamped to the Mercator range first, so the poles map to the
/// top and bottom edges instead of infinity.
#[inline]
pub fn world_pixel(at: LatLng, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = at.lat.clamp(MIN_LAT, MAX_LAT);

    let x = (at.lng + 180.0) / 360.0 * size;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * size;

    (x, y)
}

/// Inverse of [`world_pixel`].
#[inline]
pub fn world_pixel_to_lat_lng(x: f64, y: f64, zoom: f64) -> LatLng {
    let size = world_size(zoom);

    let lng = x / size * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y / size)).sinh().atan();

    LatLng::new(lat_rad * 180.0 / PI, lng)
}

/// Ground resolution at a latitude and zoom.
pub fn meters_per_pixel(lat: f64, zoom: f64) -> f64 {
    EQUATOR_METERS_PER_PIXEL * lat.to_radians().cos() / 2.0_f64.powf(zoom)
}

/// Great-circle distance between two coordinates (haversine).
pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Bearing between two points (flat-earth approximation).
///
/// Returns degrees in `[0, 360)`, where 0 = North, 90 = East. Accurate enough
/// for the short hops between consecutive GPS fixes.
pub fn bearing_deg(from: LatLng, to: LatLng) -> f64 {
    let d_lat = to.lat - from.lat;
    let d_lng = to.lng - from.lng;

    let bearing = d_lng.atan2(d_lat).to_degrees();
    if bearing < 0.0 {
        bearing + 360.0
    } else {
        bearing
    }
}

/// A view of the map on a canvas of `width` x `height` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width: f32,
    pub height: f32,
}

impl MapViewport {
    pub fn new(center: LatLng, zoom: f64, width: f32, height: f32) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
        }
    }

    /// Screen position of a coordinate. Points outside the view produce
    /// coordinates outside `0..width` / `0..height`.
    pub fn to_screen(&self, at: LatLng) -> ScreenPoint {
        let (cx, cy) = world_pixel(self.center, self.zoom);
        let (px, py) = world_pixel(at, self.zoom);
        ScreenPoint::new(
            (px - cx) as f32 + self.width / 2.0,
            (py - cy) as f32 + self.height / 2.0,
        )
    }

    /// Coordinate under a screen point.
    pub fn to_lat_lng(&self, point: ScreenPoint) -> LatLng {
        let (cx, cy) = world_pixel(self.center, self.zoom);
        let x = cx + f64::from(point.x - self.width / 2.0);
        let y = cy + f64::from(point.y - self.height / 2.0);
        world_pixel_to_lat_lng(x, y, self.zoom)
    }

    /// Whether a screen point falls inside the canvas, with `margin` pixels of
    /// slack so partially visible markers still draw.
    pub fn is_on_screen(&self, point: ScreenPoint, margin: f32) -> bool {
        point.x >= -margin
            && point.y >= -margin
            && point.x <= self.width + margin
            && point.y <= self.height + margin
    }

    /// Convert a ground distance at the viewport center into pixels.
    pub fn meters_to_pixels(&self, meters: f64) -> f32 {
        (meters / meters_per_pixel(self.center.lat, self.zoom)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_pixel_origin_at_zoom_zero() {
        let (x, y) = world_pixel(LatLng::new(0.0, 0.0), 0.0);
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_world_pixel_round_trip_harmala() {
        let harmala = LatLng::new(61.2925, 23.7153);
        let (x, y) = world_pixel(harmala, 18.0);
        let back = world_pixel_to_lat_lng(x, y, 18.0);
        assert!((back.lat - harmala.lat).abs() < 1e-9);
        assert!((back.lng - harmala.lng).abs() < 1e-9);
    }

    #[test]
    fn test_poles_are_clamped() {
        let (_, y_north) = world_pixel(LatLng::new(90.0, 0.0), 1.0);
        let (_, y_south) = world_pixel(LatLng::new(-90.0, 0.0), 1.0);
        assert!(y_north.is_finite());
        assert!(y_south.is_finite());
        assert!(y_north < y_south);
    }

    #[test]
    fn test_viewport_center_maps_to_canvas_middle() {
        let view = MapViewport::new(LatLng::new(61.5, 23.76), 18.0, 800.0, 600.0);
        let p = view.to_screen(view.center);
        assert!((p.x - 400.0).abs() < 1e-3);
        assert!((p.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_viewport_north_is_up() {
        let view = MapViewport::new(LatLng::new(61.5, 23.76), 16.0, 800.0, 600.0);
        let north = view.to_screen(LatLng::new(61.501, 23.76));
        let east = view.to_screen(LatLng::new(61.5, 23.761));
        assert!(north.y < 300.0);
        assert!(east.x > 400.0);
    }

    #[test]
    fn test_viewport_inverse() {
        let view = MapViewport::new(LatLng::new(40.7128, -74.0060), 15.0, 640.0, 480.0);
        let point = ScreenPoint::new(100.0, 400.0);
        let there = view.to_lat_lng(point);
        let back = view.to_screen(there);
        assert!((back.x - point.x).abs() < 0.01);
        assert!((back.y - point.y).abs() < 0.01);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_m(LatLng::new(0.0, 0.0), LatLng::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinals() {
        let origin = LatLng::new(53.0, 10.0);
        assert!(bearing_deg(origin, LatLng::new(53.1, 10.0)).abs() < 0.1);
        assert!((bearing_deg(origin, LatLng::new(53.0, 10.1)) - 90.0).abs() < 0.1);
        assert!((bearing_deg(origin, LatLng::new(52.9, 10.0)) - 180.0).abs() < 0.1);
        assert!((bearing_deg(origin, LatLng::new(53.0, 9.9)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_meters_per_pixel_shrinks_with_zoom() {
        let z10 = meters_per_pixel(45.0, 10.0);
        let z11 = meters_per_pixel(45.0, 11.0);
        assert!((z10 / z11 - 2.0).abs() < 1e-9);
    }
}
