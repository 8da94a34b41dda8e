//! Normalized positions and raw device readings.

use crate::geo::{is_valid_coordinates, LatLng};
use serde::{Deserialize, Serialize};

/// A position accepted by the GPS core.
///
/// Only the GPS core constructs these. Coordinates have passed
/// [`is_valid_coordinates`] and `accuracy`, when present, is finite and
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    /// Accuracy radius in meters.
    pub accuracy: Option<f64>,
    pub timestamp_ms: u64,
    /// Synthesized from the configured default location, not measured.
    pub is_fallback: bool,
}

impl Position {
    /// A synthesized position at the configured default location.
    pub fn fallback(at: LatLng, accuracy_m: f64, timestamp_ms: u64) -> Self {
        Self {
            lat: at.lat,
            lng: at.lng,
            accuracy: Some(accuracy_m),
            timestamp_ms,
            is_fallback: true,
        }
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// A sample as reported by the device, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    /// Device timestamp, if the device reported one.
    pub timestamp_ms: Option<u64>,
}

impl RawReading {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp_ms: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Validate and normalize into a [`Position`].
    ///
    /// Returns `None` for non-finite or out-of-range coordinates. A negative or
    /// non-finite accuracy is dropped rather than rejecting the fix.
    pub fn normalize(&self, now_ms: u64) -> Option<Position> {
        if !is_valid_coordinates(self.latitude, self.longitude) {
            return None;
        }

        let accuracy = self.accuracy.filter(|a| a.is_finite() && *a >= 0.0);
        Some(Position {
            lat: self.latitude,
            lng: self.longitude,
            accuracy,
            timestamp_ms: self.timestamp_ms.unwrap_or(now_ms),
            is_fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_valid_reading() {
        let position = RawReading::new(61.50, 23.76, Some(8.0))
            .normalize(1_000)
            .expect("valid reading");
        assert_eq!(position.lat, 61.50);
        assert_eq!(position.lng, 23.76);
        assert_eq!(position.accuracy, Some(8.0));
        assert_eq!(position.timestamp_ms, 1_000);
        assert!(!position.is_fallback);
    }

    #[test]
    fn test_normalize_keeps_device_timestamp() {
        let position = RawReading::new(0.0, 0.0, None)
            .with_timestamp(77)
            .normalize(1_000)
            .expect("valid reading");
        assert_eq!(position.timestamp_ms, 77);
    }

    #[test]
    fn test_normalize_drops_negative_accuracy() {
        let position = RawReading::new(10.0, 10.0, Some(-5.0))
            .normalize(0)
            .expect("coordinates are valid");
        assert_eq!(position.accuracy, None);
    }

    #[test]
    fn test_normalize_rejects_out_of_range() {
        assert!(RawReading::new(95.0, 0.0, Some(5.0)).normalize(0).is_none());
        assert!(RawReading::new(0.0, 200.0, Some(5.0)).normalize(0).is_none());
        assert!(RawReading::new(f64::NAN, 0.0, None).normalize(0).is_none());
    }

    #[test]
    fn test_fallback_position_is_flagged() {
        let p = Position::fallback(LatLng::new(61.2925, 23.7153), 1000.0, 9);
        assert!(p.is_fallback);
        assert_eq!(p.accuracy, Some(1000.0));
        assert_eq!(p.lat_lng(), LatLng::new(61.2925, 23.7153));
    }

    proptest! {
        #[test]
        fn prop_normalize_agrees_with_validity(
            lat in prop_oneof![-200.0f64..200.0, Just(f64::NAN), Just(f64::INFINITY)],
            lng in prop_oneof![-400.0f64..400.0, Just(f64::NEG_INFINITY)],
        ) {
            let normalized = RawReading::new(lat, lng, Some(3.0)).normalize(0);
            prop_assert_eq!(normalized.is_some(), is_valid_coordinates(lat, lng));
        }
    }
}
