//! GPS acquisition configuration.

use crate::geo::LatLng;
use std::time::Duration;

/// Default device timeout per request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default maximum age of a cached device fix.
pub const DEFAULT_MAXIMUM_AGE: Duration = Duration::from_secs(5);

/// Default number of timeout retries before falling back.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base retry delay. Attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Accuracy reported for synthesized fallback positions, in meters.
pub const FALLBACK_ACCURACY_M: f64 = 1000.0;

/// Persisted positions older than this are ignored at startup.
pub const DEFAULT_STALENESS_CEILING: Duration = Duration::from_secs(60 * 60);

/// Zoom used when the map is centered on the first fix.
pub const DEFAULT_MAP_ZOOM: u8 = 18;

/// Named default location used when no fix can be obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackLocation {
    pub position: LatLng,
    pub name: String,
}

impl Default for FallbackLocation {
    fn default() -> Self {
        Self {
            position: LatLng::new(61.2925, 23.7153),
            name: "Härmälä, Finland".to_string(),
        }
    }
}

/// Options passed to the device with each request or watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
        }
    }
}

/// Configuration for the acquisition state machine and its driver.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsConfig {
    pub options: PositionOptions,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub fallback: FallbackLocation,
    pub fallback_accuracy_m: f64,
    pub staleness_ceiling: Duration,
    pub map_zoom: u8,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            options: PositionOptions::default(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            fallback: FallbackLocation::default(),
            fallback_accuracy_m: FALLBACK_ACCURACY_M,
            staleness_ceiling: DEFAULT_STALENESS_CEILING,
            map_zoom: DEFAULT_MAP_ZOOM,
        }
    }
}

impl GpsConfig {
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_fallback(mut self, position: LatLng, name: impl Into<String>) -> Self {
        self.fallback = FallbackLocation {
            position,
            name: name.into(),
        };
        self
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_staleness_ceiling(mut self, ceiling: Duration) -> Self {
        self.staleness_ceiling = ceiling;
        self
    }

    pub fn with_map_zoom(mut self, zoom: u8) -> Self {
        self.map_zoom = zoom;
        self
    }

    /// Delay before retry `attempt` (1-based).
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GpsConfig::default();
        assert!(config.options.enable_high_accuracy);
        assert_eq!(config.options.timeout, Duration::from_millis(15_000));
        assert_eq!(config.options.maximum_age, Duration::from_millis(5_000));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.fallback.position, LatLng::new(61.2925, 23.7153));
        assert_eq!(config.staleness_ceiling, Duration::from_millis(3_600_000));
    }

    #[test]
    fn test_linear_backoff() {
        let config = GpsConfig::default();
        assert_eq!(config.retry_delay_for(1), Duration::from_secs(2));
        assert_eq!(config.retry_delay_for(2), Duration::from_secs(4));
        assert_eq!(config.retry_delay_for(3), Duration::from_secs(6));
    }
}
