//! Addressable `section.key` settings for `config get|set|list`.

use super::{ConfigError, ConfigFile};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Highest zoom level the map tiles support.
const MAX_ZOOM: u8 = 20;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Every configurable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    GpsEnableHighAccuracy,
    GpsTimeoutMs,
    GpsMaximumAgeMs,
    GpsRetryAttempts,
    GpsRetryDelayMs,
    GpsFallbackLat,
    GpsFallbackLng,
    GpsFallbackName,
    GpsStalenessMs,
    MapDefaultZoom,
    MapPerformanceThreshold,
    MapInvalidateIntervalMs,
    InputDragThresholdPx,
    RenderWidth,
    RenderHeight,
    RenderDebugLayer,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            GpsEnableHighAccuracy,
            GpsTimeoutMs,
            GpsMaximumAgeMs,
            GpsRetryAttempts,
            GpsRetryDelayMs,
            GpsFallbackLat,
            GpsFallbackLng,
            GpsFallbackName,
            GpsStalenessMs,
            MapDefaultZoom,
            MapPerformanceThreshold,
            MapInvalidateIntervalMs,
            InputDragThresholdPx,
            RenderWidth,
            RenderHeight,
            RenderDebugLayer,
            LoggingLevel,
            LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            GpsEnableHighAccuracy | GpsTimeoutMs | GpsMaximumAgeMs | GpsRetryAttempts
            | GpsRetryDelayMs | GpsFallbackLat | GpsFallbackLng | GpsFallbackName
            | GpsStalenessMs => "gps",
            MapDefaultZoom | MapPerformanceThreshold | MapInvalidateIntervalMs => "map",
            InputDragThresholdPx => "input",
            RenderWidth | RenderHeight | RenderDebugLayer => "render",
            LoggingLevel | LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            GpsEnableHighAccuracy => "enable_high_accuracy",
            GpsTimeoutMs => "timeout_ms",
            GpsMaximumAgeMs => "maximum_age_ms",
            GpsRetryAttempts => "retry_attempts",
            GpsRetryDelayMs => "retry_delay_ms",
            GpsFallbackLat => "fallback_lat",
            GpsFallbackLng => "fallback_lng",
            GpsFallbackName => "fallback_name",
            GpsStalenessMs => "staleness_ms",
            MapDefaultZoom => "default_zoom",
            MapPerformanceThreshold => "performance_threshold",
            MapInvalidateIntervalMs => "invalidate_interval_ms",
            InputDragThresholdPx => "drag_threshold_px",
            RenderWidth => "width",
            RenderHeight => "height",
            RenderDebugLayer => "debug_layer",
            LoggingLevel => "level",
            LoggingDirectory => "directory",
        }
    }

    /// Dotted name, e.g. `gps.timeout_ms`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written to the file. Empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            GpsEnableHighAccuracy => config.gps.enable_high_accuracy.to_string(),
            GpsTimeoutMs => config.gps.timeout_ms.to_string(),
            GpsMaximumAgeMs => config.gps.maximum_age_ms.to_string(),
            GpsRetryAttempts => config.gps.retry_attempts.to_string(),
            GpsRetryDelayMs => config.gps.retry_delay_ms.to_string(),
            GpsFallbackLat => config.gps.fallback_lat.to_string(),
            GpsFallbackLng => config.gps.fallback_lng.to_string(),
            GpsFallbackName => config.gps.fallback_name.clone(),
            GpsStalenessMs => config.gps.staleness_ms.to_string(),
            MapDefaultZoom => config.map.default_zoom.to_string(),
            MapPerformanceThreshold => config.map.performance_threshold.to_string(),
            MapInvalidateIntervalMs => config.map.invalidate_interval_ms.to_string(),
            InputDragThresholdPx => config.input.drag_threshold_px.to_string(),
            RenderWidth => config.render.width.to_string(),
            RenderHeight => config.render.height.to_string(),
            RenderDebugLayer => config.render.debug_layer.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and validate `value`, then store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            GpsEnableHighAccuracy => config.gps.enable_high_accuracy = self.parse(value)?,
            GpsTimeoutMs => config.gps.timeout_ms = self.parse_positive(value)?,
            GpsMaximumAgeMs => config.gps.maximum_age_ms = self.parse(value)?,
            GpsRetryAttempts => config.gps.retry_attempts = self.parse(value)?,
            GpsRetryDelayMs => config.gps.retry_delay_ms = self.parse(value)?,
            GpsFallbackLat => {
                let lat: f64 = self.parse(value)?;
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(ConfigError::invalid(&self.name(), value, "latitude out of range"));
                }
                config.gps.fallback_lat = lat;
            }
            GpsFallbackLng => {
                let lng: f64 = self.parse(value)?;
                if !(-180.0..=180.0).contains(&lng) {
                    return Err(ConfigError::invalid(&self.name(), value, "longitude out of range"));
                }
                config.gps.fallback_lng = lng;
            }
            GpsFallbackName => {
                if value.is_empty() {
                    return Err(ConfigError::invalid(&self.name(), value, "must not be empty"));
                }
                config.gps.fallback_name = value.to_string();
            }
            GpsStalenessMs => config.gps.staleness_ms = self.parse(value)?,
            MapDefaultZoom => {
                let zoom: u8 = self.parse(value)?;
                if zoom > MAX_ZOOM {
                    return Err(ConfigError::invalid(
                        &self.name(),
                        value,
                        format!("zoom must be at most {MAX_ZOOM}"),
                    ));
                }
                config.map.default_zoom = zoom;
            }
            MapPerformanceThreshold => {
                config.map.performance_threshold = self.parse_positive(value)?
            }
            MapInvalidateIntervalMs => config.map.invalidate_interval_ms = self.parse(value)?,
            InputDragThresholdPx => {
                let px: f32 = self.parse(value)?;
                if !px.is_finite() || px < 0.0 {
                    return Err(ConfigError::invalid(&self.name(), value, "must be a non-negative number"));
                }
                config.input.drag_threshold_px = px;
            }
            RenderWidth => config.render.width = self.parse_positive(value)?,
            RenderHeight => config.render.height = self.parse_positive(value)?,
            RenderDebugLayer => config.render.debug_layer = self.parse(value)?,
            LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::invalid(
                        &self.name(),
                        value,
                        format!("expected one of {}", LOG_LEVELS.join(", ")),
                    ));
                }
                config.logging.level = level;
            }
            LoggingDirectory => {
                config.logging.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(&self.name(), value, e.to_string()))
    }

    fn parse_positive<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + Default + PartialOrd,
        T::Err: fmt::Display,
    {
        let parsed: T = self.parse(value)?;
        if parsed <= T::default() {
            return Err(ConfigError::invalid(&self.name(), value, "must be greater than zero"));
        }
        Ok(parsed)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
