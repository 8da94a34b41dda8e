//! Typed view of the INI file and its conversion into runtime configs.

use super::{config_file_path, ConfigError, ConfigKey};
use crate::geo::LatLng;
use crate::gps::{
    FallbackLocation, GpsConfig, PositionOptions, DEFAULT_MAP_ZOOM, DEFAULT_MAXIMUM_AGE,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_STALENESS_CEILING, DEFAULT_TIMEOUT,
};
use crate::layers::{InteractionConfig, DEFAULT_DRAG_THRESHOLD_PX};
use crate::logging::LoggingConfig;
use crate::map::{MapObjectConfig, DEFAULT_INVALIDATE_INTERVAL, DEFAULT_PERFORMANCE_THRESHOLD};
use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct GpsSettings {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub fallback_lat: f64,
    pub fallback_lng: f64,
    pub fallback_name: String,
    pub staleness_ms: u64,
}

impl Default for GpsSettings {
    fn default() -> Self {
        let fallback = FallbackLocation::default();
        Self {
            enable_high_accuracy: true,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            maximum_age_ms: DEFAULT_MAXIMUM_AGE.as_millis() as u64,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            fallback_lat: fallback.position.lat,
            fallback_lng: fallback.position.lng,
            fallback_name: fallback.name,
            staleness_ms: DEFAULT_STALENESS_CEILING.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub default_zoom: u8,
    pub performance_threshold: usize,
    pub invalidate_interval_ms: u64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_zoom: DEFAULT_MAP_ZOOM,
            performance_threshold: DEFAULT_PERFORMANCE_THRESHOLD,
            invalidate_interval_ms: DEFAULT_INVALIDATE_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSettings {
    pub drag_threshold_px: f32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub debug_layer: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            debug_layer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    /// Directory for the rolling log file. No file output when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub gps: GpsSettings,
    pub map: MapSettings,
    pub input: InputSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io(io),
            ini::Error::Parse(parse) => ConfigError::Parse(parse.to_string()),
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn gps_config(&self) -> GpsConfig {
        let gps = &self.gps;
        GpsConfig::default()
            .with_options(PositionOptions {
                enable_high_accuracy: gps.enable_high_accuracy,
                timeout: Duration::from_millis(gps.timeout_ms),
                maximum_age: Duration::from_millis(gps.maximum_age_ms),
            })
            .with_retry_attempts(gps.retry_attempts)
            .with_retry_delay(Duration::from_millis(gps.retry_delay_ms))
            .with_fallback(
                LatLng::new(gps.fallback_lat, gps.fallback_lng),
                gps.fallback_name.clone(),
            )
            .with_staleness_ceiling(Duration::from_millis(gps.staleness_ms))
            .with_map_zoom(self.map.default_zoom)
    }

    pub fn map_object_config(&self) -> MapObjectConfig {
        MapObjectConfig {
            performance_threshold: self.map.performance_threshold,
            invalidate_interval: Duration::from_millis(self.map.invalidate_interval_ms),
        }
    }

    pub fn interaction_config(&self) -> InteractionConfig {
        InteractionConfig {
            drag_threshold_px: self.input.drag_threshold_px,
            canvas_width: self.render.width as f32,
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            ..LoggingConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.gps.fallback_name, "Härmälä, Finland");
        assert_eq!(config.map.default_zoom, 18);
    }

    #[test]
    fn test_partial_file_and_unknown_keys() {
        let config = ConfigFile::parse(
            "[gps]\nretry_attempts = 5\nfavourite_colour = teal\n\n[render]\nwidth = 1024\n",
        )
        .unwrap();
        assert_eq!(config.gps.retry_attempts, 5);
        assert_eq!(config.gps.timeout_ms, 15_000);
        assert_eq!(config.render.width, 1024);
        assert_eq!(config.render.height, 600);
    }

    #[test]
    fn test_malformed_value_rejected() {
        let err = ConfigFile::parse("[map]\ndefault_zoom = close\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "map.default_zoom"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.gps.fallback_name = "Tampere".to_string();
        config.logging.directory = Some(dir.path().join("logs"));
        config.input.drag_threshold_px = 14.5;
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_runtime_configs() {
        let mut config = ConfigFile::default();
        config.gps.retry_delay_ms = 500;
        config.map.default_zoom = 16;
        config.render.width = 1280;

        let gps = config.gps_config();
        assert_eq!(gps.retry_delay, Duration::from_millis(500));
        assert_eq!(gps.map_zoom, 16);
        assert_eq!(gps, GpsConfig::default().with_retry_delay(Duration::from_millis(500)).with_map_zoom(16));
        assert_eq!(config.interaction_config().canvas_width, 1280.0);
        assert_eq!(
            config.map_object_config().invalidate_interval,
            Duration::from_millis(250)
        );
    }
}
