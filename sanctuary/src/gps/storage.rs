//! Persistence of the last known position.
//!
//! One record `{lat, lng, accuracy, timestamp}` is written after every valid
//! fix and read once at startup. A record older than the staleness ceiling is
//! ignored.

use super::Position;
use crate::geo::is_valid_coordinates;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name of the persisted record inside the data directory.
pub const STORE_FILE_NAME: &str = "gps_last_position.json";

/// Errors from a position store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("position store record is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// The persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPosition {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
    /// Wall-clock milliseconds at save time.
    pub timestamp: u64,
}

impl StoredPosition {
    pub fn from_position(position: &Position, saved_at_ms: u64) -> Self {
        Self {
            lat: position.lat,
            lng: position.lng,
            accuracy: position.accuracy,
            timestamp: saved_at_ms,
        }
    }

    /// Convert back, rejecting records with invalid coordinates.
    pub fn to_position(&self) -> Option<Position> {
        if !is_valid_coordinates(self.lat, self.lng) {
            return None;
        }
        Some(Position {
            lat: self.lat,
            lng: self.lng,
            accuracy: self.accuracy.filter(|a| a.is_finite() && *a >= 0.0),
            timestamp_ms: self.timestamp,
            is_fallback: false,
        })
    }
}

/// Storage for the last known position.
pub trait PositionStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredPosition>, StoreError>;
    fn save(&self, record: &StoredPosition) -> Result<(), StoreError>;
}

/// Load the persisted position if it exists, is valid and is younger than
/// `ceiling`. Load failures are logged and treated as "nothing stored".
pub fn load_recent(store: &dyn PositionStore, now_ms: u64, ceiling: Duration) -> Option<Position> {
    let record = match store.load() {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load last known position");
            return None;
        }
    };

    let age_ms = now_ms.saturating_sub(record.timestamp);
    if u128::from(age_ms) >= ceiling.as_millis() {
        tracing::info!(age_ms, "Ignoring stale persisted position");
        return None;
    }

    let position = record.to_position();
    if position.is_none() {
        tracing::warn!(lat = record.lat, lng = record.lng, "Ignoring persisted position with invalid coordinates");
    }
    position
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory
    /// (`~/.local/share/eldritch-sanctuary/` on Linux).
    pub fn in_data_dir() -> Self {
        Self::new(default_store_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default location of the persisted record.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::APP_DIR_NAME)
        .join(STORE_FILE_NAME)
}

impl PositionStore for JsonFileStore {
    fn load(&self) -> Result<Option<StoredPosition>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, record: &StoredPosition) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(record)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<StoredPosition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: StoredPosition) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
        }
    }

    pub fn record(&self) -> Option<StoredPosition> {
        *self.slot.lock()
    }
}

impl PositionStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredPosition>, StoreError> {
        Ok(*self.slot.lock())
    }

    fn save(&self, record: &StoredPosition) -> Result<(), StoreError> {
        *self.slot.lock() = Some(*record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR_MS: u64 = 3_600_000;

    fn record(timestamp: u64) -> StoredPosition {
        StoredPosition {
            lat: 61.5,
            lng: 23.76,
            accuracy: Some(8.0),
            timestamp,
        }
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join(STORE_FILE_NAME));

        assert!(store.load().unwrap().is_none());
        store.save(&record(123)).unwrap();
        assert_eq!(store.load().unwrap(), Some(record(123)));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(record(5)).unwrap();
        assert_eq!(json["lat"], 61.5);
        assert_eq!(json["lng"], 23.76);
        assert_eq!(json["accuracy"], 8.0);
        assert_eq!(json["timestamp"], 5);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STORE_FILE_NAME);
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
        assert!(load_recent(&store, 0, Duration::from_millis(HOUR_MS)).is_none());
    }

    #[test]
    fn test_two_hour_old_record_is_stale() {
        let now = 10 * HOUR_MS;
        let store = MemoryStore::with_record(record(now - 2 * HOUR_MS));
        assert!(load_recent(&store, now, Duration::from_millis(HOUR_MS)).is_none());
    }

    #[test]
    fn test_recent_record_is_restored() {
        let now = 10 * HOUR_MS;
        let store = MemoryStore::with_record(record(now - 60_000));
        let position = load_recent(&store, now, Duration::from_millis(HOUR_MS)).unwrap();
        assert_eq!((position.lat, position.lng), (61.5, 23.76));
        assert!(!position.is_fallback);
    }

    #[test]
    fn test_exactly_at_ceiling_is_stale() {
        let now = 10 * HOUR_MS;
        let store = MemoryStore::with_record(record(now - HOUR_MS));
        assert!(load_recent(&store, now, Duration::from_millis(HOUR_MS)).is_none());
    }

    #[test]
    fn test_invalid_record_is_ignored() {
        let store = MemoryStore::with_record(StoredPosition {
            lat: 123.0,
            ..record(0)
        });
        assert!(load_recent(&store, 1, Duration::from_millis(HOUR_MS)).is_none());
    }
}
