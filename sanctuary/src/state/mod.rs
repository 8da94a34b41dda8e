//! Shared game state behind an explicit accessor.
//!
//! [`GameStore`] is constructed once by the composition root and handed to
//! every component that needs it. Reads and writes go through closures so the
//! lock is never visible to callers and never held across an `emit`.
//!
//! Each write is tagged with a `source` string and recorded in a bounded change
//! log, which is what the debug overlay shows.

use crate::clock::{Clock, SystemClock};
use crate::geo::{LatLng, MapViewport};
use crate::gps::Position;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of change records retained.
pub const DEFAULT_CHANGE_LOG_LIMIT: usize = 50;

/// Zoom level the map starts at before the first fix.
pub const INITIAL_MAP_ZOOM: u8 = 13;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub health: u32,
    pub sanity: u32,
    pub steps: u64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            health: 100,
            sanity: 100,
            steps: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub name: String,
    /// Latest position fed by GPS, fallback included.
    pub position: Option<Position>,
    pub stats: PlayerStats,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: "Wanderer".to_string(),
            position: None,
            stats: PlayerStats::default(),
        }
    }
}

/// A claimed base and its territory radius.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseSite {
    pub id: String,
    pub name: String,
    pub position: LatLng,
    pub radius_m: f64,
}

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapViewState {
    pub center: LatLng,
    pub zoom: u8,
    pub viewport: Viewport,
}

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            center: LatLng::new(0.0, 0.0),
            zoom: INITIAL_MAP_ZOOM,
            viewport: Viewport::default(),
        }
    }
}

impl MapViewState {
    /// Projection for the current center, zoom and canvas size.
    pub fn projection(&self) -> MapViewport {
        MapViewport::new(
            self.center,
            f64::from(self.zoom),
            self.viewport.width as f32,
            self.viewport.height as f32,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiState {
    pub menu_open: bool,
    pub debug_mode: bool,
    pub status_text: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPerformance {
    pub fps: f64,
    /// Mean duration of a full render pass over the last second.
    pub render_time_ms: f64,
    pub frame_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemState {
    pub initialized: bool,
    pub paused: bool,
    pub last_update_ms: u64,
    pub performance: RenderPerformance,
}

/// The whole shared state tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub player: PlayerState,
    pub bases: Vec<BaseSite>,
    pub current_base: Option<String>,
    pub map: MapViewState,
    pub ui: UiState,
    pub system: SystemState,
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub version: u64,
    pub source: String,
    pub timestamp_ms: u64,
}

/// Thread-safe owner of [`GameState`].
#[derive(Debug)]
pub struct GameStore {
    state: RwLock<GameState>,
    version: AtomicU64,
    changes: Mutex<VecDeque<StateChange>>,
    change_limit: usize,
    clock: Arc<dyn Clock>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new(GameState::default())
    }
}

impl GameStore {
    pub fn new(initial: GameState) -> Self {
        Self::with_clock(initial, Arc::new(SystemClock))
    }

    pub fn with_clock(initial: GameState, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(initial),
            version: AtomicU64::new(0),
            changes: Mutex::new(VecDeque::with_capacity(DEFAULT_CHANGE_LOG_LIMIT)),
            change_limit: DEFAULT_CHANGE_LOG_LIMIT,
            clock,
        }
    }

    /// Run `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&GameState) -> R) -> R {
        f(&self.state.read())
    }

    /// Mutate the state and record the write under `source`.
    ///
    /// `f` must not call back into the store.
    pub fn update<R>(&self, source: &str, f: impl FnOnce(&mut GameState) -> R) -> R {
        let now = self.clock.now_ms();
        let result = {
            let mut state = self.state.write();
            let result = f(&mut state);
            state.system.last_update_ms = now;
            result
        };

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut changes = self.changes.lock();
        changes.push_back(StateChange {
            version,
            source: source.to_string(),
            timestamp_ms: now,
        });
        while changes.len() > self.change_limit {
            changes.pop_front();
        }

        result
    }

    /// Deep copy of the state.
    pub fn snapshot(&self) -> GameState {
        self.state.read().clone()
    }

    /// Number of writes since construction.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// The most recent `limit` writes, oldest first.
    pub fn recent_changes(&self, limit: usize) -> Vec<StateChange> {
        let changes = self.changes.lock();
        let skip = changes.len().saturating_sub(limit);
        changes.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_update_bumps_version_and_logs_source() {
        let clock = Arc::new(ManualClock::new(42));
        let store = GameStore::with_clock(GameState::default(), clock);

        store.update("test", |s| s.ui.menu_open = true);
        store.update("gps", |s| s.map.zoom = 18);

        assert_eq!(store.version(), 2);
        assert!(store.read(|s| s.ui.menu_open));
        assert_eq!(store.read(|s| s.system.last_update_ms), 42);

        let changes = store.recent_changes(10);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].source, "gps");
        assert_eq!(changes[1].version, 2);
    }

    #[test]
    fn test_change_log_is_bounded() {
        let store = GameStore::default();
        for n in 0..(DEFAULT_CHANGE_LOG_LIMIT + 10) {
            store.update("loop", |s| s.player.stats.steps = n as u64);
        }
        assert_eq!(store.recent_changes(usize::MAX).len(), DEFAULT_CHANGE_LOG_LIMIT);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = GameStore::default();
        let before = store.snapshot();
        store.update("test", |s| s.player.stats.health = 3);
        assert_eq!(before.player.stats.health, 100);
        assert_eq!(store.read(|s| s.player.stats.health), 3);
    }

    #[test]
    fn test_projection_uses_viewport() {
        let mut view = MapViewState::default();
        view.viewport = Viewport {
            width: 800,
            height: 600,
        };
        let projection = view.projection();
        assert_eq!(projection.width, 800.0);
        assert_eq!(projection.zoom, f64::from(INITIAL_MAP_ZOOM));
    }
}
