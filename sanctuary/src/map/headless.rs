//! In-memory map surface.

use super::surface::{IconSpec, MapError, MapSurface, MarkerHandle, ViewOptions};
use crate::geo::LatLng;
use crate::state::INITIAL_MAP_ZOOM;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A marker as the map holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub handle: MarkerHandle,
    pub position: LatLng,
    pub icon: IconSpec,
}

#[derive(Debug)]
struct HeadlessInner {
    ready: bool,
    markers: BTreeMap<MarkerHandle, MarkerState>,
    center: LatLng,
    zoom: u8,
    last_view_options: ViewOptions,
}

/// Map surface without tiles: markers and camera state live in memory and the
/// `MapLayer` draws them.
#[derive(Debug)]
pub struct HeadlessMap {
    inner: RwLock<HeadlessInner>,
    next_handle: AtomicU64,
    invalidations: AtomicU64,
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMap {
    /// A ready map centered on (0, 0).
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HeadlessInner {
                ready: true,
                markers: BTreeMap::new(),
                center: LatLng::new(0.0, 0.0),
                zoom: INITIAL_MAP_ZOOM,
                last_view_options: ViewOptions::default(),
            }),
            next_handle: AtomicU64::new(1),
            invalidations: AtomicU64::new(0),
        }
    }

    /// A map that rejects markers until [`set_ready`](Self::set_ready).
    pub fn not_ready() -> Self {
        let map = Self::new();
        map.set_ready(false);
        map
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.write().ready = ready;
    }

    /// Current camera center and zoom.
    pub fn view(&self) -> (LatLng, u8) {
        let inner = self.inner.read();
        (inner.center, inner.zoom)
    }

    pub fn last_view_options(&self) -> ViewOptions {
        self.inner.read().last_view_options
    }

    pub fn set_zoom(&self, zoom: u8) {
        self.inner.write().zoom = zoom;
    }

    pub fn marker_count(&self) -> usize {
        self.inner.read().markers.len()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<MarkerState> {
        self.inner.read().markers.get(&handle).cloned()
    }

    /// Every marker in paint order (ascending `z_offset`, then placement).
    pub fn markers(&self) -> Vec<MarkerState> {
        let mut markers: Vec<MarkerState> = self.inner.read().markers.values().cloned().collect();
        markers.sort_by_key(|m| (m.icon.z_offset, m.handle));
        markers
    }

    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl MapSurface for HeadlessMap {
    fn is_ready(&self) -> bool {
        self.inner.read().ready
    }

    fn add_marker(&self, at: LatLng, icon: &IconSpec) -> Result<MarkerHandle, MapError> {
        let mut inner = self.inner.write();
        if !inner.ready {
            return Err(MapError::NotReady);
        }
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        inner.markers.insert(
            handle,
            MarkerState {
                handle,
                position: at,
                icon: icon.clone(),
            },
        );
        Ok(handle)
    }

    fn remove_marker(&self, handle: MarkerHandle) -> Result<(), MapError> {
        self.inner
            .write()
            .markers
            .remove(&handle)
            .map(|_| ())
            .ok_or(MapError::UnknownMarker(handle))
    }

    fn set_lat_lng(&self, handle: MarkerHandle, at: LatLng) -> Result<(), MapError> {
        let mut inner = self.inner.write();
        let marker = inner
            .markers
            .get_mut(&handle)
            .ok_or(MapError::UnknownMarker(handle))?;
        marker.position = at;
        Ok(())
    }

    fn set_view(&self, center: LatLng, zoom: u8, options: ViewOptions) {
        let mut inner = self.inner.write();
        inner.center = center;
        inner.zoom = zoom;
        inner.last_view_options = options;
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
