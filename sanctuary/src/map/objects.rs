//! Registry of game objects placed on the map.
//!
//! [`MapObjectManager`] is the only writer of marker handles. Every create,
//! update and remove touches the map surface and the registry while holding
//! the registry lock, so the live markers on the map and the registry entries
//! never drift apart. Events go out after the lock is released so listeners
//! may call back into the manager.

use super::kinds::{ObjectKind, UnknownObjectKind};
use super::surface::{MapError, MapSurface, MarkerHandle};
use super::throttle::{
    InvalidationThrottle, ThrottleDecision, ThrottleMode, DEFAULT_INVALIDATE_INTERVAL,
    DEFAULT_PERFORMANCE_THRESHOLD,
};
use crate::clock::{Clock, SystemClock};
use crate::events::{Event, EventBus};
use crate::geo::LatLng;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Degrees of latitude/longitude test objects spread over around the center.
pub const TEST_OBJECT_SPREAD_DEG: f64 = 0.01;

/// Identifier of a map object, displayed as `obj_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum MapObjectError {
    #[error(transparent)]
    UnknownType(#[from] UnknownObjectKind),

    #[error("map is not ready for objects")]
    MapNotReady,

    #[error("invalid position: {lat}, {lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("marker operation failed: {0}")]
    Marker(#[from] MapError),
}

/// Tuning for [`MapObjectManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapObjectConfig {
    /// Live object count that switches on throttled invalidation.
    pub performance_threshold: usize,
    /// Minimum spacing of map invalidations in performance mode.
    pub invalidate_interval: Duration,
}

impl Default for MapObjectConfig {
    fn default() -> Self {
        Self {
            performance_threshold: DEFAULT_PERFORMANCE_THRESHOLD,
            invalidate_interval: DEFAULT_INVALIDATE_INTERVAL,
        }
    }
}

/// Optional data attached at creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectOptions {
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub test_object: bool,
}

impl ObjectOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Fields to merge into an existing object. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectUpdate {
    pub position: Option<LatLng>,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ObjectUpdate {
    pub fn move_to(position: LatLng) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub position: LatLng,
    pub marker: MarkerHandle,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub test_object: bool,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Counts returned by [`MapObjectManager::stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStats {
    pub total: usize,
    pub by_kind: BTreeMap<ObjectKind, usize>,
    pub by_category: BTreeMap<&'static str, usize>,
    pub performance_mode: bool,
}

#[derive(Debug)]
struct Registry {
    objects: BTreeMap<ObjectId, MapObject>,
    next_id: u64,
    active: bool,
    selected: ObjectKind,
    throttle: InvalidationThrottle,
}

pub struct MapObjectManager {
    map: Arc<dyn MapSurface>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
}

impl fmt::Debug for MapObjectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapObjectManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl MapObjectManager {
    pub fn new(config: MapObjectConfig, map: Arc<dyn MapSurface>, bus: Arc<EventBus>) -> Self {
        Self::with_clock(config, map, bus, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: MapObjectConfig,
        map: Arc<dyn MapSurface>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            map,
            bus,
            clock,
            registry: Mutex::new(Registry {
                objects: BTreeMap::new(),
                next_id: 1,
                active: false,
                selected: ObjectKind::Base,
                throttle: InvalidationThrottle::new(
                    config.performance_threshold,
                    config.invalidate_interval,
                ),
            }),
        }
    }

    /// Place a new object and its marker.
    pub fn create_object(
        &self,
        kind: ObjectKind,
        position: LatLng,
        options: ObjectOptions,
    ) -> Result<ObjectId, MapObjectError> {
        if !position.is_valid() {
            tracing::error!(%kind, lat = position.lat, lng = position.lng, "Refusing object at invalid position");
            return Err(MapObjectError::InvalidPosition {
                lat: position.lat,
                lng: position.lng,
            });
        }
        if !self.map.is_ready() {
            tracing::error!(%kind, "Map not ready, object not created");
            return Err(MapObjectError::MapNotReady);
        }

        let now = self.clock.now_ms();
        let (id, decision) = {
            let mut registry = self.registry.lock();
            let icon = kind.spec().icon_spec(options.name.clone());
            let marker = self.map.add_marker(position, &icon).map_err(|e| {
                tracing::error!(%kind, error = %e, "Marker creation failed");
                e
            })?;

            let id = ObjectId(registry.next_id);
            registry.next_id += 1;
            registry.objects.insert(
                id,
                MapObject {
                    id,
                    kind,
                    position,
                    marker,
                    name: options.name,
                    attributes: options.attributes,
                    test_object: options.test_object,
                    created_at_ms: now,
                    updated_at_ms: now,
                },
            );
            let live = registry.objects.len();
            (id, registry.throttle.on_mutation(live, now))
        };

        tracing::debug!(object_id = %id, %kind, %position, "Map object created");
        self.bus.emit(Event::MapObjectCreated { id, kind, position });
        self.apply(decision);
        Ok(id)
    }

    /// [`create_object`](Self::create_object) with the kind given by name.
    pub fn create_object_named(
        &self,
        kind: &str,
        position: LatLng,
        options: ObjectOptions,
    ) -> Result<ObjectId, MapObjectError> {
        let kind = kind.parse::<ObjectKind>().map_err(|e| {
            tracing::error!(error = %e, "Unknown object type");
            e
        })?;
        self.create_object(kind, position, options)
    }

    /// Remove an object and its marker. Unknown ids return false.
    pub fn remove_object(&self, id: ObjectId) -> bool {
        let now = self.clock.now_ms();
        let (kind, decision) = {
            let mut registry = self.registry.lock();
            let Some(object) = registry.objects.remove(&id) else {
                tracing::warn!(object_id = %id, "Object not found");
                return false;
            };
            if let Err(e) = self.map.remove_marker(object.marker) {
                tracing::warn!(object_id = %id, error = %e, "Marker already gone");
            }
            let live = registry.objects.len();
            (object.kind, registry.throttle.on_mutation(live, now))
        };

        tracing::debug!(object_id = %id, %kind, "Map object removed");
        self.bus.emit(Event::MapObjectRemoved { id, kind });
        self.apply(decision);
        true
    }

    /// Merge `update` into an object. Unknown ids and invalid positions
    /// return false.
    pub fn update_object(&self, id: ObjectId, update: ObjectUpdate) -> bool {
        if let Some(position) = update.position {
            if !position.is_valid() {
                tracing::warn!(object_id = %id, %position, "Ignoring update to invalid position");
                return false;
            }
        }

        let now = self.clock.now_ms();
        let (position, moved, decision) = {
            let mut registry = self.registry.lock();
            let live = registry.objects.len();
            let Some(object) = registry.objects.get_mut(&id) else {
                tracing::warn!(object_id = %id, "Object not found");
                return false;
            };

            let moved = update.position.is_some_and(|p| p != object.position);
            if let Some(position) = update.position {
                object.position = position;
            }
            object.attributes.extend(update.attributes);

            let renamed = update.name.is_some() && update.name != object.name;
            if renamed {
                // Surfaces have no restyle call, so a new label means a new marker.
                object.name = update.name;
                let icon = object.kind.spec().icon_spec(object.name.clone());
                match self.map.add_marker(object.position, &icon) {
                    Ok(marker) => {
                        if let Err(e) = self.map.remove_marker(object.marker) {
                            tracing::warn!(object_id = %id, error = %e, "Old marker already gone");
                        }
                        object.marker = marker;
                    }
                    Err(e) => {
                        tracing::warn!(object_id = %id, error = %e, "Could not relabel marker");
                        if moved {
                            if let Err(e) = self.map.set_lat_lng(object.marker, object.position) {
                                tracing::warn!(object_id = %id, error = %e, "Marker move failed");
                            }
                        }
                    }
                }
            } else if moved {
                if let Err(e) = self.map.set_lat_lng(object.marker, object.position) {
                    tracing::warn!(object_id = %id, error = %e, "Marker move failed");
                }
            }
            object.updated_at_ms = now;

            let position = object.position;
            (position, moved, registry.throttle.on_mutation(live, now))
        };

        self.bus.emit(Event::MapObjectUpdated {
            id,
            position,
            moved,
        });
        self.apply(decision);
        true
    }

    pub fn object(&self, id: ObjectId) -> Option<MapObject> {
        self.registry.lock().objects.get(&id).cloned()
    }

    /// All objects in creation order.
    pub fn objects(&self) -> Vec<MapObject> {
        self.registry.lock().objects.values().cloned().collect()
    }

    pub fn objects_by_kind(&self, kind: ObjectKind) -> Vec<MapObject> {
        self.registry
            .lock()
            .objects
            .values()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every object of one kind. Returns how many went.
    pub fn clear_objects_by_kind(&self, kind: ObjectKind) -> usize {
        self.clear_where(|o| o.kind == kind)
    }

    /// Remove every object. Returns how many went.
    pub fn clear_all_objects(&self) -> usize {
        self.clear_where(|_| true)
    }

    fn clear_where(&self, predicate: impl Fn(&MapObject) -> bool) -> usize {
        let now = self.clock.now_ms();
        let (removed, decision) = {
            let mut registry = self.registry.lock();
            let ids: Vec<ObjectId> = registry
                .objects
                .values()
                .filter(|o| predicate(o))
                .map(|o| o.id)
                .collect();

            let mut removed = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(object) = registry.objects.remove(&id) {
                    if let Err(e) = self.map.remove_marker(object.marker) {
                        tracing::warn!(object_id = %id, error = %e, "Marker already gone");
                    }
                    removed.push((id, object.kind));
                }
            }
            let live = registry.objects.len();
            let decision = if removed.is_empty() {
                ThrottleDecision::default()
            } else {
                registry.throttle.on_mutation(live, now)
            };
            (removed, decision)
        };

        for (id, kind) in &removed {
            self.bus.emit(Event::MapObjectRemoved {
                id: *id,
                kind: *kind,
            });
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Map objects cleared");
        }
        self.apply(decision);
        removed.len()
    }

    /// Select the kind new objects are placed as.
    pub fn set_active_kind(&self, kind: ObjectKind) {
        self.registry.lock().selected = kind;
        tracing::debug!(%kind, "Active object type set");
    }

    pub fn selected_kind(&self) -> ObjectKind {
        self.registry.lock().selected
    }

    pub fn is_active(&self) -> bool {
        self.registry.lock().active
    }

    /// Flip placement mode on or off. Returns the new state.
    pub fn toggle_active(&self) -> bool {
        let (active, selected) = {
            let mut registry = self.registry.lock();
            registry.active = !registry.active;
            (registry.active, registry.selected)
        };
        tracing::info!(active, %selected, "Map object placement toggled");
        self.bus
            .emit(Event::MapObjectManagerToggled { active, selected });
        active
    }

    pub fn stats(&self) -> ObjectStats {
        let registry = self.registry.lock();
        let mut stats = ObjectStats {
            total: registry.objects.len(),
            performance_mode: registry.throttle.mode() == ThrottleMode::Performance,
            ..ObjectStats::default()
        };
        for object in registry.objects.values() {
            *stats.by_kind.entry(object.kind).or_default() += 1;
            *stats.by_category.entry(object.kind.spec().category).or_default() += 1;
        }
        stats
    }

    pub fn is_performance_mode(&self) -> bool {
        self.registry.lock().throttle.mode() == ThrottleMode::Performance
    }

    /// Scatter `count` objects of random kinds around `center`.
    pub fn create_test_objects<R: Rng + ?Sized>(
        &self,
        center: LatLng,
        count: usize,
        rng: &mut R,
    ) -> Vec<ObjectId> {
        let mut created = Vec::with_capacity(count);
        for i in 0..count {
            let kind = ObjectKind::ALL[rng.random_range(0..ObjectKind::ALL.len())];
            let position = center.offset(
                (rng.random::<f64>() - 0.5) * TEST_OBJECT_SPREAD_DEG,
                (rng.random::<f64>() - 0.5) * TEST_OBJECT_SPREAD_DEG,
            );
            let options = ObjectOptions {
                name: Some(format!("Test {} {}", kind, i + 1)),
                test_object: true,
                ..ObjectOptions::default()
            };
            match self.create_object(kind, position, options) {
                Ok(id) => created.push(id),
                Err(e) => tracing::warn!(error = %e, "Test object not created"),
            }
        }
        tracing::info!(requested = count, created = created.len(), "Test objects created");
        created
    }

    /// Run a pending throttled invalidation if its interval has passed.
    pub fn poll_invalidation(&self) -> bool {
        let now = self.clock.now_ms();
        let due = self.registry.lock().throttle.poll(now);
        if due {
            self.map.invalidate();
        }
        due
    }

    /// Run any pending invalidation now.
    pub fn flush(&self) -> bool {
        let now = self.clock.now_ms();
        let pending = self.registry.lock().throttle.flush(now);
        if pending {
            self.map.invalidate();
        }
        pending
    }

    fn apply(&self, decision: ThrottleDecision) {
        if decision.invalidate {
            self.map.invalidate();
        }
        if let Some(enabled) = decision.transition {
            let object_count = self.len();
            self.bus.emit(Event::MapPerformanceMode {
                enabled,
                object_count,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::topics;
    use crate::map::HeadlessMap;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        map: Arc<HeadlessMap>,
        bus: Arc<EventBus>,
        clock: Arc<ManualClock>,
        manager: MapObjectManager,
    }

    fn fixture(config: MapObjectConfig) -> Fixture {
        let map = Arc::new(HeadlessMap::new());
        let bus = Arc::new(EventBus::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let manager =
            MapObjectManager::with_clock(config, map.clone(), bus.clone(), clock.clone());
        Fixture {
            map,
            bus,
            clock,
            manager,
        }
    }

    fn here() -> LatLng {
        LatLng::new(61.5, 23.76)
    }

    #[test]
    fn test_create_assigns_sequential_ids_and_markers() {
        let f = fixture(MapObjectConfig::default());
        let a = f
            .manager
            .create_object(ObjectKind::Quest, here(), ObjectOptions::default())
            .unwrap();
        let b = f
            .manager
            .create_object(ObjectKind::Npc, here(), ObjectOptions::named("Elder"))
            .unwrap();

        assert_eq!(a.to_string(), "obj_1");
        assert_eq!(b.to_string(), "obj_2");
        assert_eq!(f.map.marker_count(), 2);

        let marker = f.map.marker(f.manager.object(b).unwrap().marker).unwrap();
        assert_eq!(marker.icon.label.as_deref(), Some("Elder"));
        assert_eq!(marker.icon.z_offset, 1600);
        assert_eq!(f.bus.history_for(topics::MAP_OBJECT_CREATED).len(), 2);
    }

    #[test]
    fn test_unknown_type_name_is_rejected() {
        let f = fixture(MapObjectConfig::default());
        let result = f
            .manager
            .create_object_named("DRAGON", here(), ObjectOptions::default());
        assert!(matches!(result, Err(MapObjectError::UnknownType(_))));
        assert!(f.manager.is_empty());

        let id = f
            .manager
            .create_object_named("poi", here(), ObjectOptions::default())
            .unwrap();
        assert_eq!(f.manager.object(id).map(|o| o.kind), Some(ObjectKind::Poi));
    }

    #[test]
    fn test_unready_map_creates_nothing() {
        let f = fixture(MapObjectConfig::default());
        f.map.set_ready(false);
        let result = f
            .manager
            .create_object(ObjectKind::Base, here(), ObjectOptions::default());
        assert!(matches!(result, Err(MapObjectError::MapNotReady)));
        assert_eq!(f.map.marker_count(), 0);
        assert!(f.bus.history_for(topics::MAP_OBJECT_CREATED).is_empty());
    }

    #[test]
    fn test_invalid_position_is_rejected() {
        let f = fixture(MapObjectConfig::default());
        let result = f.manager.create_object(
            ObjectKind::Base,
            LatLng::new(95.0, 0.0),
            ObjectOptions::default(),
        );
        assert!(matches!(result, Err(MapObjectError::InvalidPosition { .. })));
    }

    #[test]
    fn test_remove_unknown_returns_false() {
        let f = fixture(MapObjectConfig::default());
        assert!(!f.manager.remove_object(ObjectId(42)));
        assert!(!f.manager.update_object(ObjectId(42), ObjectUpdate::default()));
    }

    #[test]
    fn test_remove_drops_marker_and_emits() {
        let f = fixture(MapObjectConfig::default());
        let id = f
            .manager
            .create_object(ObjectKind::Monster, here(), ObjectOptions::default())
            .unwrap();
        assert!(f.manager.remove_object(id));
        assert_eq!(f.map.marker_count(), 0);

        let removed = f.bus.history_for(topics::MAP_OBJECT_REMOVED);
        assert_eq!(
            removed[0].event,
            Event::MapObjectRemoved {
                id,
                kind: ObjectKind::Monster
            }
        );
    }

    #[test]
    fn test_update_moves_marker() {
        let f = fixture(MapObjectConfig::default());
        let id = f
            .manager
            .create_object(ObjectKind::Poi, here(), ObjectOptions::default())
            .unwrap();
        let target = LatLng::new(61.51, 23.77);
        assert!(f.manager.update_object(id, ObjectUpdate::move_to(target)));

        let object = f.manager.object(id).unwrap();
        assert_eq!(object.position, target);
        assert_eq!(f.map.marker(object.marker).unwrap().position, target);

        let updated = f.bus.history_for(topics::MAP_OBJECT_UPDATED);
        assert_eq!(
            updated[0].event,
            Event::MapObjectUpdated {
                id,
                position: target,
                moved: true
            }
        );
    }

    #[test]
    fn test_rename_replaces_marker() {
        let f = fixture(MapObjectConfig::default());
        let id = f
            .manager
            .create_object(ObjectKind::Npc, here(), ObjectOptions::named("Elder"))
            .unwrap();
        let before = f.manager.object(id).unwrap().marker;

        let update = ObjectUpdate {
            name: Some("Witch".to_string()),
            ..ObjectUpdate::default()
        };
        assert!(f.manager.update_object(id, update));

        let after = f.manager.object(id).unwrap().marker;
        assert_ne!(before, after);
        assert_eq!(f.map.marker_count(), 1);
        assert_eq!(f.map.marker(after).unwrap().icon.label.as_deref(), Some("Witch"));
    }

    #[test]
    fn test_failed_relabel_still_moves_marker() {
        let f = fixture(MapObjectConfig::default());
        let id = f
            .manager
            .create_object(ObjectKind::Npc, here(), ObjectOptions::named("Elder"))
            .unwrap();
        let marker = f.manager.object(id).unwrap().marker;
        f.map.set_ready(false);

        let target = here().offset(0.001, 0.001);
        let update = ObjectUpdate {
            position: Some(target),
            name: Some("Witch".to_string()),
            ..ObjectUpdate::default()
        };
        assert!(f.manager.update_object(id, update));

        let object = f.manager.object(id).unwrap();
        assert_eq!(object.marker, marker);
        assert_eq!(object.position, target);
        assert_eq!(f.map.marker(marker).unwrap().position, target);
        assert_eq!(f.map.marker_count(), 1);
    }

    #[test]
    fn test_stats_and_clear_by_kind() {
        let f = fixture(MapObjectConfig::default());
        for kind in [ObjectKind::Quest, ObjectKind::Quest, ObjectKind::Hevy] {
            f.manager
                .create_object(kind, here(), ObjectOptions::default())
                .unwrap();
        }

        let stats = f.manager.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind.get(&ObjectKind::Quest), Some(&2));
        assert_eq!(stats.by_category.get("legendary"), Some(&1));

        assert_eq!(f.manager.clear_objects_by_kind(ObjectKind::Quest), 2);
        assert_eq!(f.manager.objects_by_kind(ObjectKind::Quest).len(), 0);
        assert_eq!(f.map.marker_count(), 1);
        assert_eq!(f.manager.clear_all_objects(), 1);
        assert_eq!(f.map.marker_count(), 0);
    }

    #[test]
    fn test_toggle_active_emits() {
        let f = fixture(MapObjectConfig::default());
        assert_eq!(f.manager.selected_kind(), ObjectKind::Base);
        f.manager.set_active_kind(ObjectKind::Hevy);
        assert!(f.manager.toggle_active());
        assert!(!f.manager.toggle_active());

        let toggled = f.bus.history_for(topics::MAP_OBJECT_MANAGER_TOGGLED);
        assert_eq!(
            toggled[0].event,
            Event::MapObjectManagerToggled {
                active: true,
                selected: ObjectKind::Hevy
            }
        );
    }

    #[test]
    fn test_test_objects_stay_near_center() {
        let f = fixture(MapObjectConfig::default());
        let mut rng = StdRng::seed_from_u64(7);
        let ids = f.manager.create_test_objects(here(), 5, &mut rng);
        assert_eq!(ids.len(), 5);

        for object in f.manager.objects() {
            assert!(object.test_object);
            assert!((object.position.lat - here().lat).abs() <= TEST_OBJECT_SPREAD_DEG / 2.0);
            assert!((object.position.lng - here().lng).abs() <= TEST_OBJECT_SPREAD_DEG / 2.0);
            assert!(object.name.as_deref().unwrap_or("").starts_with("Test "));
        }
    }

    #[test]
    fn test_performance_mode_throttles_invalidation() {
        let f = fixture(MapObjectConfig {
            performance_threshold: 3,
            invalidate_interval: Duration::from_millis(250),
        });
        for _ in 0..2 {
            f.manager
                .create_object(ObjectKind::Test, here(), ObjectOptions::default())
                .unwrap();
        }
        assert_eq!(f.map.invalidation_count(), 2);

        // Third object enters performance mode and invalidates once.
        f.manager
            .create_object(ObjectKind::Test, here(), ObjectOptions::default())
            .unwrap();
        assert!(f.manager.is_performance_mode());
        assert_eq!(f.map.invalidation_count(), 3);

        f.manager
            .create_object(ObjectKind::Test, here(), ObjectOptions::default())
            .unwrap();
        assert_eq!(f.map.invalidation_count(), 3);
        assert!(!f.manager.poll_invalidation());

        f.clock.advance(Duration::from_millis(250));
        assert!(f.manager.poll_invalidation());
        assert_eq!(f.map.invalidation_count(), 4);

        let modes = f.bus.history_for(topics::MAP_PERFORMANCE_MODE);
        assert_eq!(
            modes[0].event,
            Event::MapPerformanceMode {
                enabled: true,
                object_count: 3
            }
        );
    }

    #[test]
    fn test_listener_may_reenter_manager() {
        let f = fixture(MapObjectConfig::default());
        let manager = Arc::new(f.manager);
        let inner = Arc::downgrade(&manager);
        let _sub = f.bus.on(topics::MAP_OBJECT_CREATED, move |event| {
            if let (Some(manager), Event::MapObjectCreated { id, .. }) = (inner.upgrade(), event) {
                assert!(manager.object(*id).is_some());
            }
        });
        manager
            .create_object(ObjectKind::Base, here(), ObjectOptions::default())
            .unwrap();
        assert_eq!(f.bus.stats().listener_panics, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(usize),
        Remove(usize),
        Move(usize),
        ClearKind(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..7).prop_map(Op::Create),
            (0usize..64).prop_map(Op::Remove),
            (0usize..64).prop_map(Op::Move),
            (0usize..7).prop_map(Op::ClearKind),
        ]
    }

    proptest! {
        #[test]
        fn test_markers_match_registry_under_churn(ops in proptest::collection::vec(op(), 1..80)) {
            let f = fixture(MapObjectConfig {
                performance_threshold: 10,
                invalidate_interval: Duration::from_millis(250),
            });
            for op in ops {
                match op {
                    Op::Create(k) => {
                        f.manager
                            .create_object(ObjectKind::ALL[k], here(), ObjectOptions::default())
                            .unwrap();
                    }
                    Op::Remove(i) => {
                        let ids: Vec<ObjectId> = f.manager.objects().iter().map(|o| o.id).collect();
                        if !ids.is_empty() {
                            prop_assert!(f.manager.remove_object(ids[i % ids.len()]));
                        }
                    }
                    Op::Move(i) => {
                        let ids: Vec<ObjectId> = f.manager.objects().iter().map(|o| o.id).collect();
                        if !ids.is_empty() {
                            let to = here().offset(0.001 * i as f64, 0.0);
                            prop_assert!(f.manager.update_object(ids[i % ids.len()], ObjectUpdate::move_to(to)));
                        }
                    }
                    Op::ClearKind(k) => {
                        f.manager.clear_objects_by_kind(ObjectKind::ALL[k]);
                    }
                }
                f.clock.advance(Duration::from_millis(10));

                let objects = f.manager.objects();
                prop_assert_eq!(objects.len(), f.map.marker_count());
                let mut handles: Vec<MarkerHandle> = objects.iter().map(|o| o.marker).collect();
                handles.sort();
                handles.dedup();
                prop_assert_eq!(handles.len(), objects.len());
                for object in &objects {
                    prop_assert_eq!(f.map.marker(object.marker).map(|m| m.position), Some(object.position));
                }
            }
        }
    }
}
