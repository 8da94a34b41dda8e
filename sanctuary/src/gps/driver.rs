//! Async driver around the acquisition state machine.
//!
//! [`GpsCore`] feeds inputs into [`GpsStateMachine`] and performs the effects
//! it returns: device requests, the retry timer, the device watch,
//! persistence, map centering and bus emission.
//!
//! # Concurrency
//!
//! The machine sits behind a mutex that is released before any effect runs,
//! so listeners reached through `emit` may call back into the core. Device
//! requests, retry timers, watch updates and permission changes run as spawned
//! tasks that hold only a weak reference to the core. Every task is tied to one
//! shutdown [`CancellationToken`], and the single pending retry timer has a
//! child token of its own.

use super::machine::{GpsEffect, GpsInput, GpsStateMachine};
use super::permission::PermissionSource;
use super::provider::{GeolocationProvider, WatchId};
use super::storage::{load_recent, MemoryStore, PositionStore, StoredPosition};
use super::{GpsConfig, GpsState, PermissionState, Position, PositionOptions};
use crate::clock::{Clock, SystemClock};
use crate::events::{topics, Event, EventBus, SubscriptionSet};
use crate::map::{MapSurface, ViewOptions};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Builder for [`GpsCore`].
pub struct GpsCoreBuilder {
    config: GpsConfig,
    bus: Arc<EventBus>,
    provider: Arc<dyn GeolocationProvider>,
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
    map: Option<Arc<dyn MapSurface>>,
    permissions: Option<Arc<dyn PermissionSource>>,
}

impl GpsCoreBuilder {
    pub fn new(
        config: GpsConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn GeolocationProvider>,
    ) -> Self {
        Self {
            config,
            bus,
            provider,
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            map: None,
            permissions: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PositionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Map centered by downstream initialization on the first fix.
    pub fn with_map(mut self, map: Arc<dyn MapSurface>) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_permission_source(mut self, source: Arc<dyn PermissionSource>) -> Self {
        self.permissions = Some(source);
        self
    }

    /// Load the persisted position, subscribe to bus requests, start the
    /// permission monitor and emit `gps:ready`.
    pub fn start(self, runtime: &Handle) -> GpsCore {
        let restored = load_recent(
            self.store.as_ref(),
            self.clock.now_ms(),
            self.config.staleness_ceiling,
        );
        if let Some(position) = &restored {
            tracing::info!(lat = position.lat, lng = position.lng, "Restored last known position");
        }

        let map_zoom = self.config.map_zoom;
        let inner = Arc::new(GpsCoreInner {
            machine: Mutex::new(GpsStateMachine::new(self.config)),
            bus: Arc::clone(&self.bus),
            provider: self.provider,
            store: self.store,
            clock: self.clock,
            map: self.map,
            runtime: runtime.clone(),
            shutdown: CancellationToken::new(),
            retry_timer: Mutex::new(None),
            watch: Mutex::new(None),
            subscriptions: Mutex::new(None),
            retries_scheduled: AtomicU64::new(0),
            map_zoom,
        });

        let mut subscriptions = SubscriptionSet::new(self.bus);
        let weak = Arc::downgrade(&inner);
        subscriptions.on(topics::GPS_REQUEST, move |_| {
            GpsCoreInner::dispatch_weak(&weak, GpsInput::RequestLocation);
        });
        let weak = Arc::downgrade(&inner);
        subscriptions.on(topics::GPS_TRACKING_REQUEST, move |_| {
            GpsCoreInner::dispatch_weak(&weak, GpsInput::StartTracking);
        });
        *inner.subscriptions.lock() = Some(subscriptions);

        inner.dispatch(GpsInput::Initialize { restored });

        if let Some(source) = self.permissions {
            inner.spawn_permission_monitor(source.as_ref());
        }

        tracing::info!("GPS core started");
        GpsCore { inner }
    }
}

/// Handle to the running GPS core. Cheap to clone.
#[derive(Clone)]
pub struct GpsCore {
    inner: Arc<GpsCoreInner>,
}

impl fmt::Debug for GpsCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpsCore")
            .field("state", &self.state())
            .field("retries_scheduled", &self.retries_scheduled())
            .finish_non_exhaustive()
    }
}

impl GpsCore {
    pub fn builder(
        config: GpsConfig,
        bus: Arc<EventBus>,
        provider: Arc<dyn GeolocationProvider>,
    ) -> GpsCoreBuilder {
        GpsCoreBuilder::new(config, bus, provider)
    }

    /// Request one fix. While tracking, stops tracking instead.
    pub fn request_location(&self) {
        self.inner.dispatch(GpsInput::RequestLocation);
    }

    pub fn start_tracking(&self) {
        self.inner.dispatch(GpsInput::StartTracking);
    }

    pub fn stop_tracking(&self) {
        self.inner.dispatch(GpsInput::StopTracking);
    }

    /// Snapshot of the acquisition state.
    pub fn state(&self) -> GpsState {
        self.inner.machine.lock().state().clone()
    }

    pub fn position(&self) -> Option<Position> {
        self.inner.machine.lock().state().position
    }

    pub fn last_valid_position(&self) -> Option<Position> {
        self.inner.machine.lock().state().last_valid_position
    }

    pub fn permission(&self) -> PermissionState {
        self.inner.machine.lock().state().permission
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.machine.lock().state().tracking
    }

    /// Total retry timers scheduled since start.
    pub fn retries_scheduled(&self) -> u64 {
        self.inner.retries_scheduled.load(Ordering::SeqCst)
    }

    /// Cancel timers, clear the watch, stop the permission monitor and detach
    /// from the bus. Idempotent.
    pub fn destroy(&self) {
        self.inner.dispatch(GpsInput::Destroy);
        self.inner.shutdown.cancel();
        self.inner.subscriptions.lock().take();
        tracing::info!("GPS core destroyed");
    }
}

struct GpsCoreInner {
    machine: Mutex<GpsStateMachine>,
    bus: Arc<EventBus>,
    provider: Arc<dyn GeolocationProvider>,
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
    map: Option<Arc<dyn MapSurface>>,
    runtime: Handle,
    shutdown: CancellationToken,
    retry_timer: Mutex<Option<CancellationToken>>,
    watch: Mutex<Option<WatchId>>,
    subscriptions: Mutex<Option<SubscriptionSet>>,
    retries_scheduled: AtomicU64,
    map_zoom: u8,
}

impl Drop for GpsCoreInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(id) = self.watch.lock().take() {
            self.provider.clear_watch(id);
        }
    }
}

impl GpsCoreInner {
    fn dispatch(self: &Arc<Self>, input: GpsInput) {
        let now = self.clock.now_ms();
        let effects = self.machine.lock().handle(input, now);
        for effect in effects {
            self.apply(effect);
        }
    }

    fn dispatch_weak(weak: &Weak<Self>, input: GpsInput) {
        if let Some(inner) = weak.upgrade() {
            inner.dispatch(input);
        }
    }

    fn apply(self: &Arc<Self>, effect: GpsEffect) {
        match effect {
            GpsEffect::RequestPosition(options) => self.spawn_request(options),
            GpsEffect::ScheduleRetry { attempt, delay } => self.schedule_retry(attempt, delay),
            GpsEffect::CancelRetry => self.cancel_retry(),
            GpsEffect::StartWatch(options) => self.start_watch(options),
            GpsEffect::ClearWatch => self.clear_watch(),
            GpsEffect::Persist(position) => self.persist(&position),
            GpsEffect::InitializeDownstream(position) => self.initialize_downstream(position),
            GpsEffect::Emit(event) => self.bus.emit(event),
            GpsEffect::Status(status) => self.bus.emit(Event::GpsStatus(status)),
        }
    }

    fn spawn_request(self: &Arc<Self>, options: PositionOptions) {
        let weak = Arc::downgrade(self);
        let provider = Arc::clone(&self.provider);
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            let result = tokio::select! {
                _ = shutdown.cancelled() => return,
                result = provider.current_position(options) => result,
            };
            let input = match result {
                Ok(reading) => GpsInput::PositionAcquired(reading),
                Err(error) => GpsInput::PositionFailed(error),
            };
            Self::dispatch_weak(&weak, input);
        });
    }

    fn schedule_retry(self: &Arc<Self>, attempt: u32, delay: Duration) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.retry_timer.lock().replace(token.clone()) {
            previous.cancel();
        }
        self.retries_scheduled.fetch_add(1, Ordering::SeqCst);

        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(attempt, "Retry timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    Self::dispatch_weak(&weak, GpsInput::RetryElapsed { attempt });
                }
            }
        });
    }

    fn cancel_retry(&self) {
        if let Some(token) = self.retry_timer.lock().take() {
            token.cancel();
        }
    }

    fn start_watch(self: &Arc<Self>, options: PositionOptions) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.provider.watch_position(options, tx);
        if let Some(previous) = self.watch.lock().replace(id) {
            self.provider.clear_watch(previous);
        }

        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                let update = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    update = rx.recv() => update,
                };
                let input = match update {
                    Some(Ok(reading)) => GpsInput::WatchUpdate(reading),
                    Some(Err(error)) => GpsInput::WatchFailed(error),
                    None => break,
                };
                Self::dispatch_weak(&weak, input);
            }
            tracing::debug!(watch_id = id.0, "GPS watch task finished");
        });
        tracing::info!(watch_id = id.0, "GPS watch started");
    }

    fn clear_watch(&self) {
        if let Some(id) = self.watch.lock().take() {
            self.provider.clear_watch(id);
            tracing::info!(watch_id = id.0, "GPS watch cleared");
        }
    }

    fn persist(&self, position: &Position) {
        let record = StoredPosition::from_position(position, self.clock.now_ms());
        if let Err(e) = self.store.save(&record) {
            tracing::warn!(error = %e, "Failed to persist last known position");
        }
    }

    fn initialize_downstream(&self, position: Position) {
        if let Some(map) = &self.map {
            map.set_view(position.lat_lng(), self.map_zoom, ViewOptions::animated());
        }
        tracing::info!(
            lat = position.lat,
            lng = position.lng,
            fallback = position.is_fallback,
            zoom = self.map_zoom,
            "Map initialized on first position"
        );
        self.bus.emit(Event::GpsMapInitialized(position));
    }

    fn spawn_permission_monitor(self: &Arc<Self>, source: &dyn PermissionSource) {
        let mut rx = source.subscribe();
        let initial = *rx.borrow_and_update();
        self.dispatch(GpsInput::PermissionChanged(initial));

        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let state = *rx.borrow_and_update();
                Self::dispatch_weak(&weak, GpsInput::PermissionChanged(state));
            }
            tracing::debug!("Permission monitor stopped");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gps::{
        AcquisitionPhase, GpsError, RawReading, SimulatedPermissions, SimulatedProvider,
    };
    use crate::map::HeadlessMap;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn core_with(
        provider: Arc<SimulatedProvider>,
        bus: Arc<EventBus>,
    ) -> (GpsCore, Arc<HeadlessMap>, Arc<MemoryStore>) {
        let map = Arc::new(HeadlessMap::new());
        let store = Arc::new(MemoryStore::new());
        let core = GpsCore::builder(GpsConfig::default(), bus, provider)
            .with_store(store.clone())
            .with_map(map.clone())
            .start(&Handle::current());
        (core, map, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_centers_map_and_persists() {
        let bus = Arc::new(EventBus::new());
        let provider = Arc::new(SimulatedProvider::scripted([Ok(RawReading::new(
            61.50,
            23.76,
            Some(8.0),
        ))]));
        let (core, map, store) = core_with(provider, bus.clone());

        core.request_location();
        settle().await;

        let state = core.state();
        assert_eq!(state.phase, AcquisitionPhase::Located);
        assert_eq!(state.retry_count, 0);
        let (center, zoom) = map.view();
        assert_eq!((center.lat, center.lng), (61.50, 23.76));
        assert_eq!(zoom, 18);
        assert_eq!(store.record().map(|r| (r.lat, r.lng)), Some((61.50, 23.76)));
        assert_eq!(bus.history_for(topics::GPS_MAP_INITIALIZED).len(), 1);
        assert_eq!(bus.history_for(topics::GPS_READY).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_twice_then_success_waits_for_backoff() {
        let bus = Arc::new(EventBus::new());
        let provider = Arc::new(SimulatedProvider::scripted([
            Err(GpsError::timeout()),
            Err(GpsError::timeout()),
            Ok(RawReading::new(61.50, 23.76, Some(8.0))),
        ]));
        let (core, _map, _store) = core_with(provider.clone(), bus);

        core.request_location();
        settle().await;
        assert_eq!(core.state().phase, AcquisitionPhase::Retrying { attempt: 1 });

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        settle().await;
        assert_eq!(provider.request_count(), 1, "first retry waits 2 s");

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(core.state().phase, AcquisitionPhase::Retrying { attempt: 2 });

        tokio::time::sleep(Duration::from_millis(4_001)).await;
        settle().await;

        assert_eq!(core.retries_scheduled(), 2);
        assert_eq!(provider.request_count(), 3);
        assert_eq!(core.state().phase, AcquisitionPhase::Located);
        assert_eq!(core.state().retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_pending_retry() {
        let bus = Arc::new(EventBus::new());
        let provider = Arc::new(SimulatedProvider::scripted([Err(GpsError::timeout())]));
        let (core, _map, _store) = core_with(provider.clone(), bus.clone());

        core.request_location();
        settle().await;
        core.destroy();

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(provider.request_count(), 1);
        assert_eq!(bus.listener_count(topics::GPS_REQUEST), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bus_request_triggers_acquisition() {
        let bus = Arc::new(EventBus::new());
        let provider = Arc::new(SimulatedProvider::new());
        let (core, _map, _store) = core_with(provider.clone(), bus.clone());

        bus.emit(Event::GpsRequest);
        settle().await;

        assert_eq!(provider.request_count(), 1);
        let position = core.position().expect("fallback after unavailable");
        assert!(position.is_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_push_denied_falls_back() {
        let bus = Arc::new(EventBus::new());
        let permissions = Arc::new(SimulatedPermissions::new(PermissionState::Granted));
        let core = GpsCore::builder(
            GpsConfig::default(),
            bus.clone(),
            Arc::new(SimulatedProvider::new()),
        )
        .with_permission_source(permissions.clone())
        .start(&Handle::current());
        assert_eq!(core.permission(), PermissionState::Granted);

        permissions.set(PermissionState::Denied);
        settle().await;

        assert_eq!(core.permission(), PermissionState::Denied);
        assert!(core.position().map(|p| p.is_fallback).unwrap_or(false));
        assert_eq!(bus.history_for(topics::GPS_PERMISSION_DENIED).len(), 1);
        assert_eq!(bus.history_for(topics::GPS_FALLBACK).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_updates_flow_through() {
        let bus = Arc::new(EventBus::new());
        let provider = Arc::new(SimulatedProvider::new());
        let (core, _map, _store) = core_with(provider.clone(), bus.clone());

        core.start_tracking();
        assert_eq!(provider.active_watches(), 1);
        provider.push_watch(Ok(RawReading::new(60.0, 24.0, Some(4.0))));
        settle().await;

        assert_eq!(core.position().map(|p| p.lat), Some(60.0));
        core.stop_tracking();
        assert_eq!(provider.active_watches(), 0);
        assert!(!core.is_tracking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_persisted_position_is_not_restored() {
        let clock = Arc::new(ManualClock::new(10 * 3_600_000));
        let store = Arc::new(MemoryStore::with_record(StoredPosition {
            lat: 61.5,
            lng: 23.76,
            accuracy: Some(8.0),
            timestamp: 8 * 3_600_000,
        }));
        let core = GpsCore::builder(
            GpsConfig::default(),
            Arc::new(EventBus::new()),
            Arc::new(SimulatedProvider::new()),
        )
        .with_store(store)
        .with_clock(clock)
        .start(&Handle::current());

        assert_eq!(core.last_valid_position(), None);
    }
}
