//! Application bootstrap implementation.
//!
//! Services come up leaf-first: bus and store, then the map and its object
//! manager, then the layer stack, then the store sync listeners, and the GPS
//! core last so that every consumer is subscribed before `gps:ready`.

use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::AppConfig;
use super::error::AppError;
use crate::canvas::{Canvas, PixmapCanvas};
use crate::clock::{Clock, SystemClock};
use crate::events::{topics, Event, EventBus, SubscriptionSet};
use crate::geo::ScreenPoint;
use crate::gps::{
    GeolocationProvider, GpsCore, GpsStatus, MemoryStore, PermissionSource, PositionStore,
};
use crate::layers::{
    run_render_loop, BackgroundLayer, DebugLayer, GeolocationLayer, InputHandle,
    InteractionLayer, LayerManager, MapLayer, PathLayer, PathTrail, PlayerLayer,
    RenderSummary, TerrainLayer, TerritoryLayer, UiLayer, GPS_BUTTON,
};
use crate::map::{HeadlessMap, MapObjectManager, MapSurface, ObjectOptions, ViewOptions};
use crate::state::{GameState, GameStore, Viewport, INITIAL_MAP_ZOOM};

/// External collaborators injected at startup.
pub struct AppDeps {
    pub provider: Arc<dyn GeolocationProvider>,
    pub position_store: Arc<dyn PositionStore>,
    pub permissions: Option<Arc<dyn PermissionSource>>,
    pub clock: Arc<dyn Clock>,
    /// Drawing surface. A [`PixmapCanvas`] of the configured size when unset.
    pub canvas: Option<Box<dyn Canvas>>,
}

impl AppDeps {
    /// Defaults around `provider`: in-memory position store, system clock,
    /// no permission monitor.
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            provider,
            position_store: Arc::new(MemoryStore::new()),
            permissions: None,
            clock: Arc::new(SystemClock),
            canvas: None,
        }
    }

    pub fn with_position_store(mut self, store: Arc<dyn PositionStore>) -> Self {
        self.position_store = store;
        self
    }

    pub fn with_permissions(mut self, source: Arc<dyn PermissionSource>) -> Self {
        self.permissions = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_canvas(mut self, canvas: Box<dyn Canvas>) -> Self {
        self.canvas = Some(canvas);
        self
    }
}

/// The running application.
///
/// # Example
///
/// ```ignore
/// let app = SanctuaryApp::start(config, AppDeps::new(provider))?;
/// app.spawn_render_loop(display_refresh_ticks());
///
/// // Later: graceful shutdown
/// app.shutdown().await;
/// ```
pub struct SanctuaryApp {
    config: AppConfig,
    bus: Arc<EventBus>,
    store: Arc<GameStore>,
    map: Arc<HeadlessMap>,
    objects: Arc<MapObjectManager>,
    layers: Arc<Mutex<LayerManager>>,
    input: InputHandle,
    trail: Arc<Mutex<PathTrail>>,
    gps: GpsCore,
    runtime: Handle,
    shutdown: CancellationToken,
    render_task: Mutex<Option<JoinHandle<u64>>>,
    /// Store sync listeners.
    _sync: SubscriptionSet,
}

impl std::fmt::Debug for SanctuaryApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanctuaryApp")
            .field("config", &self.config)
            .field("gps", &self.gps)
            .field("objects", &self.objects.len())
            .finish_non_exhaustive()
    }
}

impl SanctuaryApp {
    /// Build and wire every service.
    ///
    /// Must be called from within a Tokio runtime; the GPS driver spawns its
    /// device requests and timers on it.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no runtime, the canvas cannot be created
    /// or a layer fails to initialize.
    pub fn start(config: AppConfig, deps: AppDeps) -> Result<Self, AppError> {
        let runtime = Handle::try_current().map_err(|e| AppError::Runtime(e.to_string()))?;
        info!(
            width = config.render.width,
            height = config.render.height,
            "Starting Eldritch Sanctuary core"
        );

        // 1. Bus and shared state
        let bus = Arc::new(EventBus::with_clock(deps.clock.clone()));
        let mut initial = GameState::default();
        initial.map.center = config.gps.fallback.position;
        initial.map.viewport = Viewport {
            width: config.render.width,
            height: config.render.height,
        };
        initial.ui.status_text = GpsStatus::Ready.text();
        initial.ui.debug_mode = config.render.debug_layer;
        let store = Arc::new(GameStore::with_clock(initial, deps.clock.clone()));

        // 2. Map and the single writer of its markers
        let map = Arc::new(HeadlessMap::new());
        map.set_view(
            config.gps.fallback.position,
            INITIAL_MAP_ZOOM,
            ViewOptions::instant(),
        );
        let objects = Arc::new(MapObjectManager::with_clock(
            config.objects.clone(),
            map.clone(),
            bus.clone(),
            deps.clock.clone(),
        ));

        // 3. Layer stack
        let canvas: Box<dyn Canvas> = match deps.canvas {
            Some(canvas) => canvas,
            None => Box::new(PixmapCanvas::new(config.render.width, config.render.height)?),
        };
        let mut layers =
            LayerManager::with_clock(bus.clone(), store.clone(), canvas, deps.clock.clone());

        let interaction = InteractionLayer::new(bus.clone(), config.interaction.clone());
        let input = interaction.handle();
        let path = PathLayer::new(config.path.clone());
        let trail = path.trail();
        let background = match config.render.background_seed {
            Some(seed) => BackgroundLayer::with_seed(seed),
            None => BackgroundLayer::new(),
        };

        layers.add_layer(Box::new(background))?;
        layers.add_layer(Box::new(TerrainLayer::new()))?;
        layers.add_layer(Box::new(TerritoryLayer::new()))?;
        layers.add_layer(Box::new(path))?;
        layers.add_layer(Box::new(MapLayer::new(map.clone()).with_objects(objects.clone())))?;
        layers.add_layer(Box::new(interaction))?;
        layers.add_layer(Box::new(PlayerLayer::new()))?;
        layers.add_layer(Box::new(UiLayer::new()))?;
        layers.add_layer(Box::new(GeolocationLayer::new()))?;
        layers.add_layer(Box::new(DebugLayer::new()))?;
        if config.render.debug_layer {
            layers.show_layer("debug");
        }
        info!(order = ?layers.render_order(), "Layer stack ready");

        // 4. Store sync
        let sync = Self::wire_store_sync(&bus, &store, &objects, &input, config.gps.map_zoom);

        // 5. GPS core last, so every consumer hears gps:ready
        let mut builder = GpsCore::builder(config.gps.clone(), bus.clone(), deps.provider)
            .with_store(deps.position_store)
            .with_clock(deps.clock.clone())
            .with_map(map.clone());
        if let Some(permissions) = deps.permissions {
            builder = builder.with_permission_source(permissions);
        }
        let gps = builder.start(&runtime);

        store.update("app", |s| s.system.initialized = true);
        info!("Eldritch Sanctuary core started");

        Ok(Self {
            config,
            bus,
            store,
            map,
            objects,
            layers: Arc::new(Mutex::new(layers)),
            input,
            trail,
            gps,
            runtime,
            shutdown: CancellationToken::new(),
            render_task: Mutex::new(None),
            _sync: sync,
        })
    }

    /// Listeners that mirror bus traffic into the store and the input layer.
    fn wire_store_sync(
        bus: &Arc<EventBus>,
        store: &Arc<GameStore>,
        objects: &Arc<MapObjectManager>,
        input: &InputHandle,
        map_zoom: u8,
    ) -> SubscriptionSet {
        let mut sync = SubscriptionSet::new(bus.clone());

        let target = store.clone();
        sync.on(topics::GPS_POSITION_UPDATED, move |event| {
            if let Event::GpsPositionUpdated(position) = event {
                let position = *position;
                target.update("gps", |s| s.player.position = Some(position));
            }
        });

        let target = store.clone();
        sync.on(topics::GPS_MAP_INITIALIZED, move |event| {
            if let Event::GpsMapInitialized(position) = event {
                let center = position.lat_lng();
                target.update("gps", |s| {
                    s.map.center = center;
                    s.map.zoom = map_zoom;
                });
                debug!(lat = center.lat, lng = center.lng, zoom = map_zoom, "Map view initialized");
            }
        });

        let buttons = input.clone();
        sync.on(topics::GPS_STATUS, move |event| {
            if let Event::GpsStatus(status) = event {
                buttons.set_element_label(GPS_BUTTON, status.label());
            }
        });

        // Placement mode: a tap on open map drops an object of the selected kind.
        let target = store.clone();
        let placer = objects.clone();
        let hit = input.clone();
        sync.on(topics::INTERACTION_TAP, move |event| {
            let Event::InteractionTap(point) = event else {
                return;
            };
            if !placer.is_active() || hit.element_at(*point).is_some() {
                return;
            }
            let at = target.read(|s| s.map.projection()).to_lat_lng(*point);
            let kind = placer.selected_kind();
            if let Err(e) = placer.create_object(kind, at, ObjectOptions::default()) {
                warn!(kind = %kind, error = %e, "Tap placement failed");
            }
        });

        // Dragging pans the map.
        let target = store.clone();
        sync.on(topics::INTERACTION_DRAG_MOVE, move |event| {
            if let Event::InteractionDragMove(drag) = event {
                let delta = drag.delta;
                target.update("input", |s| {
                    let view = s.map.projection();
                    let center = ScreenPoint::new(
                        view.width / 2.0 - delta.x,
                        view.height / 2.0 - delta.y,
                    );
                    s.map.center = view.to_lat_lng(center);
                });
            }
        });

        sync
    }

    /// Paint one frame synchronously.
    pub fn render_frame(&self, delta_ms: f64) -> RenderSummary {
        self.layers.lock().render(delta_ms)
    }

    /// Render one pass per tick of `frames` until the stream ends or the app
    /// shuts down. Returns false if a loop is already running.
    pub fn spawn_render_loop<S>(&self, frames: S) -> bool
    where
        S: Stream<Item = Instant> + Send + 'static,
    {
        let mut task = self.render_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let layers = self.layers.clone();
        let cancel = self.shutdown.child_token();
        *task = Some(
            self.runtime
                .spawn(async move { run_render_loop(layers, frames, cancel).await }),
        );
        info!("Render loop started");
        true
    }

    /// Stop the render loop, tear down the GPS core and destroy every layer.
    pub async fn shutdown(self) {
        info!("Shutting down Eldritch Sanctuary core");
        self.shutdown.cancel();
        let task = self.render_task.lock().take();
        if let Some(task) = task {
            match task.await {
                Ok(passes) => debug!(passes, "Render loop joined"),
                Err(e) => warn!(error = %e, "Render loop task failed"),
            }
        }
        self.gps.destroy();
        self.layers.lock().destroy();
        info!("Shutdown complete");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<GameStore> {
        &self.store
    }

    pub fn map(&self) -> &Arc<HeadlessMap> {
        &self.map
    }

    pub fn objects(&self) -> &Arc<MapObjectManager> {
        &self.objects
    }

    pub fn gps(&self) -> &GpsCore {
        &self.gps
    }

    pub fn layers(&self) -> &Arc<Mutex<LayerManager>> {
        &self.layers
    }

    /// Pointer input entry point.
    pub fn input(&self) -> &InputHandle {
        &self.input
    }

    pub fn trail(&self) -> &Arc<Mutex<PathTrail>> {
        &self.trail
    }
}
