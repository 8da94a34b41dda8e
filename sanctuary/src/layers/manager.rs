//! Ordered layer collection and the render pass.

use super::{Frame, Layer, LayerContext, LayerError};
use crate::canvas::{Canvas, Rgba};
use crate::clock::{Clock, SystemClock};
use crate::events::{topics, Event, EventBus, SubscriptionSet};
use crate::state::GameStore;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Window over which FPS is averaged before it is written to the store.
const FPS_WINDOW_MS: u64 = 1000;

/// Control request received over the bus, applied at the next render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerCommand {
    Show(String),
    Hide(String),
    Pause,
    Resume,
}

/// Accumulated paint timings of one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerTiming {
    pub renders: u64,
    pub failures: u64,
    pub last_ms: f64,
    pub total_ms: f64,
}

impl LayerTiming {
    pub fn average_ms(&self) -> f64 {
        if self.renders == 0 {
            0.0
        } else {
            self.total_ms / self.renders as f64
        }
    }
}

/// Read-only view of one registered layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub name: String,
    pub z_index: i32,
    pub visible: bool,
    pub timing: LayerTiming,
}

/// Outcome of one [`LayerManager::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub painted: usize,
    pub failed: usize,
    pub paused: bool,
}

struct LayerSlot {
    layer: Box<dyn Layer>,
    name: String,
    z_index: i32,
    seq: u64,
    visible: bool,
    timing: LayerTiming,
}

#[derive(Debug, Default)]
struct FpsWindow {
    started_ms: Option<u64>,
    frames: u64,
    render_ms: f64,
}

/// Owns every layer and the shared canvas.
///
/// Bus listeners never touch the manager directly. They push
/// [`LayerCommand`]s onto a queue that [`render`](Self::render) drains first,
/// so a listener firing during a pass cannot reenter it.
pub struct LayerManager {
    bus: Arc<EventBus>,
    store: Arc<GameStore>,
    clock: Arc<dyn Clock>,
    canvas: Box<dyn Canvas>,
    background: Rgba,
    slots: Vec<LayerSlot>,
    next_seq: u64,
    commands: Arc<Mutex<Vec<LayerCommand>>>,
    subscriptions: SubscriptionSet,
    paused: bool,
    frame_index: u64,
    fps: FpsWindow,
}

impl fmt::Debug for LayerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerManager")
            .field("layers", &self.render_order())
            .field("paused", &self.paused)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl LayerManager {
    pub fn new(bus: Arc<EventBus>, store: Arc<GameStore>, canvas: Box<dyn Canvas>) -> Self {
        Self::with_clock(bus, store, canvas, Arc::new(SystemClock))
    }

    pub fn with_clock(
        bus: Arc<EventBus>,
        store: Arc<GameStore>,
        canvas: Box<dyn Canvas>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let commands: Arc<Mutex<Vec<LayerCommand>>> = Arc::default();
        let mut subscriptions = SubscriptionSet::new(bus.clone());

        let queue = commands.clone();
        subscriptions.on(topics::LAYER_SHOW_REQUEST, move |event| {
            if let Event::LayerShowRequest { name } = event {
                queue.lock().push(LayerCommand::Show(name.clone()));
            }
        });
        let queue = commands.clone();
        subscriptions.on(topics::LAYER_HIDE_REQUEST, move |event| {
            if let Event::LayerHideRequest { name } = event {
                queue.lock().push(LayerCommand::Hide(name.clone()));
            }
        });
        let queue = commands.clone();
        subscriptions.on(topics::RENDER_PAUSE, move |_| {
            queue.lock().push(LayerCommand::Pause);
        });
        let queue = commands.clone();
        subscriptions.on(topics::RENDER_RESUME, move |_| {
            queue.lock().push(LayerCommand::Resume);
        });

        Self {
            bus,
            store,
            clock,
            canvas,
            background: Rgba::BLACK,
            slots: Vec::new(),
            next_seq: 0,
            commands,
            subscriptions,
            paused: false,
            frame_index: 0,
            fps: FpsWindow::default(),
        }
    }

    /// Color the canvas is cleared to before each pass.
    pub fn set_clear_color(&mut self, color: Rgba) {
        self.background = color;
    }

    /// Initialize `layer` and insert it in paint order.
    pub fn add_layer(&mut self, mut layer: Box<dyn Layer>) -> Result<(), LayerError> {
        let name = layer.name().to_string();
        if self.slots.iter().any(|s| s.name == name) {
            tracing::warn!(layer = %name, "Duplicate layer name rejected");
            return Err(LayerError::DuplicateName(name));
        }

        let ctx = LayerContext {
            bus: self.bus.clone(),
            store: self.store.clone(),
        };
        if let Err(e) = layer.init(&ctx) {
            tracing::error!(layer = %name, error = %e, "Layer init failed");
            return Err(e);
        }

        let z_index = layer.z_index();
        let visible = layer.visible_by_default();
        let seq = self.next_seq;
        self.next_seq += 1;

        let at = self
            .slots
            .partition_point(|s| (s.z_index, s.seq) < (z_index, seq));
        self.slots.insert(
            at,
            LayerSlot {
                layer,
                name: name.clone(),
                z_index,
                seq,
                visible,
                timing: LayerTiming::default(),
            },
        );

        tracing::debug!(layer = %name, z_index, visible, "Layer added");
        self.bus.emit(Event::LayerAdded { name, z_index });
        Ok(())
    }

    /// Destroy and evict a layer. Unknown names return false.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            tracing::warn!(layer = name, "Cannot remove unknown layer");
            return false;
        };
        let mut slot = self.slots.remove(index);
        slot.layer.destroy();
        tracing::debug!(layer = name, "Layer removed");
        self.bus.emit(Event::LayerRemoved {
            name: name.to_string(),
        });
        true
    }

    pub fn layer(&self, name: &str) -> Option<&dyn Layer> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.layer.as_ref())
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut (dyn Layer + 'static)> {
        self.slots
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| s.layer.as_mut())
    }

    pub fn show_layer(&mut self, name: &str) -> bool {
        self.set_visible(name, true)
    }

    pub fn hide_layer(&mut self, name: &str) -> bool {
        self.set_visible(name, false)
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.slots.iter().any(|s| s.name == name && s.visible)
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        let Some(index) = self.index_of(name) else {
            tracing::warn!(layer = name, visible, "Cannot toggle unknown layer");
            return false;
        };
        self.slots[index].visible = visible;

        let name = name.to_string();
        self.bus.emit(if visible {
            Event::LayerShown { name }
        } else {
            Event::LayerHidden { name }
        });
        true
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Layer names in paint order.
    pub fn render_order(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.name.clone()).collect()
    }

    pub fn layers(&self) -> Vec<LayerInfo> {
        self.slots
            .iter()
            .map(|s| LayerInfo {
                name: s.name.clone(),
                z_index: s.z_index,
                visible: s.visible,
                timing: s.timing,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    fn drain_commands(&mut self) {
        let commands = std::mem::take(&mut *self.commands.lock());
        for command in commands {
            match command {
                LayerCommand::Show(name) => {
                    self.show_layer(&name);
                }
                LayerCommand::Hide(name) => {
                    self.hide_layer(&name);
                }
                LayerCommand::Pause => self.set_paused(true),
                LayerCommand::Resume => self.set_paused(false),
            }
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            tracing::info!(paused, "Render state changed");
            self.store.update("layers", |s| s.system.paused = paused);
        }
    }

    /// Paint one frame.
    ///
    /// A layer that returns an error or panics is logged and skipped. The pass
    /// always reaches the last layer.
    pub fn render(&mut self, delta_ms: f64) -> RenderSummary {
        self.drain_commands();
        if self.paused {
            return RenderSummary {
                paused: true,
                ..RenderSummary::default()
            };
        }

        let now_ms = self.clock.now_ms();
        let pass_started = Instant::now();
        let mut summary = RenderSummary::default();

        self.canvas.clear(self.background);
        for slot in self.slots.iter_mut().filter(|s| s.visible) {
            let mut frame = Frame {
                canvas: self.canvas.as_mut(),
                store: &self.store,
                delta_ms,
                frame_index: self.frame_index,
                now_ms,
            };

            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| slot.layer.render(&mut frame)));
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            slot.timing.renders += 1;
            slot.timing.last_ms = elapsed_ms;
            slot.timing.total_ms += elapsed_ms;

            match result {
                Ok(Ok(())) => summary.painted += 1,
                Ok(Err(e)) => {
                    slot.timing.failures += 1;
                    summary.failed += 1;
                    tracing::error!(layer = %slot.name, error = %e, "Layer render failed");
                }
                Err(_) => {
                    slot.timing.failures += 1;
                    summary.failed += 1;
                    tracing::error!(layer = %slot.name, "Layer panicked during render");
                }
            }
        }

        self.frame_index += 1;
        self.record_frame(now_ms, pass_started.elapsed().as_secs_f64() * 1000.0);
        summary
    }

    fn record_frame(&mut self, now_ms: u64, render_ms: f64) {
        let started = *self.fps.started_ms.get_or_insert(now_ms);
        self.fps.frames += 1;
        self.fps.render_ms += render_ms;

        let elapsed = now_ms.saturating_sub(started);
        if elapsed >= FPS_WINDOW_MS {
            let fps = self.fps.frames as f64 * 1000.0 / elapsed as f64;
            let mean = self.fps.render_ms / self.fps.frames as f64;
            let frame_count = self.frame_index;
            self.store.update("layers", |s| {
                s.system.performance.fps = fps;
                s.system.performance.render_time_ms = mean;
                s.system.performance.frame_count = frame_count;
            });
            tracing::trace!(fps, render_ms = mean, "Render stats");
            self.fps = FpsWindow {
                started_ms: Some(now_ms),
                ..FpsWindow::default()
            };
        }
    }

    /// Destroy every layer and detach from the bus.
    pub fn destroy(&mut self) {
        for slot in &mut self.slots {
            slot.layer.destroy();
        }
        let count = self.slots.len();
        self.slots.clear();
        self.subscriptions.clear();
        self.commands.lock().clear();
        tracing::info!(layers = count, "Layer manager destroyed");
    }
}
