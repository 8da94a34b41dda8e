//! Synchronous publish/subscribe bus.

use super::Event;
use crate::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of emitted events retained for debugging.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A registered callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`EventBus::on`]. Passing it to [`EventBus::off`]
/// removes exactly the listener it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

struct ListenerEntry {
    id: u64,
    once: bool,
    callback: Listener,
}

/// One entry of the debugging history.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub topic: &'static str,
    pub event: Event,
    pub timestamp_ms: u64,
}

/// Snapshot of bus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    pub topic_count: usize,
    pub listener_count: usize,
    pub history_len: usize,
    pub emitted: u64,
    pub listener_panics: u64,
    pub debug: bool,
}

/// Process-wide publish/subscribe channel.
///
/// `emit` invokes every listener of the event's topic synchronously, in
/// registration order. The listener list is snapshotted before dispatch, so a
/// listener may emit, subscribe or unsubscribe re-entrantly. A panicking
/// listener is caught and logged, and the remaining listeners still run.
///
/// # Example
///
/// ```
/// use sanctuary::events::{topics, Event, EventBus};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let sub = bus.on(topics::GPS_REQUEST, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.emit(Event::GpsRequest);
/// assert!(bus.off(&sub));
/// bus.emit(Event::GpsRequest);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,
    history: Mutex<VecDeque<EventRecord>>,
    history_limit: usize,
    next_id: AtomicU64,
    emitted: AtomicU64,
    listener_panics: AtomicU64,
    debug: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Bus whose history timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(DEFAULT_HISTORY_LIMIT)),
            history_limit: DEFAULT_HISTORY_LIMIT,
            next_id: AtomicU64::new(1),
            emitted: AtomicU64::new(0),
            listener_panics: AtomicU64::new(0),
            debug: AtomicBool::new(false),
            clock,
        }
    }

    /// Override the history bound (0 disables history).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Register a listener for `topic`.
    pub fn on<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(callback), false)
    }

    /// Register a listener that is removed after its first delivery.
    pub fn once<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register(topic, Arc::new(callback), true)
    }

    fn register(&self, topic: &str, callback: Listener, once: bool) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(ListenerEntry { id, once, callback });

        if self.debug.load(Ordering::Relaxed) {
            tracing::debug!(topic, listener_id = id, once, "Listener registered");
        }

        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    /// Remove one listener. Returns false if it was already gone.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(&subscription.topic) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| entry.id != subscription.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&subscription.topic);
        }
        removed
    }

    /// Deliver `event` to every listener of its topic.
    pub fn emit(&self, event: Event) {
        let topic = event.topic();
        self.emitted.fetch_add(1, Ordering::Relaxed);

        if self.debug.load(Ordering::Relaxed) {
            tracing::debug!(topic, event = ?event, "Event emitted");
        }
        self.record(topic, &event);

        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let Some(entries) = listeners.get_mut(topic) else {
                return;
            };
            let snapshot = entries.iter().map(|e| Arc::clone(&e.callback)).collect();
            entries.retain(|entry| !entry.once);
            let drained = entries.is_empty();
            if drained {
                listeners.remove(topic);
            }
            snapshot
        };

        for callback in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
            if let Err(payload) = outcome {
                self.listener_panics.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    topic,
                    panic = %panic_message(payload.as_ref()),
                    "Event listener panicked; continuing delivery"
                );
            }
        }
    }

    fn record(&self, topic: &'static str, event: &Event) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        history.push_back(EventRecord {
            topic,
            event: event.clone(),
            timestamp_ms: self.clock.now_ms(),
        });
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }

    /// Drop every listener, or only those of one topic.
    pub fn remove_all_listeners(&self, topic: Option<&str>) {
        let mut listeners = self.listeners.lock();
        match topic {
            Some(topic) => {
                listeners.remove(topic);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.lock().get(topic).map_or(0, Vec::len)
    }

    /// Topics that currently have at least one listener, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.listeners.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// The most recent `limit` records, oldest first.
    pub fn history(&self, limit: usize) -> Vec<EventRecord> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Recorded events on one topic, oldest first.
    pub fn history_for(&self, topic: &str) -> Vec<EventRecord> {
        self.history
            .lock()
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn stats(&self) -> BusStats {
        let (topic_count, listener_count) = {
            let listeners = self.listeners.lock();
            (listeners.len(), listeners.values().map(Vec::len).sum())
        };
        BusStats {
            topic_count,
            listener_count,
            history_len: self.history.lock().len(),
            emitted: self.emitted.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
            debug: self.debug.load(Ordering::Relaxed),
        }
    }

    /// Log every emit and registration at `debug` level.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A group of subscriptions released together.
///
/// Components keep one of these for every listener they register and drop it
/// (or call [`SubscriptionSet::clear`]) on teardown.
pub struct SubscriptionSet {
    bus: Arc<EventBus>,
    subscriptions: Vec<Subscription>,
}

impl fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl SubscriptionSet {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            subscriptions: Vec::new(),
        }
    }

    pub fn on<F>(&mut self, topic: &str, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.bus.on(topic, callback);
        self.subscriptions.push(subscription);
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribe everything registered through this set.
    pub fn clear(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.bus.off(&subscription);
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::topics;
    use crate::geo::ScreenPoint;
    use std::sync::atomic::AtomicUsize;

    fn counter(bus: &EventBus, topic: &str) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = bus.on(topic, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..4 {
            let order = Arc::clone(&order);
            bus.on(topics::UI_MENU_TOGGLE, move |_| order.lock().push(n));
        }

        bus.emit(Event::UiMenuToggle);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unknown_topic_is_noop() {
        let bus = EventBus::new();
        bus.emit(Event::RenderPause);
        assert_eq!(bus.stats().emitted, 1);
        assert_eq!(bus.listener_count(topics::RENDER_PAUSE), 0);
    }

    #[test]
    fn test_off_removes_only_that_listener() {
        let bus = EventBus::new();
        let (a, sub_a) = counter(&bus, topics::GPS_REQUEST);
        let (b, _sub_b) = counter(&bus, topics::GPS_REQUEST);

        assert!(bus.off(&sub_a));
        assert!(!bus.off(&sub_a));
        bus.emit(Event::GpsRequest);

        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let (before, _s1) = counter(&bus, topics::GPS_READY);
        bus.on(topics::GPS_READY, |_| panic!("listener exploded"));
        let (after, _s2) = counter(&bus, topics::GPS_READY);

        bus.emit(Event::GpsReady);

        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().listener_panics, 1);
    }

    #[test]
    fn test_once_delivers_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.once(topics::RENDER_RESUME, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(Event::RenderResume);
        bus.emit(Event::RenderResume);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(topics::RENDER_RESUME), 0);
    }

    #[test]
    fn test_reentrant_emit_and_subscribe() {
        let bus = Arc::new(EventBus::new());
        let (taps, _sub) = counter(&bus, topics::INTERACTION_TAP);

        let inner_bus = Arc::clone(&bus);
        bus.on(topics::UI_ELEMENT_CLICK, move |_| {
            inner_bus.emit(Event::InteractionTap(ScreenPoint::new(1.0, 2.0)));
            inner_bus.on(topics::UI_ELEMENT_CLICK, |_| {});
        });

        bus.emit(Event::UiElementClick {
            element: "gps-button".into(),
            point: ScreenPoint::new(1.0, 2.0),
        });

        assert_eq!(taps.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(topics::UI_ELEMENT_CLICK), 2);
    }

    #[test]
    fn test_listener_removed_mid_dispatch_still_sees_current_event() {
        let bus = Arc::new(EventBus::new());
        let (second, second_sub) = counter(&bus, topics::GPS_REQUESTING);
        let remover_bus = Arc::clone(&bus);
        let slot = Arc::new(Mutex::new(Some(second_sub)));
        let remover_slot = Arc::clone(&slot);
        // Runs after `second` and unsubscribes it.
        bus.on(topics::GPS_REQUESTING, move |_| {
            if let Some(sub) = remover_slot.lock().take() {
                remover_bus.off(&sub);
            }
        });

        bus.emit(Event::GpsRequesting);
        bus.emit(Event::GpsRequesting);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::new().with_history_limit(3);
        for _ in 0..5 {
            bus.emit(Event::GpsRequest);
        }
        bus.emit(Event::GpsReady);

        let history = bus.history(10);
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().map(|r| r.topic), Some(topics::GPS_READY));
        assert_eq!(bus.history_for(topics::GPS_READY).len(), 1);

        bus.clear_history();
        assert!(bus.history(10).is_empty());
    }

    #[test]
    fn test_remove_all_listeners() {
        let bus = EventBus::new();
        let _ = counter(&bus, topics::GPS_READY);
        let _ = counter(&bus, topics::GPS_REQUEST);

        bus.remove_all_listeners(Some(topics::GPS_READY));
        assert_eq!(bus.topics(), vec![topics::GPS_REQUEST.to_string()]);

        bus.remove_all_listeners(None);
        assert_eq!(bus.stats().listener_count, 0);
    }

    #[test]
    fn test_subscription_set_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        {
            let mut set = SubscriptionSet::new(Arc::clone(&bus));
            set.on(topics::GPS_READY, |_| {});
            set.on(topics::GPS_REQUEST, |_| {});
            assert_eq!(set.len(), 2);
            assert_eq!(bus.stats().listener_count, 2);
        }
        assert_eq!(bus.stats().listener_count, 0);
    }
}
