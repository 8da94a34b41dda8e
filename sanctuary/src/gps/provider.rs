//! Geolocation device abstraction.
//!
//! The GPS driver depends on [`GeolocationProvider`] rather than a concrete
//! device, so the same acquisition policy runs against real hardware, the
//! headless simulator or a test script.
//!
//! # Design
//!
//! The trait is dyn-compatible: one-shot requests return a boxed future and
//! continuous updates are pushed into a channel the driver owns.

use super::{GpsError, PositionOptions, RawReading};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Channel a provider pushes watch updates into.
pub type WatchSink = mpsc::UnboundedSender<Result<RawReading, GpsError>>;

/// Identifies one active watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// A source of device positions.
pub trait GeolocationProvider: Send + Sync {
    /// Request one position. The provider enforces `options.timeout` and
    /// reports it as a TIMEOUT error.
    fn current_position(&self, options: PositionOptions)
        -> BoxFuture<'_, Result<RawReading, GpsError>>;

    /// Start pushing updates into `sink` until [`clear_watch`](Self::clear_watch).
    fn watch_position(&self, options: PositionOptions, sink: WatchSink) -> WatchId;

    /// Stop a watch. Dropping the sink ends the driver's watch task.
    fn clear_watch(&self, id: WatchId);
}

/// Scripted device for simulations and tests.
///
/// Each `current_position` call takes the next scripted result. Once the
/// script is exhausted every request yields the `exhausted` result
/// (POSITION_UNAVAILABLE unless overridden). Watch updates are pushed by hand
/// with [`push_watch`](Self::push_watch).
///
/// # Example
///
/// ```
/// use sanctuary::gps::{GpsError, RawReading, SimulatedProvider};
///
/// let device = SimulatedProvider::scripted([
///     Err(GpsError::timeout()),
///     Ok(RawReading::new(61.50, 23.76, Some(8.0))),
/// ]);
/// assert_eq!(device.remaining(), 2);
/// ```
pub struct SimulatedProvider {
    script: Mutex<VecDeque<Result<RawReading, GpsError>>>,
    exhausted: Mutex<Result<RawReading, GpsError>>,
    latency: Duration,
    watches: Mutex<HashMap<u64, WatchSink>>,
    next_watch: AtomicU64,
    requests: AtomicU64,
}

impl fmt::Debug for SimulatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedProvider")
            .field("remaining", &self.remaining())
            .field("latency", &self.latency)
            .field("active_watches", &self.active_watches())
            .field("requests", &self.request_count())
            .finish()
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::scripted(std::iter::empty())
    }

    pub fn scripted(results: impl IntoIterator<Item = Result<RawReading, GpsError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            exhausted: Mutex::new(Err(GpsError::unavailable())),
            latency: Duration::ZERO,
            watches: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(1),
            requests: AtomicU64::new(0),
        }
    }

    /// Delay every one-shot response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Result returned once the script runs out.
    pub fn with_exhausted(self, result: Result<RawReading, GpsError>) -> Self {
        *self.exhausted.lock() = result;
        self
    }

    pub fn push_result(&self, result: Result<RawReading, GpsError>) {
        self.script.lock().push_back(result);
    }

    /// Deliver one update to every active watch. Returns how many received it.
    pub fn push_watch(&self, result: Result<RawReading, GpsError>) -> usize {
        let mut watches = self.watches.lock();
        watches.retain(|_, sink| !sink.is_closed());
        watches
            .values()
            .filter(|sink| sink.send(result.clone()).is_ok())
            .count()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }
}

impl GeolocationProvider for SimulatedProvider {
    fn current_position(
        &self,
        _options: PositionOptions,
    ) -> BoxFuture<'_, Result<RawReading, GpsError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.exhausted.lock().clone());
        let latency = self.latency;

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            result
        })
    }

    fn watch_position(&self, _options: PositionOptions, sink: WatchSink) -> WatchId {
        let id = self.next_watch.fetch_add(1, Ordering::SeqCst);
        self.watches.lock().insert(id, sink);
        WatchId(id)
    }

    fn clear_watch(&self, id: WatchId) {
        self.watches.lock().remove(&id.0);
    }
}

/// Provider for hosts without a geolocation device. Every request fails with
/// POSITION_UNAVAILABLE, which sends the core straight to fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProvider;

impl GeolocationProvider for UnsupportedProvider {
    fn current_position(
        &self,
        _options: PositionOptions,
    ) -> BoxFuture<'_, Result<RawReading, GpsError>> {
        Box::pin(async {
            Err(GpsError::new(
                super::GpsErrorCode::PositionUnavailable,
                "Geolocation not supported",
            ))
        })
    }

    fn watch_position(&self, _options: PositionOptions, _sink: WatchSink) -> WatchId {
        WatchId(0)
    }

    fn clear_watch(&self, _id: WatchId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_exhausted() {
        let device = SimulatedProvider::scripted([Ok(RawReading::new(1.0, 2.0, None))]);

        let first = device.current_position(PositionOptions::default()).await;
        assert_eq!(first, Ok(RawReading::new(1.0, 2.0, None)));

        let second = device.current_position(PositionOptions::default()).await;
        assert_eq!(second, Err(GpsError::unavailable()));
        assert_eq!(device.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_result_is_configurable() {
        let device = SimulatedProvider::scripted([Err(GpsError::timeout())])
            .with_exhausted(Ok(RawReading::new(60.0, 24.0, None)));

        let first = device.current_position(PositionOptions::default()).await;
        assert_eq!(first, Err(GpsError::timeout()));
        for _ in 0..2 {
            let next = device.current_position(PositionOptions::default()).await;
            assert_eq!(next, Ok(RawReading::new(60.0, 24.0, None)));
        }
        assert_eq!(device.request_count(), 3);
    }

    #[tokio::test]
    async fn test_watch_push_and_clear() {
        let device = SimulatedProvider::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = device.watch_position(PositionOptions::default(), tx);

        assert_eq!(device.push_watch(Ok(RawReading::new(3.0, 4.0, None))), 1);
        assert_eq!(rx.recv().await, Some(Ok(RawReading::new(3.0, 4.0, None))));

        device.clear_watch(id);
        assert_eq!(device.active_watches(), 0);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let device = SimulatedProvider::scripted([Err(GpsError::timeout())])
            .with_latency(Duration::from_secs(15));
        let started = tokio::time::Instant::now();
        let result = device.current_position(PositionOptions::default()).await;
        assert_eq!(result, Err(GpsError::timeout()));
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let result = UnsupportedProvider
            .current_position(PositionOptions::default())
            .await;
        let error = result.expect_err("no device");
        assert_eq!(error.message, "Geolocation not supported");
    }
}
