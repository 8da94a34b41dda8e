//! Frame-driven render loop.

use super::LayerManager;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Render one pass per tick of `frames` until the stream ends or `cancel`
/// fires. Returns the number of passes run.
///
/// The host owns the cadence: a display refresh signal in an app, a
/// `tokio::time::interval` in the CLI, a finite stream in tests.
pub async fn run_render_loop<S>(
    manager: Arc<Mutex<LayerManager>>,
    frames: S,
    cancel: CancellationToken,
) -> u64
where
    S: Stream<Item = Instant>,
{
    tokio::pin!(frames);
    let mut last: Option<Instant> = None;
    let mut passes = 0u64;

    loop {
        let tick = tokio::select! {
            _ = cancel.cancelled() => break,
            tick = frames.next() => tick,
        };
        let Some(now) = tick else {
            break;
        };

        let delta_ms = last
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        last = Some(now);

        manager.lock().render(delta_ms);
        passes += 1;
    }

    tracing::debug!(passes, "Render loop stopped");
    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::events::EventBus;
    use crate::layers::BackgroundLayer;
    use crate::state::{GameState, GameStore};
    use std::time::Duration;

    fn shared_manager() -> Arc<Mutex<LayerManager>> {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(GameStore::new(GameState::default()));
        let mut manager = LayerManager::new(bus, store, Box::new(RecordingCanvas::new(64, 64)));
        manager
            .add_layer(Box::new(BackgroundLayer::new()))
            .expect("background layer");
        Arc::new(Mutex::new(manager))
    }

    #[tokio::test]
    async fn test_one_pass_per_tick() {
        let manager = shared_manager();
        let start = Instant::now();
        let ticks = (0..5).map(move |i| start + Duration::from_millis(16 * i));

        let passes = run_render_loop(
            manager.clone(),
            futures::stream::iter(ticks),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(passes, 5);
        assert_eq!(manager.lock().frame_index(), 5);
    }

    #[tokio::test]
    async fn test_cancel_stops_loop() {
        let manager = shared_manager();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let passes = run_render_loop(manager, futures::stream::pending(), cancel).await;
        assert_eq!(passes, 0);
    }
}
