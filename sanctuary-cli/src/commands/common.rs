//! Helpers shared across CLI commands.

use std::time::{Duration, Instant};

use futures::{stream, Stream};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sanctuary::app::SanctuaryApp;
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;

use crate::error::CliError;

/// How often settlement is polled while waiting on the GPS core.
const SETTLE_POLL: Duration = Duration::from_millis(50);

/// Multi-threaded runtime for commands that bring the core up.
pub fn runtime() -> Result<Runtime, CliError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sanctuary-worker")
        .build()?)
}

/// Seeded RNG, or one seeded from the OS when no seed is given.
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Frame ticks on a fixed cadence. Missed ticks are skipped rather than
/// replayed in a burst.
pub fn frame_ticks(period: Duration) -> impl Stream<Item = Instant> + Send + 'static {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    stream::unfold(interval, |mut interval| async move {
        let tick = interval.tick().await;
        Some((tick.into_std(), interval))
    })
}

/// Wait until the GPS core has produced a position, real or fallback.
/// Returns false if `limit` passed first.
pub async fn wait_for_settled(app: &SanctuaryApp, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if app.gps().state().phase.is_settled() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(SETTLE_POLL).await;
    }
}

/// Upper bound on one full acquisition, including every back-off delay.
pub fn acquisition_budget(app: &SanctuaryApp) -> Duration {
    let gps = &app.config().gps;
    let backoff: Duration = (1..=gps.retry_attempts)
        .map(|attempt| gps.retry_delay_for(attempt))
        .sum();
    gps.options.timeout * (gps.retry_attempts + 1) + backoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[tokio::test(start_paused = true)]
    async fn test_frame_ticks_follow_period() {
        use futures::StreamExt;

        let ticks: Vec<Instant> = frame_ticks(Duration::from_millis(20)).take(3).collect().await;
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[1] - ticks[0], Duration::from_millis(20));
        assert_eq!(ticks[2] - ticks[1], Duration::from_millis(20));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a: u64 = rng(Some(9)).random();
        let b: u64 = rng(Some(9)).random();
        assert_eq!(a, b);
    }
}
