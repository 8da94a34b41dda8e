//! Map invalidation throttling for large object counts.
//!
//! # State Machine
//!
//! ```text
//! Normal --[live objects >= threshold]--> Performance
//! Performance --[live objects < 90% of threshold]--> Normal
//! ```
//!
//! In `Normal` every mutation invalidates the map, and so does the mutation
//! that enters `Performance`. After that at most one invalidation runs per
//! interval; mutations inside the window leave a pending
//! invalidation that the next due mutation, [`InvalidationThrottle::poll`] or
//! [`InvalidationThrottle::flush`] picks up.

use std::time::Duration;

/// Fraction of the threshold the live count must drop below to leave
/// performance mode.
pub const PERFORMANCE_EXIT_RATIO: f64 = 0.9;

/// Default live-object count that enters performance mode.
pub const DEFAULT_PERFORMANCE_THRESHOLD: usize = 500;

/// Default minimum spacing of invalidations in performance mode.
pub const DEFAULT_INVALIDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Throttle mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleMode {
    Normal,
    Performance,
}

/// What the caller should do after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleDecision {
    /// Invalidate the map now.
    pub invalidate: bool,
    /// `Some(enabled)` when the mode changed.
    pub transition: Option<bool>,
}

#[derive(Debug)]
pub struct InvalidationThrottle {
    threshold: usize,
    interval_ms: u64,
    mode: ThrottleMode,
    last_invalidate_ms: Option<u64>,
    pending: bool,
}

impl InvalidationThrottle {
    pub fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            interval_ms: interval.as_millis() as u64,
            mode: ThrottleMode::Normal,
            last_invalidate_ms: None,
            pending: false,
        }
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn exit_below(&self) -> usize {
        (self.threshold as f64 * PERFORMANCE_EXIT_RATIO).ceil() as usize
    }

    /// Record one mutation that left `live` objects.
    pub fn on_mutation(&mut self, live: usize, now_ms: u64) -> ThrottleDecision {
        let mut decision = ThrottleDecision::default();

        match self.mode {
            ThrottleMode::Normal if live >= self.threshold => {
                self.mode = ThrottleMode::Performance;
                decision.transition = Some(true);
                tracing::info!(
                    live,
                    threshold = self.threshold,
                    "Map performance mode enabled"
                );
            }
            ThrottleMode::Performance if live < self.exit_below() => {
                self.mode = ThrottleMode::Normal;
                decision.transition = Some(false);
                tracing::info!(live, "Map performance mode disabled");
            }
            _ => {}
        }

        decision.invalidate = match self.mode {
            ThrottleMode::Normal => true,
            ThrottleMode::Performance => {
                decision.transition == Some(true) || self.is_due(now_ms)
            }
        };

        if decision.invalidate {
            self.mark_invalidated(now_ms);
        } else {
            self.pending = true;
        }
        decision
    }

    /// Whether a pending invalidation has become due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.pending && self.is_due(now_ms) {
            self.mark_invalidated(now_ms);
            true
        } else {
            false
        }
    }

    /// Take any pending invalidation regardless of the interval.
    pub fn flush(&mut self, now_ms: u64) -> bool {
        if self.pending {
            self.mark_invalidated(now_ms);
            true
        } else {
            false
        }
    }

    fn is_due(&self, now_ms: u64) -> bool {
        self.last_invalidate_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    fn mark_invalidated(&mut self, now_ms: u64) {
        self.last_invalidate_ms = Some(now_ms);
        self.pending = false;
    }
}

impl Default for InvalidationThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PERFORMANCE_THRESHOLD, DEFAULT_INVALIDATE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> InvalidationThrottle {
        InvalidationThrottle::new(10, Duration::from_millis(250))
    }

    #[test]
    fn test_normal_mode_invalidates_every_mutation() {
        let mut t = throttle();
        for i in 1..10 {
            let decision = t.on_mutation(i, 0);
            assert!(decision.invalidate);
            assert_eq!(decision.transition, None);
        }
        assert_eq!(t.mode(), ThrottleMode::Normal);
    }

    #[test]
    fn test_enters_performance_at_threshold() {
        let mut t = throttle();
        let decision = t.on_mutation(10, 1000);
        assert_eq!(decision.transition, Some(true));
        assert!(decision.invalidate);
        assert_eq!(t.mode(), ThrottleMode::Performance);
    }

    #[test]
    fn test_entering_performance_invalidates_inside_window() {
        let mut t = throttle();
        assert!(t.on_mutation(9, 1000).invalidate);

        let decision = t.on_mutation(10, 1000);
        assert_eq!(decision.transition, Some(true));
        assert!(decision.invalidate);
        assert!(!t.is_pending());

        // The window restarts from the entry.
        assert!(!t.on_mutation(11, 1100).invalidate);
        assert!(t.poll(1250));
    }

    #[test]
    fn test_performance_mode_spaces_invalidations() {
        let mut t = throttle();
        assert!(t.on_mutation(10, 1000).invalidate);
        assert!(!t.on_mutation(11, 1100).invalidate);
        assert!(!t.on_mutation(12, 1200).invalidate);
        assert!(t.is_pending());

        assert!(!t.poll(1249));
        assert!(t.poll(1250));
        assert!(!t.is_pending());
        assert!(!t.poll(2000));
    }

    #[test]
    fn test_flush_ignores_interval() {
        let mut t = throttle();
        t.on_mutation(10, 1000);
        t.on_mutation(11, 1001);
        assert!(t.flush(1002));
        assert!(!t.flush(1003));
    }

    #[test]
    fn test_exit_requires_dropping_below_ninety_percent() {
        let mut t = throttle();
        t.on_mutation(10, 0);
        assert_eq!(t.on_mutation(9, 1000).transition, None);
        assert_eq!(t.mode(), ThrottleMode::Performance);

        let decision = t.on_mutation(8, 2000);
        assert_eq!(decision.transition, Some(false));
        assert!(decision.invalidate);
        assert_eq!(t.mode(), ThrottleMode::Normal);
    }
}
