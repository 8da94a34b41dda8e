//! Walked path trail.
//!
//! [`PathTrail`] keeps a bounded history of real fixes and derives a heading
//! from it. [`PathLayer`] feeds the trail from `gps:position:updated` and
//! draws it as a fading polyline.
//!
//! Fallback positions are never recorded: the player did not walk to the
//! default location.

use super::{Frame, Layer, LayerContext, LayerError};
use crate::canvas::Rgba;
use crate::events::{topics, Event, SubscriptionSet};
use crate::geo::{bearing_deg, distance_m, LatLng, ScreenPoint};
use crate::gps::Position;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const Z_INDEX: i32 = 3;
const TRAIL: Rgba = Rgba::rgb(0xf5, 0x9e, 0x0b);
const HEAD: Rgba = Rgba::rgb(0x10, 0xb9, 0x81);

/// Default maximum points retained.
const DEFAULT_MAX_POINTS: usize = 50;

/// Fixes closer than this to the previous point are GPS jitter.
const DEFAULT_MIN_STEP_M: f64 = 2.0;

/// Minimum span between oldest and newest point for a reliable heading.
const DEFAULT_MIN_HEADING_SPAN_M: f64 = 10.0;

/// Length of the heading indicator in pixels.
const HEADING_LENGTH_PX: f32 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    pub max_points: usize,
    pub min_step_m: f64,
    pub min_heading_span_m: f64,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            min_step_m: DEFAULT_MIN_STEP_M,
            min_heading_span_m: DEFAULT_MIN_HEADING_SPAN_M,
        }
    }
}

/// One recorded fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub position: LatLng,
    pub accuracy: Option<f64>,
    pub timestamp_ms: u64,
}

/// Bounded history of fixes, oldest first.
#[derive(Debug)]
pub struct PathTrail {
    points: VecDeque<TrailPoint>,
    config: PathConfig,
    distance_m: f64,
}

impl Default for PathTrail {
    fn default() -> Self {
        Self::new(PathConfig::default())
    }
}

impl PathTrail {
    pub fn new(config: PathConfig) -> Self {
        Self {
            points: VecDeque::with_capacity(config.max_points),
            config,
            distance_m: 0.0,
        }
    }

    /// Record a fix. Fallback positions and sub-jitter steps are ignored.
    /// Returns true if the point was kept.
    pub fn record(&mut self, position: &Position) -> bool {
        if position.is_fallback {
            return false;
        }
        let at = position.lat_lng();
        if let Some(last) = self.points.back() {
            let step = distance_m(last.position, at);
            if step < self.config.min_step_m {
                return false;
            }
            self.distance_m += step;
        }

        self.points.push_back(TrailPoint {
            position: at,
            accuracy: position.accuracy,
            timestamp_ms: position.timestamp_ms,
        });
        while self.points.len() > self.config.max_points {
            self.points.pop_front();
        }
        true
    }

    /// Heading from the oldest to the newest retained point, in degrees
    /// (0 = North, 90 = East). `None` with fewer than two points or when they
    /// are too close together to trust.
    pub fn heading(&self) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }
        let oldest = self.points.front()?;
        let newest = self.points.back()?;
        if distance_m(oldest.position, newest.position) < self.config.min_heading_span_m {
            return None;
        }
        Some(bearing_deg(oldest.position, newest.position))
    }

    /// Distance walked since the trail started, retained or not.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&TrailPoint> {
        self.points.back()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.distance_m = 0.0;
    }
}

/// Draws the trail walked this session.
#[derive(Debug)]
pub struct PathLayer {
    trail: Arc<Mutex<PathTrail>>,
    subscriptions: Option<SubscriptionSet>,
}

impl Default for PathLayer {
    fn default() -> Self {
        Self::new(PathConfig::default())
    }
}

impl PathLayer {
    pub fn new(config: PathConfig) -> Self {
        Self {
            trail: Arc::new(Mutex::new(PathTrail::new(config))),
            subscriptions: None,
        }
    }

    /// Shared handle to the trail.
    pub fn trail(&self) -> Arc<Mutex<PathTrail>> {
        self.trail.clone()
    }
}

impl Layer for PathLayer {
    fn name(&self) -> &str {
        "path"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn init(&mut self, ctx: &LayerContext) -> Result<(), LayerError> {
        let mut subscriptions = SubscriptionSet::new(ctx.bus.clone());
        let trail = self.trail.clone();
        subscriptions.on(topics::GPS_POSITION_UPDATED, move |event| {
            if let Event::GpsPositionUpdated(position) = event {
                trail.lock().record(position);
            }
        });
        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let view = frame.viewport();
        let trail = self.trail.lock();
        let count = trail.len();
        if count == 0 {
            return Ok(());
        }

        let screen: Vec<ScreenPoint> = trail.points().map(|p| view.to_screen(p.position)).collect();
        for (i, pair) in screen.windows(2).enumerate() {
            // Older segments fade out.
            let alpha = (64 + 191 * (i + 1) / count.max(1)) as u8;
            frame
                .canvas
                .line(pair[0], pair[1], TRAIL.with_alpha(alpha), 3.0);
        }

        if let Some(head) = screen.last() {
            frame.canvas.fill_circle(*head, 4.0, HEAD);
            if let Some(heading) = trail.heading() {
                let rad = heading.to_radians() as f32;
                let tip = ScreenPoint::new(
                    head.x + rad.sin() * HEADING_LENGTH_PX,
                    head.y - rad.cos() * HEADING_LENGTH_PX,
                );
                frame.canvas.line(*head, tip, HEAD, 2.0);
            }
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.subscriptions = None;
        self.trail.lock().clear();
    }
}
