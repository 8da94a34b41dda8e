//! Cosmic backdrop.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::geo::{ScreenPoint, ScreenRect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const Z_INDEX: i32 = 0;
const PARTICLE_COUNT: usize = 100;
const SKY: Rgba = Rgba::rgb(0x0b, 0x0b, 0x1e);
const AURORA: [Rgba; 5] = [
    Rgba::rgb(0xff, 0x6b, 0x6b),
    Rgba::rgb(0x4e, 0xcd, 0xc4),
    Rgba::rgb(0x45, 0xb7, 0xd1),
    Rgba::rgb(0x96, 0xce, 0xb4),
    Rgba::rgb(0xfe, 0xca, 0x57),
];

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    size: f32,
    color: Rgba,
}

/// Fills the canvas and drifts a seeded particle field over it.
#[derive(Debug)]
pub struct BackgroundLayer {
    seed: u64,
    particles: Vec<Particle>,
    sized_for: (u32, u32),
}

impl Default for BackgroundLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundLayer {
    pub fn new() -> Self {
        Self::with_seed(0x5eed)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            particles: Vec::new(),
            sized_for: (0, 0),
        }
    }

    fn scatter(&mut self, width: u32, height: u32) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.particles = (0..PARTICLE_COUNT)
            .map(|_| Particle {
                x: rng.random::<f32>() * width as f32,
                y: rng.random::<f32>() * height as f32,
                vx: (rng.random::<f32>() - 0.5) * 0.5,
                vy: (rng.random::<f32>() - 0.5) * 0.5,
                size: rng.random::<f32>() * 2.0 + 0.5,
                color: AURORA[rng.random_range(0..AURORA.len())].with_alpha(160),
            })
            .collect();
        self.sized_for = (width, height);
    }
}

impl Layer for BackgroundLayer {
    fn name(&self) -> &str {
        "background"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let (width, height) = (frame.canvas.width(), frame.canvas.height());
        if self.sized_for != (width, height) {
            self.scatter(width, height);
        }

        let bounds = frame.canvas.bounds();
        frame.canvas.fill_rect(bounds, SKY);

        // Particles move ~60 steps per second and wrap at the edges.
        let steps = (frame.delta_ms / 16.0) as f32;
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        for p in &mut self.particles {
            p.x = (p.x + p.vx * steps).rem_euclid(w);
            p.y = (p.y + p.vy * steps).rem_euclid(h);
            frame
                .canvas
                .fill_circle(ScreenPoint::new(p.x, p.y), p.size, p.color);
        }

        let band = ScreenRect::new(0.0, 0.0, w, (h * 0.1).max(1.0));
        let phase = (frame.now_ms / 2000) as usize % AURORA.len();
        frame.canvas.fill_rect(band, AURORA[phase].with_alpha(40));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::state::GameStore;

    #[test]
    fn test_fills_canvas_then_particles() {
        let mut canvas = RecordingCanvas::new(120, 80);
        let log = canvas.log();
        let store = GameStore::default();
        let mut layer = BackgroundLayer::new();

        let mut frame = Frame {
            canvas: &mut canvas,
            store: &store,
            delta_ms: 16.0,
            frame_index: 0,
            now_ms: 0,
        };
        layer.render(&mut frame).unwrap();

        let commands = log.commands();
        assert_eq!(
            commands[0],
            DrawCommand::FillRect(ScreenRect::new(0.0, 0.0, 120.0, 80.0), SKY)
        );
        let circles = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillCircle(..)))
            .count();
        assert_eq!(circles, PARTICLE_COUNT);
    }

    #[test]
    fn test_same_seed_same_field() {
        let mut a = BackgroundLayer::with_seed(1);
        let mut b = BackgroundLayer::with_seed(1);
        a.scatter(100, 100);
        b.scatter(100, 100);
        assert_eq!(a.particles[7].x, b.particles[7].x);
    }
}
