//! Tile grid under the map.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::geo::{world_pixel, ScreenPoint, ScreenRect, TILE_SIZE};

const Z_INDEX: i32 = 1;
const TINT: Rgba = Rgba::new(0x1e, 0x29, 0x3b, 0x60);
const GRID: Rgba = Rgba::new(0, 0, 0, 0x33);

/// Draws tile boundaries for the current map view.
#[derive(Debug, Default)]
pub struct TerrainLayer {
    last_line_count: usize,
}

impl TerrainLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid lines drawn in the last frame.
    pub fn last_line_count(&self) -> usize {
        self.last_line_count
    }
}

/// Screen offsets of tile edges along one axis.
fn tile_edges(center_px: f64, extent: f32) -> Vec<f32> {
    let origin = center_px - f64::from(extent) / 2.0;
    let first = (origin / TILE_SIZE).ceil() * TILE_SIZE;
    let mut edges = Vec::new();
    let mut edge = first;
    while edge - origin <= f64::from(extent) {
        edges.push((edge - origin) as f32);
        edge += TILE_SIZE;
    }
    edges
}

impl Layer for TerrainLayer {
    fn name(&self) -> &str {
        "terrain"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let view = frame.viewport();
        let (cx, cy) = world_pixel(view.center, view.zoom);

        frame
            .canvas
            .fill_rect(ScreenRect::new(0.0, 0.0, view.width, view.height), TINT);

        let xs = tile_edges(cx, view.width);
        let ys = tile_edges(cy, view.height);
        for x in &xs {
            frame.canvas.line(
                ScreenPoint::new(*x, 0.0),
                ScreenPoint::new(*x, view.height),
                GRID,
                1.0,
            );
        }
        for y in &ys {
            frame.canvas.line(
                ScreenPoint::new(0.0, *y),
                ScreenPoint::new(view.width, *y),
                GRID,
                1.0,
            );
        }
        self.last_line_count = xs.len() + ys.len();
        Ok(())
    }
}
