//! Drawing surface shared by every layer.
//!
//! Layers draw placeholder primitives only: fills, outlines, circles, lines
//! and labels. [`PixmapCanvas`] rasterizes them with tiny-skia and
//! [`RecordingCanvas`] records them for inspection.

mod pixmap;
mod recording;

pub use pixmap::PixmapCanvas;
pub use recording::{DrawCommand, DrawLog, RecordingCanvas};

use crate::geo::{ScreenPoint, ScreenRect};
use thiserror::Error;

/// Errors creating or exporting a canvas.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

/// The primitive drawing contract.
pub trait Canvas: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Reset every pixel to `color`.
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, rect: ScreenRect, color: Rgba);
    fn stroke_rect(&mut self, rect: ScreenRect, color: Rgba, width: f32);
    fn fill_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba);
    fn stroke_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba, width: f32);
    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, color: Rgba, width: f32);
    fn label(&mut self, at: ScreenPoint, text: &str, color: Rgba);

    /// The whole canvas as a rectangle.
    fn bounds(&self) -> ScreenRect {
        ScreenRect::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }
}
