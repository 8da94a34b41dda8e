//! tiny-skia raster canvas.

use super::{Canvas, CanvasError, Rgba};
use crate::geo::{ScreenPoint, ScreenRect};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Pixel height of the bar a label renders as.
const LABEL_HEIGHT: f32 = 3.0;

/// Pixel width per label character.
const LABEL_CHAR_WIDTH: f32 = 6.0;

/// Raster canvas.
///
/// Clones share the same pixel buffer, so a host can keep one clone for
/// export while the layer manager owns the other.
#[derive(Clone)]
pub struct PixmapCanvas {
    pixmap: Arc<Mutex<Pixmap>>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for PixmapCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapCanvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

impl PixmapCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let pixmap = Pixmap::new(width, height).ok_or(CanvasError::InvalidSize { width, height })?;
        Ok(Self {
            pixmap: Arc::new(Mutex::new(pixmap)),
            width,
            height,
        })
    }

    /// Color of one pixel, un-premultiplied.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let pixmap = self.pixmap.lock();
        let color = pixmap.pixel(x, y)?.demultiply();
        Some(Rgba::new(
            color.red(),
            color.green(),
            color.blue(),
            color.alpha(),
        ))
    }

    /// Write the current frame as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), CanvasError> {
        self.pixmap
            .lock()
            .save_png(path)
            .map_err(|e| CanvasError::Encode(e.to_string()))
    }

    /// Encode the current frame as PNG bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>, CanvasError> {
        self.pixmap
            .lock()
            .encode_png()
            .map_err(|e| CanvasError::Encode(e.to_string()))
    }

    fn fill_path(&self, path: Option<tiny_skia::Path>, color: Rgba) {
        if let Some(path) = path {
            self.pixmap.lock().fill_path(
                &path,
                &paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn stroke_path(&self, path: Option<tiny_skia::Path>, color: Rgba, width: f32) {
        if let Some(path) = path {
            let stroke = Stroke {
                width,
                ..Stroke::default()
            };
            self.pixmap.lock().stroke_path(
                &path,
                &paint(color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }
}

impl Canvas for PixmapCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Rgba) {
        self.pixmap
            .lock()
            .fill(Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgba) {
        if let Some(rect) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
            self.pixmap
                .lock()
                .fill_rect(rect, &paint(color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, rect: ScreenRect, color: Rgba, width: f32) {
        let path = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height).map(PathBuilder::from_rect);
        self.stroke_path(path, color, width);
    }

    fn fill_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba) {
        self.fill_path(PathBuilder::from_circle(center.x, center.y, radius), color);
    }

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba, width: f32) {
        self.stroke_path(PathBuilder::from_circle(center.x, center.y, radius), color, width);
    }

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, color: Rgba, width: f32) {
        let mut builder = PathBuilder::new();
        builder.move_to(from.x, from.y);
        builder.line_to(to.x, to.y);
        self.stroke_path(builder.finish(), color, width);
    }

    // No text shaping in tiny-skia: a label is a bar as wide as its text.
    fn label(&mut self, at: ScreenPoint, text: &str, color: Rgba) {
        let width = text.chars().count() as f32 * LABEL_CHAR_WIDTH;
        self.fill_rect(ScreenRect::new(at.x, at.y, width, LABEL_HEIGHT), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(
            PixmapCanvas::new(0, 10),
            Err(CanvasError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_later_draw_covers_earlier() {
        let mut canvas = PixmapCanvas::new(20, 20).unwrap();
        canvas.clear(Rgba::BLACK);
        canvas.fill_rect(ScreenRect::new(0.0, 0.0, 20.0, 20.0), Rgba::rgb(255, 0, 0));
        canvas.fill_rect(ScreenRect::new(5.0, 5.0, 10.0, 10.0), Rgba::rgb(0, 0, 255));

        assert_eq!(canvas.pixel(1, 1), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(canvas.pixel(10, 10), Some(Rgba::rgb(0, 0, 255)));
        assert_eq!(canvas.pixel(25, 25), None);
    }

    #[test]
    fn test_clones_share_pixels() {
        let canvas = PixmapCanvas::new(4, 4).unwrap();
        let mut writer = canvas.clone();
        writer.clear(Rgba::WHITE);
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::WHITE));
    }

    #[test]
    fn test_circle_fills_center() {
        let mut canvas = PixmapCanvas::new(30, 30).unwrap();
        canvas.fill_circle(ScreenPoint::new(15.0, 15.0), 6.0, Rgba::rgb(0, 255, 0));
        assert_eq!(canvas.pixel(15, 15), Some(Rgba::rgb(0, 255, 0)));
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_png_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut canvas = PixmapCanvas::new(8, 8).unwrap();
        canvas.clear(Rgba::rgb(10, 20, 30));
        canvas.save_png(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
        assert!(canvas.encode_png().unwrap().starts_with(b"\x89PNG"));
    }
}
