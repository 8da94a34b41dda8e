//! Canvas that records draw calls instead of rasterizing them.

use super::{Canvas, Rgba};
use crate::geo::{ScreenPoint, ScreenRect};
use parking_lot::Mutex;
use std::sync::Arc;

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba),
    FillRect(ScreenRect, Rgba),
    StrokeRect(ScreenRect, Rgba, f32),
    FillCircle(ScreenPoint, f32, Rgba),
    StrokeCircle(ScreenPoint, f32, Rgba, f32),
    Line(ScreenPoint, ScreenPoint, Rgba, f32),
    Label(ScreenPoint, String, Rgba),
}

/// Shared handle to the recorded commands.
#[derive(Debug, Clone, Default)]
pub struct DrawLog {
    commands: Arc<Mutex<Vec<DrawCommand>>>,
}

impl DrawLog {
    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<DrawCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Text of every label drawn, in order.
    pub fn labels(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Label(_, text, _) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, command: DrawCommand) {
        self.commands.lock().push(command);
    }
}

/// Canvas for tests and headless inspection.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    log: DrawLog,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            log: DrawLog::default(),
        }
    }

    /// Handle that stays valid after the canvas is boxed and moved.
    pub fn log(&self) -> DrawLog {
        self.log.clone()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Rgba) {
        self.log.push(DrawCommand::Clear(color));
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgba) {
        self.log.push(DrawCommand::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: ScreenRect, color: Rgba, width: f32) {
        self.log.push(DrawCommand::StrokeRect(rect, color, width));
    }

    fn fill_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba) {
        self.log.push(DrawCommand::FillCircle(center, radius, color));
    }

    fn stroke_circle(&mut self, center: ScreenPoint, radius: f32, color: Rgba, width: f32) {
        self.log
            .push(DrawCommand::StrokeCircle(center, radius, color, width));
    }

    fn line(&mut self, from: ScreenPoint, to: ScreenPoint, color: Rgba, width: f32) {
        self.log.push(DrawCommand::Line(from, to, color, width));
    }

    fn label(&mut self, at: ScreenPoint, text: &str, color: Rgba) {
        self.log.push(DrawCommand::Label(at, text.to_string(), color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_survives_boxing() {
        let canvas = RecordingCanvas::new(100, 50);
        let log = canvas.log();
        let mut boxed: Box<dyn Canvas> = Box::new(canvas);

        boxed.clear(Rgba::BLACK);
        boxed.label(ScreenPoint::new(1.0, 2.0), "GPS Ready", Rgba::WHITE);

        assert_eq!(log.len(), 2);
        assert_eq!(log.labels(), vec!["GPS Ready".to_string()]);
        assert_eq!(boxed.bounds(), ScreenRect::new(0.0, 0.0, 100.0, 50.0));

        assert_eq!(log.take().len(), 2);
        assert!(log.is_empty());
    }
}
