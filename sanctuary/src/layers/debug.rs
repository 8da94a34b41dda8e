//! Performance overlay, hidden until shown through `layer:show:request`.

use super::{Frame, Layer, LayerContext, LayerError};
use crate::canvas::Rgba;
use crate::events::EventBus;
use crate::geo::{ScreenPoint, ScreenRect};
use std::sync::Arc;

const Z_INDEX: i32 = 100;
const PANEL: Rgba = Rgba::new(0, 0, 0, 0xb3);
const TEXT: Rgba = Rgba::rgb(0x00, 0xff, 0x00);
const LINE_HEIGHT: f32 = 16.0;

#[derive(Debug, Default)]
pub struct DebugLayer {
    bus: Option<Arc<EventBus>>,
}

impl DebugLayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(&self, frame: &Frame<'_>) -> Vec<String> {
        let (performance, zoom) = frame
            .store
            .read(|s| (s.system.performance.clone(), s.map.zoom));
        let mut lines = vec![
            format!("FPS: {:.1}", performance.fps),
            format!("Render: {:.2} ms", performance.render_time_ms),
            format!("Frames: {}", performance.frame_count),
            format!("Zoom: {zoom}"),
        ];
        if let Some(bus) = &self.bus {
            let stats = bus.stats();
            lines.push(format!(
                "Bus: {} listeners / {} topics",
                stats.listener_count, stats.topic_count
            ));
            lines.push(format!(
                "Events: {} emitted, {} listener panics",
                stats.emitted, stats.listener_panics
            ));
        }
        lines
    }
}

impl Layer for DebugLayer {
    fn name(&self) -> &str {
        "debug"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn visible_by_default(&self) -> bool {
        false
    }

    fn init(&mut self, ctx: &LayerContext) -> Result<(), LayerError> {
        self.bus = Some(ctx.bus.clone());
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let lines = self.lines(frame);
        let height = 10.0 + lines.len() as f32 * LINE_HEIGHT;
        let x = frame.canvas.width() as f32 - 230.0;
        frame
            .canvas
            .fill_rect(ScreenRect::new(x, 70.0, 220.0, height), PANEL);
        for (i, line) in lines.iter().enumerate() {
            let at = ScreenPoint::new(x + 8.0, 78.0 + i as f32 * LINE_HEIGHT);
            frame.canvas.label(at, line, TEXT);
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.bus = None;
    }
}
