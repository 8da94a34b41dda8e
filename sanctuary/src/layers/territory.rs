//! Base territories.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::geo::ScreenPoint;

const Z_INDEX: i32 = 2;
const TERRITORY: Rgba = Rgba::rgb(0x4a, 0xde, 0x80);
const CURRENT: Rgba = Rgba::rgb(0xff, 0x00, 0x00);

/// Smallest radius drawn, so far-zoomed territories stay visible.
const MIN_RADIUS_PX: f32 = 2.0;

/// Draws each base in the store as a circle scaled to its territory radius.
#[derive(Debug, Default)]
pub struct TerritoryLayer {
    drawn: usize,
}

impl TerritoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Territories drawn in the last frame.
    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl Layer for TerritoryLayer {
    fn name(&self) -> &str {
        "territory"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let view = frame.viewport();
        let (bases, current) = frame
            .store
            .read(|s| (s.bases.clone(), s.current_base.clone()));

        self.drawn = 0;
        for base in &bases {
            let center = view.to_screen(base.position);
            let radius = view.meters_to_pixels(base.radius_m).max(MIN_RADIUS_PX);
            if !view.is_on_screen(center, radius) {
                continue;
            }

            let color = if current.as_deref() == Some(base.id.as_str()) {
                CURRENT
            } else {
                TERRITORY
            };
            frame.canvas.fill_circle(center, radius, color.with_alpha(0x33));
            frame.canvas.stroke_circle(center, radius, color, 2.0);
            frame.canvas.label(
                ScreenPoint::new(center.x - radius, center.y - radius - 12.0),
                &base.name,
                color,
            );
            self.drawn += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::geo::LatLng;
    use crate::state::{BaseSite, GameState, GameStore};

    fn store_with_bases() -> GameStore {
        let mut state = GameState::default();
        state.map.center = LatLng::new(61.5, 23.76);
        state.map.zoom = 16;
        state.bases = vec![
            BaseSite {
                id: "home".to_string(),
                name: "Home".to_string(),
                position: LatLng::new(61.5, 23.76),
                radius_m: 100.0,
            },
            BaseSite {
                id: "far".to_string(),
                name: "Far".to_string(),
                position: LatLng::new(10.0, 10.0),
                radius_m: 100.0,
            },
        ];
        state.current_base = Some("home".to_string());
        GameStore::new(state)
    }

    #[test]
    fn test_only_on_screen_bases_are_drawn() {
        let store = store_with_bases();
        let mut canvas = RecordingCanvas::new(400, 400);
        let log = canvas.log();
        let mut layer = TerritoryLayer::new();
        let mut frame = Frame {
            canvas: &mut canvas,
            store: &store,
            delta_ms: 16.0,
            frame_index: 0,
            now_ms: 0,
        };
        layer.render(&mut frame).unwrap();

        assert_eq!(layer.drawn(), 1);
        assert_eq!(log.labels(), vec!["Home".to_string()]);
        match &log.commands()[1] {
            DrawCommand::StrokeCircle(center, _, color, _) => {
                assert_eq!(*center, ScreenPoint::new(200.0, 200.0));
                assert_eq!(*color, CURRENT);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
