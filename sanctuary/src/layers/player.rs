//! Player avatar.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::geo::ScreenPoint;

const Z_INDEX: i32 = 6;
const AVATAR_RADIUS: f32 = 20.0;
const AVATAR: Rgba = Rgba::rgb(0xff, 0x6b, 0x6b);
const AVATAR_FALLBACK: Rgba = Rgba::rgb(0x99, 0x99, 0x99);
const ACCURACY: Rgba = Rgba::rgb(0x3b, 0x82, 0xf6);

/// Draws the player at the store position with an accuracy ring.
///
/// A fallback position is drawn greyed out, since the player is not really
/// there.
#[derive(Debug, Default)]
pub struct PlayerLayer {
    last_drawn_at: Option<ScreenPoint>,
}

impl PlayerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the avatar was drawn last frame, if anywhere.
    pub fn last_drawn_at(&self) -> Option<ScreenPoint> {
        self.last_drawn_at
    }
}

impl Layer for PlayerLayer {
    fn name(&self) -> &str {
        "player"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        self.last_drawn_at = None;
        let Some(position) = frame.store.read(|s| s.player.position) else {
            return Ok(());
        };

        let view = frame.viewport();
        let at = view.to_screen(position.lat_lng());
        if !view.is_on_screen(at, AVATAR_RADIUS) {
            return Ok(());
        }

        if let Some(accuracy) = position.accuracy {
            let ring = view.meters_to_pixels(accuracy);
            if ring > AVATAR_RADIUS {
                frame.canvas.fill_circle(at, ring, ACCURACY.with_alpha(0x26));
                frame.canvas.stroke_circle(at, ring, ACCURACY.with_alpha(0x80), 1.0);
            }
        }

        let color = if position.is_fallback {
            AVATAR_FALLBACK
        } else {
            AVATAR
        };
        // Pulse between 0.9x and 1.1x of the radius.
        let pulse = 1.0 + 0.1 * ((frame.now_ms as f64 * 0.003).sin() as f32);
        frame
            .canvas
            .fill_circle(at, (AVATAR_RADIUS + 10.0) * pulse, color.with_alpha(0x40));
        frame.canvas.fill_circle(at, AVATAR_RADIUS, color);
        frame.canvas.stroke_circle(at, AVATAR_RADIUS, Rgba::WHITE, 3.0);

        self.last_drawn_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::geo::LatLng;
    use crate::gps::Position;
    use crate::state::{GameState, GameStore};

    fn render(position: Option<Position>) -> (PlayerLayer, Vec<DrawCommand>) {
        let mut state = GameState::default();
        state.map.center = LatLng::new(61.5, 23.76);
        state.map.zoom = 18;
        state.player.position = position;
        let store = GameStore::new(state);

        let mut canvas = RecordingCanvas::new(400, 300);
        let log = canvas.log();
        let mut layer = PlayerLayer::new();
        let mut frame = Frame {
            canvas: &mut canvas,
            store: &store,
            delta_ms: 16.0,
            frame_index: 0,
            now_ms: 0,
        };
        layer.render(&mut frame).unwrap();
        (layer, log.commands())
    }

    #[test]
    fn test_no_position_draws_nothing() {
        let (layer, commands) = render(None);
        assert!(commands.is_empty());
        assert_eq!(layer.last_drawn_at(), None);
    }

    #[test]
    fn test_avatar_at_center_with_accuracy_ring() {
        let position = Position {
            lat: 61.5,
            lng: 23.76,
            accuracy: Some(50.0),
            timestamp_ms: 0,
            is_fallback: false,
        };
        let (layer, commands) = render(Some(position));
        assert_eq!(layer.last_drawn_at(), Some(ScreenPoint::new(200.0, 150.0)));
        assert!(commands
            .iter()
            .any(|c| matches!(c, DrawCommand::FillCircle(_, r, color) if *r == AVATAR_RADIUS && *color == AVATAR)));
        // 50 m at zoom 18 near 61.5° N is roughly 175 px.
        assert!(matches!(commands[0], DrawCommand::FillCircle(_, r, _) if r > 150.0));
    }

    #[test]
    fn test_fallback_is_greyed() {
        let position = Position::fallback(LatLng::new(61.5, 23.76), 1000.0, 0);
        let (_, commands) = render(Some(position));
        assert!(commands
            .iter()
            .any(|c| matches!(c, DrawCommand::FillCircle(_, _, color) if *color == AVATAR_FALLBACK)));
    }
}
