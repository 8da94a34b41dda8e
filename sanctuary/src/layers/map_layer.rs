//! Map markers.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::geo::ScreenPoint;
use crate::map::{HeadlessMap, MapObjectManager};
use std::sync::Arc;

const Z_INDEX: i32 = 4;
const OUTLINE: Rgba = Rgba::WHITE;

/// Paints the markers of a [`HeadlessMap`] that fall within their kind's zoom
/// range and on screen.
///
/// When given the object manager it also runs throttled map invalidations
/// that became due since the last frame.
pub struct MapLayer {
    map: Arc<HeadlessMap>,
    objects: Option<Arc<MapObjectManager>>,
    drawn: usize,
    culled: usize,
}

impl std::fmt::Debug for MapLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapLayer")
            .field("drawn", &self.drawn)
            .field("culled", &self.culled)
            .finish_non_exhaustive()
    }
}

impl MapLayer {
    pub fn new(map: Arc<HeadlessMap>) -> Self {
        Self {
            map,
            objects: None,
            drawn: 0,
            culled: 0,
        }
    }

    pub fn with_objects(mut self, objects: Arc<MapObjectManager>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Markers painted in the last frame.
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Markers skipped in the last frame (zoom range or off screen).
    pub fn culled(&self) -> usize {
        self.culled
    }
}

impl Layer for MapLayer {
    fn name(&self) -> &str {
        "map"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        if let Some(objects) = &self.objects {
            objects.poll_invalidation();
        }

        let view = frame.viewport();
        let zoom = view.zoom.round().clamp(0.0, f64::from(u8::MAX)) as u8;
        self.drawn = 0;
        self.culled = 0;

        for marker in self.map.markers() {
            let radius = marker.icon.size / 2.0;
            let at = view.to_screen(marker.position);
            if !marker.icon.visible_at(zoom) || !view.is_on_screen(at, radius) {
                self.culled += 1;
                continue;
            }

            frame.canvas.fill_circle(at, radius, marker.icon.color);
            frame.canvas.stroke_circle(at, radius, OUTLINE, 2.0);
            if let Some(label) = &marker.icon.label {
                frame.canvas.label(
                    ScreenPoint::new(at.x - radius, at.y + radius + 4.0),
                    label,
                    OUTLINE,
                );
            }
            self.drawn += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::events::EventBus;
    use crate::geo::LatLng;
    use crate::map::{MapObjectConfig, ObjectKind, ObjectOptions};
    use crate::state::{GameState, GameStore};

    fn render_at_zoom(zoom: u8) -> (MapLayer, Vec<String>) {
        let map = Arc::new(HeadlessMap::new());
        let objects = Arc::new(MapObjectManager::new(
            MapObjectConfig::default(),
            map.clone(),
            Arc::new(EventBus::new()),
        ));
        let here = LatLng::new(61.5, 23.76);
        objects
            .create_object(ObjectKind::Hevy, here, ObjectOptions::named("Guardian"))
            .unwrap();
        objects
            .create_object(ObjectKind::Npc, here, ObjectOptions::named("Elder"))
            .unwrap();
        objects
            .create_object(ObjectKind::Quest, LatLng::new(-30.0, 100.0), ObjectOptions::default())
            .unwrap();

        let mut state = GameState::default();
        state.map.center = here;
        state.map.zoom = zoom;
        let store = GameStore::new(state);

        let mut canvas = RecordingCanvas::new(400, 400);
        let log = canvas.log();
        let mut layer = MapLayer::new(map).with_objects(objects);
        let mut frame = Frame {
            canvas: &mut canvas,
            store: &store,
            delta_ms: 16.0,
            frame_index: 0,
            now_ms: 0,
        };
        layer.render(&mut frame).unwrap();
        (layer, log.labels())
    }

    #[test]
    fn test_zoom_range_filters_markers() {
        let (layer, labels) = render_at_zoom(10);
        assert_eq!(labels, vec!["Guardian".to_string()]);
        assert_eq!(layer.drawn(), 1);
        assert_eq!(layer.culled(), 2);
    }

    #[test]
    fn test_close_zoom_draws_in_paint_order() {
        let (layer, labels) = render_at_zoom(18);
        // NPC (z 1600) before HEVY (z 2500). The quest is off screen.
        assert_eq!(labels, vec!["Elder".to_string(), "Guardian".to_string()]);
        assert_eq!(layer.culled(), 1);
    }
}
