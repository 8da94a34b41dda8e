//! Pointer input, gestures and UI-element hit testing.
//!
//! The host feeds raw pointer input through an [`InputHandle`]. Mouse and
//! touch input go through the same state machine and produce the same event
//! shapes:
//!
//! ```text
//! Down ──► Move (≤ threshold) ──► Up      ui:element:click?, interaction:tap
//!   │
//!   └──► Move (> threshold) ──► drag:start, drag:move ... ──► Up   drag:end
//!                                                      └──► Cancel drag:end
//! ```
//!
//! Hit testing picks the highest `z` among visible elements containing the
//! point. Ties go to the element registered last.

use super::{Frame, Layer, LayerError};
use crate::canvas::Rgba;
use crate::events::{DragEvent, Event, EventBus};
use crate::geo::{ScreenPoint, ScreenRect};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

const Z_INDEX: i32 = 5;

/// Default movement in pixels before a press becomes a drag.
pub const DEFAULT_DRAG_THRESHOLD_PX: f32 = 10.0;

pub const GPS_BUTTON: &str = "gps-button";
pub const MENU_BUTTON: &str = "menu-button";

const FEEDBACK: Rgba = Rgba::rgb(0x00, 0xff, 0x00);
const BUTTON: Rgba = Rgba::rgb(0x66, 0x66, 0x66);
const BUTTON_PRESSED: Rgba = Rgba::rgb(0x44, 0x44, 0x44);
const BORDER: Rgba = Rgba::rgb(0x99, 0x99, 0x99);
const BORDER_HOVER: Rgba = Rgba::WHITE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerModality {
    Mouse,
    Touch,
}

/// One raw pointer sample in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
    pub modality: PointerModality,
}

impl PointerInput {
    pub fn mouse(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            x,
            y,
            modality: PointerModality::Mouse,
        }
    }

    pub fn touch(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            x,
            y,
            modality: PointerModality::Touch,
        }
    }

    fn point(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionConfig {
    pub drag_threshold_px: f32,
    /// Canvas width, used to anchor right-aligned default elements.
    pub canvas_width: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            canvas_width: 800.0,
        }
    }
}

/// A clickable rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct UiElement {
    pub id: String,
    pub rect: ScreenRect,
    pub z: i32,
    pub visible: bool,
    pub label: String,
}

impl UiElement {
    pub fn new(id: impl Into<String>, rect: ScreenRect, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rect,
            z: 0,
            visible: true,
            label: label.into(),
        }
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    origin: ScreenPoint,
    current: ScreenPoint,
    dragging: bool,
}

#[derive(Debug, Default)]
struct InteractionState {
    /// Registration order is paint order within equal `z`.
    elements: Vec<UiElement>,
    hovered: Option<String>,
    pressed: Option<String>,
    gesture: Option<Gesture>,
}

impl InteractionState {
    fn element_at(&self, point: ScreenPoint) -> Option<&UiElement> {
        // max_by_key keeps the last maximum, which is the latest registration.
        self.elements
            .iter()
            .filter(|e| e.visible && e.rect.contains(point))
            .max_by_key(|e| e.z)
    }

    fn update_hover(&mut self, point: Option<ScreenPoint>, out: &mut Vec<Event>) {
        let now = point.and_then(|p| self.element_at(p).map(|e| e.id.clone()));
        if now != self.hovered {
            if let Some(element) = self.hovered.take() {
                out.push(Event::UiElementLeave { element });
            }
            if let Some(element) = &now {
                out.push(Event::UiElementEnter {
                    element: element.clone(),
                });
            }
            self.hovered = now;
        }
    }
}

fn sub(a: ScreenPoint, b: ScreenPoint) -> ScreenPoint {
    ScreenPoint::new(a.x - b.x, a.y - b.y)
}

/// Cloneable entry point for host input. Emits on the bus after the
/// interaction state lock is released.
#[derive(Clone)]
pub struct InputHandle {
    state: Arc<Mutex<InteractionState>>,
    bus: Arc<EventBus>,
    drag_threshold_px: f32,
}

impl fmt::Debug for InputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputHandle")
            .field("drag_threshold_px", &self.drag_threshold_px)
            .finish_non_exhaustive()
    }
}

impl InputHandle {
    /// Feed one pointer sample.
    pub fn dispatch(&self, input: PointerInput) {
        let events = self.process(input);
        for event in events {
            self.bus.emit(event);
        }
    }

    fn process(&self, input: PointerInput) -> Vec<Event> {
        let point = input.point();
        let mut out = Vec::new();
        let mut state = self.state.lock();

        match input.phase {
            PointerPhase::Down => {
                state.gesture = Some(Gesture {
                    origin: point,
                    current: point,
                    dragging: false,
                });
                state.pressed = state.element_at(point).map(|e| e.id.clone());
                state.update_hover(Some(point), &mut out);
            }
            PointerPhase::Move => {
                if let Some(mut gesture) = state.gesture {
                    if !gesture.dragging
                        && point.distance_to(gesture.origin) > self.drag_threshold_px
                    {
                        gesture.dragging = true;
                        state.pressed = None;
                        out.push(Event::InteractionDragStart(DragEvent {
                            origin: gesture.origin,
                            current: point,
                            delta: sub(point, gesture.origin),
                        }));
                    }
                    if gesture.dragging {
                        out.push(Event::InteractionDragMove(DragEvent {
                            origin: gesture.origin,
                            current: point,
                            delta: sub(point, gesture.current),
                        }));
                    }
                    gesture.current = point;
                    state.gesture = Some(gesture);
                }
                state.update_hover(Some(point), &mut out);
            }
            PointerPhase::Up => {
                if let Some(gesture) = state.gesture.take() {
                    if gesture.dragging {
                        out.push(Event::InteractionDragEnd(DragEvent {
                            origin: gesture.origin,
                            current: point,
                            delta: sub(point, gesture.current),
                        }));
                    } else {
                        if let Some(element) = state.element_at(point) {
                            out.push(Event::UiElementClick {
                                element: element.id.clone(),
                                point,
                            });
                        }
                        out.push(Event::InteractionTap(point));
                    }
                } else {
                    tracing::trace!(x = point.x, y = point.y, "Pointer up without down");
                }
                state.pressed = None;
                // A lifted finger no longer hovers anything.
                let hover_at = match input.modality {
                    PointerModality::Mouse => Some(point),
                    PointerModality::Touch => None,
                };
                state.update_hover(hover_at, &mut out);
            }
            PointerPhase::Cancel => {
                if let Some(gesture) = state.gesture.take() {
                    if gesture.dragging {
                        out.push(Event::InteractionDragEnd(DragEvent {
                            origin: gesture.origin,
                            current: gesture.current,
                            delta: ScreenPoint::default(),
                        }));
                    }
                }
                state.pressed = None;
                state.update_hover(None, &mut out);
            }
        }
        out
    }

    /// Register an element. An existing element with the same id is replaced
    /// and moves to the top of its `z`.
    pub fn add_element(&self, element: UiElement) {
        let mut state = self.state.lock();
        state.elements.retain(|e| e.id != element.id);
        tracing::debug!(element = %element.id, "UI element added");
        state.elements.push(element);
    }

    pub fn remove_element(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.elements.len();
        state.elements.retain(|e| e.id != id);
        if state.hovered.as_deref() == Some(id) {
            state.hovered = None;
        }
        state.elements.len() != before
    }

    pub fn set_element_visible(&self, id: &str, visible: bool) -> bool {
        let mut state = self.state.lock();
        match state.elements.iter_mut().find(|e| e.id == id) {
            Some(element) => {
                element.visible = visible;
                true
            }
            None => {
                tracing::warn!(element = id, "Unknown UI element");
                false
            }
        }
    }

    pub fn set_element_label(&self, id: &str, label: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        match state.elements.iter_mut().find(|e| e.id == id) {
            Some(element) => {
                element.label = label.into();
                true
            }
            None => false,
        }
    }

    /// Id of the element that would receive a click at `point`.
    pub fn element_at(&self, point: ScreenPoint) -> Option<String> {
        self.state.lock().element_at(point).map(|e| e.id.clone())
    }

    pub fn elements(&self) -> Vec<UiElement> {
        self.state.lock().elements.clone()
    }

    pub fn hovered(&self) -> Option<String> {
        self.state.lock().hovered.clone()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.lock().gesture.is_some_and(|g| g.dragging)
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        *state = InteractionState::default();
    }
}

/// Draws UI elements and touch feedback. Input arrives through its
/// [`InputHandle`].
#[derive(Debug)]
pub struct InteractionLayer {
    input: InputHandle,
}

impl InteractionLayer {
    /// A layer with the default `gps-button` and `menu-button` registered.
    pub fn new(bus: Arc<EventBus>, config: InteractionConfig) -> Self {
        let input = InputHandle {
            state: Arc::default(),
            bus,
            drag_threshold_px: config.drag_threshold_px,
        };
        input.add_element(UiElement::new(
            GPS_BUTTON,
            ScreenRect::new(20.0, 20.0, 120.0, 40.0),
            "Allow GPS",
        ));
        input.add_element(UiElement::new(
            MENU_BUTTON,
            ScreenRect::new(config.canvas_width - 60.0, 20.0, 40.0, 40.0),
            "☰",
        ));
        Self { input }
    }

    pub fn handle(&self) -> InputHandle {
        self.input.clone()
    }
}

impl Layer for InteractionLayer {
    fn name(&self) -> &str {
        "interaction"
    }

    fn z_index(&self) -> i32 {
        Z_INDEX
    }

    fn render(&mut self, frame: &mut Frame<'_>) -> Result<(), LayerError> {
        let (mut elements, hovered, pressed, gesture) = {
            let state = self.input.state.lock();
            (
                state.elements.clone(),
                state.hovered.clone(),
                state.pressed.clone(),
                state.gesture,
            )
        };
        // Stable sort keeps registration order within a z.
        elements.sort_by_key(|e| e.z);

        for element in elements.iter().filter(|e| e.visible) {
            let is_pressed = pressed.as_deref() == Some(element.id.as_str());
            let is_hovered = hovered.as_deref() == Some(element.id.as_str());
            frame.canvas.fill_rect(
                element.rect,
                if is_pressed { BUTTON_PRESSED } else { BUTTON },
            );
            frame.canvas.stroke_rect(
                element.rect,
                if is_hovered { BORDER_HOVER } else { BORDER },
                2.0,
            );
            frame.canvas.label(
                ScreenPoint::new(element.rect.x + 8.0, element.rect.y + element.rect.height / 2.0),
                &element.label,
                Rgba::WHITE,
            );
        }

        if let Some(gesture) = gesture {
            frame
                .canvas
                .stroke_circle(gesture.origin, 15.0, FEEDBACK.with_alpha(128), 3.0);
            frame
                .canvas
                .fill_circle(gesture.current, 10.0, FEEDBACK.with_alpha(77));
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.input.reset();
    }
}
