use std::collections::HashMap;

use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent};

use super::types::{PointerEvent, PointerId};

/// Translates winit window events into `PointerEvent`s.
///
/// winit reports absolute positions only, so the translator remembers the last
/// position of every pointer and synthesizes the per-event delta a browser
/// would report as `movementX/Y`. Coordinates are converted to logical units.
#[derive(Debug, Default)]
pub struct PointerTranslator {
    last: HashMap<PointerId, (f32, f32)>,
}

impl PointerTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` for events that carry no pointer information.
    pub fn translate(&mut self, scale_factor: f64, event: &WindowEvent) -> Option<PointerEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = to_logical(scale_factor, *position);
                Some(self.moved(PointerId::Mouse, x, y))
            }

            WindowEvent::MouseInput { state, button, .. } => self.mouse_button(*state, *button),

            WindowEvent::CursorLeft { .. } => Some(self.left(PointerId::Mouse)),

            WindowEvent::Touch(Touch { phase, location, id, .. }) => {
                let (x, y) = to_logical(scale_factor, *location);
                Some(self.touch(*phase, *id, x, y))
            }

            _ => None,
        }
    }

    pub(crate) fn moved(&mut self, id: PointerId, x: f32, y: f32) -> PointerEvent {
        let (dx, dy) = match self.last.insert(id, (x, y)) {
            Some((px, py)) => (x - px, y - py),
            None => (0.0, 0.0),
        };
        PointerEvent::Move { id, x, y, dx, dy }
    }

    /// Only the primary (left) button acts as a press.
    pub(crate) fn mouse_button(
        &mut self,
        state: ElementState,
        button: MouseButton,
    ) -> Option<PointerEvent> {
        if button != MouseButton::Left {
            return None;
        }
        let id = PointerId::Mouse;
        match state {
            ElementState::Pressed => {
                // A press before any cursor motion lands at the origin.
                let (x, y) = self.last.get(&id).copied().unwrap_or((0.0, 0.0));
                Some(PointerEvent::Down { id, x, y })
            }
            ElementState::Released => Some(PointerEvent::Up { id }),
        }
    }

    pub(crate) fn left(&mut self, id: PointerId) -> PointerEvent {
        self.last.remove(&id);
        PointerEvent::Leave { id }
    }

    pub(crate) fn touch(
        &mut self,
        phase: TouchPhase,
        touch_id: u64,
        x: f32,
        y: f32,
    ) -> PointerEvent {
        let id = PointerId::Touch(touch_id);
        match phase {
            TouchPhase::Started => {
                self.last.insert(id, (x, y));
                PointerEvent::Down { id, x, y }
            }
            TouchPhase::Moved => self.moved(id, x, y),
            TouchPhase::Ended => {
                self.last.remove(&id);
                PointerEvent::Up { id }
            }
            TouchPhase::Cancelled => self.left(id),
        }
    }
}

fn to_logical(scale_factor: f64, pos: PhysicalPosition<f64>) -> (f32, f32) {
    let logical = pos.to_logical::<f64>(scale_factor);
    (logical.x as f32, logical.y as f32)
}
