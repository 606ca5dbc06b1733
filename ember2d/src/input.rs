use winit::event::{ElementState, MouseButton};

use crate::math::Vec2;

/// Pointer position and primary button, sampled once per frame for UI hit-testing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub position: Vec2,
    pub primary_down: bool,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(position: Vec2, primary_down: bool) -> Self {
        Self {
            position,
            primary_down,
        }
    }

    /// Handle a mouse button input event from winit. Only the left button drives the UI.
    pub fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.primary_down = state == ElementState::Pressed;
        }
    }

    /// Handle mouse cursor movement from winit.
    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        self.position = Vec2::new(x as f32, y as f32);
    }

    /// True on the frame the primary button went down.
    pub fn pressed_since(&self, previous: &PointerState) -> bool {
        self.primary_down && !previous.primary_down
    }

    /// True on the frame the primary button went up.
    pub fn released_since(&self, previous: &PointerState) -> bool {
        !self.primary_down && previous.primary_down
    }
}
