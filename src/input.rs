//! Mouse state gathered from window events.
//!
//! Held buttons and the cursor position are continuous state: they are updated
//! as events arrive and read once per frame by the frame driver. The left button
//! attracts particles, the right button repulses them.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};

use crate::params::SimulationParams;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

impl MouseButton {
    fn from_winit(button: WinitMouseButton) -> Option<Self> {
        match button {
            WinitMouseButton::Left => Some(MouseButton::Left),
            WinitMouseButton::Right => Some(MouseButton::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MouseState {
    held: HashSet<MouseButton>,
    /// Cursor position in window pixels, top-left origin.
    position: Vec2,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a mouse button is currently held down.
    pub fn held(&self, button: MouseButton) -> bool {
        self.held.contains(&button)
    }

    /// Cursor position with the origin at the bottom-left, as the simulation uses.
    pub fn to_simulation_space(&self, window_height: f32) -> Vec2 {
        Vec2::new(self.position.x, window_height - self.position.y)
    }

    /// Fill in attractor and repulsor from the held buttons.
    ///
    /// With both buttons held the particles are attracted only.
    pub fn apply(&self, params: &mut SimulationParams) {
        let target = self.to_simulation_space(params.screen_size.y);
        let attract = self.held(MouseButton::Left);
        let repulse = self.held(MouseButton::Right) && !attract;
        params.attractor = attract.then_some(target);
        params.repulsor = repulse.then_some(target);
    }

    /// Release every button, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(*button) {
                    self.set_button(button, *state);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.position = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::Focused(false) | WindowEvent::CursorLeft { .. } => self.release_all(),
            _ => {}
        }
    }

    fn set_button(&mut self, button: MouseButton, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.held.insert(button);
            }
            ElementState::Released => {
                self.held.remove(&button);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_held_until_released() {
        let mut mouse = MouseState::new();
        assert!(!mouse.held(MouseButton::Left));

        mouse.set_button(MouseButton::Left, ElementState::Pressed);
        mouse.set_button(MouseButton::Right, ElementState::Pressed);
        assert!(mouse.held(MouseButton::Left));
        assert!(mouse.held(MouseButton::Right));

        mouse.set_button(MouseButton::Left, ElementState::Released);
        assert!(!mouse.held(MouseButton::Left));
        assert!(mouse.held(MouseButton::Right));

        mouse.release_all();
        assert!(!mouse.held(MouseButton::Right));
    }

    #[test]
    fn test_flip_to_bottom_left() {
        let mut mouse = MouseState::new();
        mouse.position = Vec2::new(100.0, 68.0);
        assert_eq!(mouse.to_simulation_space(768.0), Vec2::new(100.0, 700.0));
    }

    #[test]
    fn test_apply_sets_targets_from_buttons() {
        let mut mouse = MouseState::new();
        mouse.position = Vec2::new(10.0, 20.0);
        let mut params = SimulationParams::new(0.016, Vec2::new(800.0, 600.0));

        mouse.apply(&mut params);
        assert_eq!(params.attractor, None);
        assert_eq!(params.repulsor, None);

        mouse.set_button(MouseButton::Left, ElementState::Pressed);
        mouse.apply(&mut params);
        assert_eq!(params.attractor, Some(Vec2::new(10.0, 580.0)));
        assert_eq!(params.repulsor, None);

        mouse.set_button(MouseButton::Left, ElementState::Released);
        mouse.set_button(MouseButton::Right, ElementState::Pressed);
        mouse.apply(&mut params);
        assert_eq!(params.attractor, None);
        assert_eq!(params.repulsor, Some(Vec2::new(10.0, 580.0)));
    }

    #[test]
    fn test_attraction_wins_when_both_buttons_held() {
        let mut mouse = MouseState::new();
        mouse.position = Vec2::new(10.0, 20.0);
        let mut params = SimulationParams::new(0.016, Vec2::new(800.0, 600.0));

        mouse.set_button(MouseButton::Right, ElementState::Pressed);
        mouse.set_button(MouseButton::Left, ElementState::Pressed);
        mouse.apply(&mut params);
        assert_eq!(params.attractor, Some(Vec2::new(10.0, 580.0)));
        assert_eq!(params.repulsor, None);
    }
}
