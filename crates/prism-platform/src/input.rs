// SPDX-License-Identifier: CEPL-1.0
use prism_math::glam::Vec2;
use prism_math::{InputState, MoveKeys};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Shading selector keys, mapped to a technique by the app.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadingKey {
    NormalDirection,
    ViewDirection,
    LightDirection,
    BlinnPhong,
    Pbr,
}

/// Discrete commands triggered by a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    SetLightCount(u32),
    ToggleLightOrbit,
    Shading(ShadingKey),
}

fn move_key(code: KeyCode) -> Option<MoveKeys> {
    Some(match code {
        KeyCode::KeyW => MoveKeys::FORWARD,
        KeyCode::KeyS => MoveKeys::BACK,
        KeyCode::KeyA => MoveKeys::LEFT,
        KeyCode::KeyD => MoveKeys::RIGHT,
        KeyCode::KeyQ => MoveKeys::UP,
        KeyCode::KeyE => MoveKeys::DOWN,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => MoveKeys::FAST,
        KeyCode::ControlLeft | KeyCode::ControlRight => MoveKeys::SLOW,
        _ => return None,
    })
}

fn key_action(code: KeyCode) -> Option<Action> {
    Some(match code {
        KeyCode::Escape => Action::Quit,
        KeyCode::Digit0 => Action::SetLightCount(0),
        KeyCode::Digit1 => Action::SetLightCount(1),
        KeyCode::Digit2 => Action::SetLightCount(2),
        KeyCode::Digit3 => Action::SetLightCount(3),
        KeyCode::Digit4 => Action::SetLightCount(4),
        KeyCode::Space => Action::ToggleLightOrbit,
        KeyCode::KeyN => Action::Shading(ShadingKey::NormalDirection),
        KeyCode::KeyV => Action::Shading(ShadingKey::ViewDirection),
        KeyCode::KeyL => Action::Shading(ShadingKey::LightDirection),
        KeyCode::KeyB => Action::Shading(ShadingKey::BlinnPhong),
        KeyCode::KeyP => Action::Shading(ShadingKey::Pbr),
        _ => return None,
    })
}

/// Folds window events into an [`InputState`] for the next frame.
#[derive(Debug, Default)]
pub struct InputTracker {
    state: InputState,
    last_cursor: Option<Vec2>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Hands out this frame's input and clears the mouse accumulator.
    pub fn take_frame(&mut self) -> InputState {
        let out = self.state;
        self.state.end_frame();
        out
    }

    pub fn handle(&mut self, event: &WindowEvent) -> Option<Action> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) => {
                    self.key(code, event.state == ElementState::Pressed, event.repeat)
                }
                PhysicalKey::Unidentified(_) => None,
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor(position.x as f32, position.y as f32);
                None
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.mouse_button(*button, *state == ElementState::Pressed);
                None
            }
            WindowEvent::Focused(false) => {
                self.state.keys = MoveKeys::empty();
                None
            }
            _ => None,
        }
    }

    pub fn key(&mut self, code: KeyCode, pressed: bool, repeat: bool) -> Option<Action> {
        if let Some(k) = move_key(code) {
            self.state.keys.set(k, pressed);
            return None;
        }
        if pressed && !repeat {
            key_action(code)
        } else {
            None
        }
    }

    pub fn cursor(&mut self, x: f32, y: f32) {
        let pos = Vec2::new(x, y);
        if self.state.mouse_look {
            if let Some(last) = self.last_cursor {
                // window y grows downward, camera pitch grows upward
                self.state.mouse_delta += Vec2::new(pos.x - last.x, last.y - pos.y);
            }
        }
        self.last_cursor = Some(pos);
    }

    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if button == MouseButton::Right && pressed {
            self.state.mouse_look = !self.state.mouse_look;
            self.last_cursor = None;
            tracing::debug!("mouse look = {}", self.state.mouse_look);
        }
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
