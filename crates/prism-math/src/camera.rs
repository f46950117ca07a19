// SPDX-License-Identifier: CEPL-1.0
use crate::input::InputState;
use glam::{Mat4, Vec3};

/// Units per second at speed scalar 1.0.
pub const MOVE_RATE: f32 = 20.0;
/// Pitch is kept just short of straight up/down so `look_at` stays defined.
pub const PITCH_LIMIT: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    /// Radians around +Y.
    pub yaw: f32,
    /// Radians above the horizon.
    pub pitch: f32,
    pub world_up: Vec3,
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -6.0, -15.0), 0.0, 0.0)
    }
}

impl CameraState {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
            world_up: Vec3::Y,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(cp * sy, sp, cp * cy)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.world_up).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.world_up)
    }
}

/// Advances the camera by one frame.
///
/// Mouse look is applied first so movement follows the updated heading.
pub fn integrate(prev: CameraState, input: &InputState, dt: f32) -> CameraState {
    let mut next = prev;
    if input.mouse_look {
        next.yaw -= input.mouse_delta.x * dt;
        next.pitch = (next.pitch - input.mouse_delta.y * dt).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    let axes = input.axes();
    if axes != Vec3::ZERO {
        let dir = next.forward() * axes.z + next.right() * axes.x + next.up() * axes.y;
        next.position += dir * input.speed_scalar() * dt * MOVE_RATE;
    }
    next
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
