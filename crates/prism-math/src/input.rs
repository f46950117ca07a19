// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::Vec2;

bitflags! {
    /// Movement keys currently held down.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MoveKeys: u8 {
        const FORWARD = 1 << 0;
        const BACK    = 1 << 1;
        const LEFT    = 1 << 2;
        const RIGHT   = 1 << 3;
        const UP      = 1 << 4;
        const DOWN    = 1 << 5;
        const FAST    = 1 << 6;
        const SLOW    = 1 << 7;
    }
}

/// Speed multiplier with no modifier held.
pub const BASE_SPEED: f32 = 0.5;
pub const FAST_SPEED: f32 = 2.0;
pub const SLOW_SPEED: f32 = 0.05;

/// Input gathered since the previous frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputState {
    pub keys: MoveKeys,
    /// Cursor movement in pixels, +y up.
    pub mouse_delta: Vec2,
    pub mouse_look: bool,
}

impl InputState {
    /// Per-axis direction in camera space: x right, y up, z forward.
    ///
    /// When both keys of an axis are held the first one wins (forward, left, up).
    pub fn axes(&self) -> glam::Vec3 {
        let k = self.keys;
        let z = if k.contains(MoveKeys::FORWARD) {
            1.0
        } else if k.contains(MoveKeys::BACK) {
            -1.0
        } else {
            0.0
        };
        let x = if k.contains(MoveKeys::LEFT) {
            -1.0
        } else if k.contains(MoveKeys::RIGHT) {
            1.0
        } else {
            0.0
        };
        let y = if k.contains(MoveKeys::UP) {
            1.0
        } else if k.contains(MoveKeys::DOWN) {
            -1.0
        } else {
            0.0
        };
        glam::Vec3::new(x, y, z)
    }

    pub fn speed_scalar(&self) -> f32 {
        if self.keys.contains(MoveKeys::FAST) {
            FAST_SPEED
        } else if self.keys.contains(MoveKeys::SLOW) {
            SLOW_SPEED
        } else {
            BASE_SPEED
        }
    }

    /// Clears the per-frame accumulators, keeping held keys and toggles.
    pub fn end_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }
}
