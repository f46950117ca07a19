// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Vec4};

pub const MAX_LIGHTS: usize = 4;
/// Orbit speed of moveable lights, degrees per second about +Y.
pub const ORBIT_DEGREES_PER_SECOND: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec4,
    pub colour: Vec4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRig {
    pub lights: [Light; MAX_LIGHTS],
    /// How many lights the shaders evaluate, 0..=4.
    pub active: u32,
    pub moveable: bool,
}

impl Default for LightRig {
    fn default() -> Self {
        let light = |x, y, z, r, g, b| Light {
            position: Vec4::new(x, y, z, 1.0),
            colour: Vec4::new(r, g, b, 1.0),
        };
        Self {
            lights: [
                light(0.0, 9.3, -3.0, 1.0, 1.0, 0.8),
                light(3.0, 9.3, -3.0, 1.0, 0.0, 0.0),
                light(-3.0, 9.3, -3.0, 0.0, 1.0, 0.0),
                light(0.0, 9.3, 3.0, 0.0, 0.0, 1.0),
            ],
            active: 1,
            moveable: false,
        }
    }
}

impl LightRig {
    pub fn set_active(&mut self, count: u32) {
        self.active = count.min(MAX_LIGHTS as u32);
    }

    pub fn toggle_moveable(&mut self) {
        self.moveable = !self.moveable;
    }

    /// Orbits every light about +Y when the rig is moveable.
    pub fn advance(mut self, dt: f32) -> Self {
        if self.moveable {
            let rot = Mat4::from_rotation_y((ORBIT_DEGREES_PER_SECOND * dt).to_radians());
            for l in &mut self.lights {
                l.position = rot * l.position;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_rig_does_not_move() {
        let rig = LightRig::default();
        assert_eq!(rig.advance(1.0), rig);
    }

    #[test]
    fn moveable_rig_orbits_and_keeps_height() {
        let mut rig = LightRig::default();
        rig.toggle_moveable();
        let before = rig.lights[1].position;
        let after = rig.advance(4.5).lights[1].position;
        assert!((after.y - before.y).abs() < 1e-5);
        let r0 = glam::Vec2::new(before.x, before.z).length();
        let r1 = glam::Vec2::new(after.x, after.z).length();
        assert!((r1 - r0).abs() < 1e-4);
        assert_ne!(after, before);
    }

    #[test]
    fn active_count_is_capped() {
        let mut rig = LightRig::default();
        rig.set_active(9);
        assert_eq!(rig.active, MAX_LIGHTS as u32);
    }
}
