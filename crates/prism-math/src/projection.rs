// SPDX-License-Identifier: CEPL-1.0
use glam::Mat4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    /// Right-handed, zero-to-one depth, with Y flipped for Vulkan clip space.
    pub fn matrix(&self, width: u32, height: u32) -> Mat4 {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let fov_y = self.fov_y_degrees.to_radians();
        let mut m = Mat4::perspective_rh(fov_y, aspect, self.near, self.far);
        m.y_axis.y *= -1.0;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn near_and_far_map_to_zero_and_one() {
        let p = Projection::default().matrix(1280, 720);
        let near = p.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = p.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn y_is_flipped() {
        let p = Projection::default().matrix(800, 800);
        let up = p.project_point3(Vec3::new(0.0, 1.0, -5.0));
        assert!(up.y < 0.0);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let p = Projection::default().matrix(640, 0);
        assert!(p.is_finite());
    }
}
