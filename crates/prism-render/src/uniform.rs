// SPDX-License-Identifier: CEPL-1.0
//! Uniform payloads uploaded with `update_buffer` every frame.
//!
//! Layouts are std140-compatible: every member is a 16-byte vector or a
//! matrix, with scalars packed at the tail.
use crate::error::{FrameError, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Largest payload `update_buffer` accepts in one call.
pub const MAX_UPDATE_SIZE: usize = 65_536;

pub const MAX_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub position: [f32; 4],
    pub colour: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneUniform {
    pub camera: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub proj_cam: [[f32; 4]; 4],
    pub lights: [LightUniform; MAX_LIGHTS],
    pub cam_pos: [f32; 4],
    pub light_count: u32,
    /// [`Technique::code`](crate::Technique::code). Selects the lighting
    /// model in the forward shader; deferred composition bakes it in.
    pub technique: u32,
    pub _pad: [u32; 2],
}

impl Default for SceneUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl SceneUniform {
    pub fn new(
        view: Mat4,
        projection: Mat4,
        eye: Vec3,
        lights: [LightUniform; MAX_LIGHTS],
        light_count: u32,
        technique: u32,
    ) -> Self {
        Self {
            camera: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            proj_cam: (projection * view).to_cols_array_2d(),
            lights,
            cam_pos: eye.extend(1.0).to_array(),
            light_count: light_count.min(MAX_LIGHTS as u32),
            technique,
            _pad: [0; 2],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub emissive: [f32; 4],
    pub albedo: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
    pub metalness: f32,
    pub _pad: [f32; 2],
}

impl MaterialUniform {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

const _: () = {
    assert!(std::mem::size_of::<SceneUniform>() == 352);
    assert!(std::mem::size_of::<SceneUniform>() <= MAX_UPDATE_SIZE);
    assert!(std::mem::size_of::<SceneUniform>() % 4 == 0);
    assert!(std::mem::size_of::<MaterialUniform>() <= MAX_UPDATE_SIZE);
    assert!(std::mem::size_of::<MaterialUniform>() % 4 == 0);
};

/// Runtime counterpart of the compile-time checks, for opaque payloads.
pub fn check_update_size(name: &'static str, size: usize) -> Result<()> {
    let reason = if size == 0 {
        "empty payload"
    } else if size > MAX_UPDATE_SIZE {
        "exceeds the 65536-byte update limit"
    } else if size % 4 != 0 {
        "not a multiple of 4 bytes"
    } else {
        return Ok(());
    };
    Err(FrameError::Uniform { name, size, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_uniform_layout() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 352);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 64);
        assert_eq!(std::mem::offset_of!(SceneUniform, lights), 192);
        assert_eq!(std::mem::offset_of!(SceneUniform, cam_pos), 320);
        assert_eq!(std::mem::offset_of!(SceneUniform, light_count), 336);
    }

    #[test]
    fn proj_cam_is_projection_times_view() {
        let view = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let proj = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
        let u = SceneUniform::new(view, proj, Vec3::ZERO, [LightUniform::default(); 4], 9, 3);
        assert_eq!(Mat4::from_cols_array_2d(&u.proj_cam), proj * view);
        assert_eq!(u.light_count, 4);
        assert_eq!(u.cam_pos[3], 1.0);
    }

    #[test]
    fn update_size_limits() {
        assert!(check_update_size("scene", 352).is_ok());
        assert!(check_update_size("scene", MAX_UPDATE_SIZE).is_ok());
        assert!(check_update_size("blob", 0).is_err());
        assert!(check_update_size("blob", 6).is_err());
        let e = check_update_size("blob", MAX_UPDATE_SIZE + 4).unwrap_err();
        assert_eq!(
            e.to_string(),
            "uniform `blob` is 65540 bytes: exceeds the 65536-byte update limit"
        );
    }
}
