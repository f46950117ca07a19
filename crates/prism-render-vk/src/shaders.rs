// SPDX-License-Identifier: CEPL-1.0
use crate::pipeline::decode_spirv;
use prism_render::pipeline::{ShaderCode, ShaderSource};
use prism_render::{FrameError, Result};

macro_rules! spv {
  ($name:literal) => {
    ($name, include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".spv")) as &[u8])
  };
}

/// SPIR-V compiled by the build script, looked up by logical name.
const BUILTIN: [(&str, &[u8]); 10] = [
  spv!("gbuffer.vert"),
  spv!("gbuffer.frag"),
  spv!("composite.vert"),
  spv!("composite_normal.frag"),
  spv!("composite_view.frag"),
  spv!("composite_light.frag"),
  spv!("composite_blinn_phong.frag"),
  spv!("composite_pbr.frag"),
  spv!("forward.frag"),
  spv!("post.frag"),
];

#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinShaders;

impl ShaderSource for BuiltinShaders {
  fn load(&self, name: &str) -> Result<ShaderCode> {
    let (_, bytes) = BUILTIN
      .iter()
      .find(|(n, _)| *n == name)
      .ok_or_else(|| FrameError::build("load_shader", format!("no built-in shader `{name}`")))?;
    decode_spirv(name, bytes)
  }
}
