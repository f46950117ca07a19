// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan backend for the frame pipeline.
mod command;
mod context;
mod convert;
mod device;
mod error;
mod memory;
mod pipeline;
mod shaders;
mod swapchain;

pub use device::VkDevice;
pub use shaders::BuiltinShaders;

use anyhow::{Context as _, Result};
use prism_core::ShutdownSignal;
use prism_render::{
  FrameOrchestrator, FrameStatus, MaterialDesc, MeshSource, RenderSettings, RenderSize, Renderer,
  SceneUniform, Technique, VsyncMode,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

pub struct VkRenderer {
  frame: FrameOrchestrator<VkDevice>,
}

impl Renderer for VkRenderer {
  fn new(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    settings: &RenderSettings,
    shutdown: ShutdownSignal,
  ) -> Result<Self> {
    let ctx = context::Ctx::new(window, display).context("vulkan bootstrap")?;
    let device = VkDevice::new(ctx);
    let frame = FrameOrchestrator::new(device, size.into(), &BuiltinShaders, *settings, shutdown)
      .context("frame pipeline setup")?;
    info!(
      "vulkan renderer ready ({} path, {}, {:?}, depth {:?})",
      frame.path(),
      frame.extent(),
      frame.surface_format(),
      frame.depth_format()
    );
    Ok(Self { frame })
  }

  fn load_scene(
    &mut self,
    mesh: &MeshSource,
    materials: &[MaterialDesc],
  ) -> prism_render::Result<()> {
    self.frame.load_scene(mesh, materials)
  }

  fn resize(&mut self, size: RenderSize) {
    self.frame.resize(size.into());
  }

  fn render(&mut self, uniform: &SceneUniform) -> prism_render::Result<FrameStatus> {
    self.frame.render_frame(uniform)
  }

  fn set_clear_color(&mut self, rgba: [f32; 4]) {
    self.frame.set_clear_color(rgba);
  }

  fn set_technique(&mut self, technique: Technique) {
    self.frame.set_technique(technique);
  }

  fn set_vsync(&mut self, mode: VsyncMode) {
    self.frame.set_vsync(mode);
  }

  fn wait_idle(&self) -> prism_render::Result<()> {
    self.frame.wait_idle()
  }
}
