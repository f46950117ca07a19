// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic frame pipeline: deferred or forward plus post-process.
//!
//! A backend implements [`Device`]; everything else here drives it:
//! the swapchain protocol, pass and pipeline construction, attachment
//! ownership, frame-slot synchronisation and command recording.
pub mod attachments;
pub mod batch;
pub mod deferred;
pub mod device;
pub mod error;
pub mod forward;
pub mod frame;
pub mod graph;
pub mod layout;
pub mod pass;
pub mod pipeline;
pub mod recorder;
pub mod staging;
pub mod surface;
pub mod sync;
pub mod technique;
pub mod types;
pub mod uniform;

#[cfg(test)]
pub(crate) mod mock_device;

use prism_core::ShutdownSignal;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

pub use batch::{split_by_material, MaterialDesc, MeshBatch, MeshSource};
pub use device::Device;
pub use error::{FrameError, Result};
pub use frame::{FrameConfig, FrameOrchestrator, FrameStatus};
pub use layout::RenderPath;
pub use pipeline::{ShaderCode, ShaderSource, ViewportMode};
pub use surface::VsyncMode;
pub use technique::Technique;
pub use types::{Extent2D, Format};
pub use uniform::{LightUniform, MaterialUniform, SceneUniform, MAX_LIGHTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl From<RenderSize> for Extent2D {
    fn from(s: RenderSize) -> Self {
        Extent2D::new(s.width, s.height)
    }
}

pub type RenderSettings = FrameConfig;

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
        shutdown: ShutdownSignal,
    ) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn load_scene(&mut self, mesh: &MeshSource, materials: &[MaterialDesc]) -> Result<()>;
    fn resize(&mut self, size: RenderSize);
    fn render(&mut self, uniform: &SceneUniform) -> Result<FrameStatus>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_technique(&mut self, technique: Technique);
    fn set_vsync(&mut self, _mode: VsyncMode) {}
    fn wait_idle(&self) -> Result<()>;
}
