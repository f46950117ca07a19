// SPDX-License-Identifier: CEPL-1.0
//! The two frame layouts the orchestrator can drive.
//!
//! Both are a scene pass into off-screen targets followed by a full-screen
//! pass into the swapchain image that samples targets `0..n` of the scene
//! pass at bindings `0..n`.
use crate::deferred;
use crate::error::Result;
use crate::forward;
use crate::graph::SampledInput;
use crate::pass::{AttachmentSpec, DependencySpec, PassDesc, SubpassRef, SubpassSpec};
use crate::pipeline::{PipelineDesc, ShaderPair, ShaderSource, ViewportMode};
use crate::technique::Technique;
use crate::types::{
    AccessFlags, ClearValue, Format, ImageLayout, PipelineStages, SetLayoutDesc, ShaderStages,
};
use std::fmt;
use std::str::FromStr;

pub const SCENE_PASS: usize = 0;
pub const SCREEN_PASS: usize = 1;

pub const SCENE_SET: u32 = 0;
/// Per-draw material uniform, scene-pass pipelines only.
pub const MATERIAL_SET: u32 = 1;
/// Scene-pass targets, screen-pass pipelines only.
pub const SAMPLED_SET: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderPath {
    /// G-buffer geometry pass, then per-technique lighting composition.
    #[default]
    Deferred,
    /// Forward-lit scene into an intermediate colour target, then a
    /// full-screen post-process pass.
    ForwardPost,
}

impl RenderPath {
    pub const ALL: [RenderPath; 2] = [RenderPath::Deferred, RenderPath::ForwardPost];

    pub fn name(self) -> &'static str {
        match self {
            RenderPath::Deferred => "deferred",
            RenderPath::ForwardPost => "forward-post",
        }
    }

    pub fn scene_pass(self, depth_format: Format) -> PassDesc {
        match self {
            RenderPath::Deferred => deferred::geometry_pass(depth_format),
            RenderPath::ForwardPost => forward::forward_pass(depth_format),
        }
    }

    pub fn screen_pass(self, surface_format: Format) -> PassDesc {
        let name = match self {
            RenderPath::Deferred => "composition",
            RenderPath::ForwardPost => "post",
        };
        screen_pass(name, surface_format)
    }

    fn sampled_count(self) -> u32 {
        match self {
            RenderPath::Deferred => deferred::GBUFFER.len() as u32,
            RenderPath::ForwardPost => forward::SAMPLED_TARGETS,
        }
    }

    /// The screen pass samples each scene target at the binding equal to
    /// its attachment index.
    pub fn sampled_inputs(self) -> Vec<SampledInput> {
        (0..self.sampled_count())
            .map(|i| SampledInput {
                consumer: SCREEN_PASS,
                producer: SCENE_PASS,
                attachment: i,
                binding: i,
            })
            .collect()
    }

    pub fn sampled_set_layout(self) -> SetLayoutDesc {
        SetLayoutDesc::sampled_images(self.sampled_count(), ShaderStages::FRAGMENT)
    }

    pub fn scene_shaders(self, source: &dyn ShaderSource) -> Result<ShaderPair> {
        match self {
            RenderPath::Deferred => deferred::geometry_shaders(source),
            RenderPath::ForwardPost => forward::forward_shaders(source),
        }
    }

    /// Deferred composition is specialised per technique. The forward
    /// shader reads the technique from the scene uniform, so one screen
    /// pipeline serves them all.
    pub fn screen_shaders(self, source: &dyn ShaderSource) -> Result<Vec<ShaderPair>> {
        match self {
            RenderPath::Deferred => Technique::ALL
                .iter()
                .map(|&t| deferred::composition_shaders(source, t))
                .collect(),
            RenderPath::ForwardPost => Ok(vec![forward::post_shaders(source)?]),
        }
    }

    /// Index into the screen pipelines for `technique`.
    pub fn screen_slot(self, technique: Technique) -> usize {
        match self {
            RenderPath::Deferred => technique.index(),
            RenderPath::ForwardPost => 0,
        }
    }

    pub fn scene_pipeline(self, shaders: ShaderPair, viewport: ViewportMode) -> PipelineDesc {
        match self {
            RenderPath::Deferred => deferred::geometry_pipeline(shaders, viewport),
            RenderPath::ForwardPost => forward::forward_pipeline(shaders, viewport),
        }
    }

    /// One description per entry of `shaders`, in slot order.
    pub fn screen_pipelines(
        self,
        shaders: &[ShaderPair],
        viewport: ViewportMode,
    ) -> Vec<PipelineDesc> {
        match self {
            RenderPath::Deferred => Technique::ALL
                .iter()
                .zip(shaders)
                .map(|(&t, s)| deferred::composition_pipeline(s.clone(), t, viewport))
                .collect(),
            RenderPath::ForwardPost => shaders
                .iter()
                .map(|s| forward::post_pipeline(s.clone(), viewport))
                .collect(),
        }
    }

    pub fn scene_clears(self, clear_color: [f32; 4]) -> Vec<ClearValue> {
        match self {
            RenderPath::Deferred => deferred::geometry_clears(clear_color).to_vec(),
            RenderPath::ForwardPost => forward::forward_clears(clear_color).to_vec(),
        }
    }
}

impl fmt::Display for RenderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPath(pub String);

impl fmt::Display for UnknownPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown render path `{}` (expected deferred or forward-post)", self.0)
    }
}

impl std::error::Error for UnknownPath {}

impl FromStr for RenderPath {
    type Err = UnknownPath;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('_', "-");
        RenderPath::ALL
            .into_iter()
            .find(|p| p.name() == lower)
            .or(match lower.as_str() {
                "forward" | "post" => Some(RenderPath::ForwardPost),
                _ => None,
            })
            .ok_or(UnknownPath(s.to_owned()))
    }
}

pub fn scene_set_layout() -> SetLayoutDesc {
    SetLayoutDesc::uniform(ShaderStages::VERTEX | ShaderStages::FRAGMENT)
}

pub fn material_set_layout() -> SetLayoutDesc {
    SetLayoutDesc::uniform(ShaderStages::FRAGMENT)
}

fn by_set_index<const N: usize>(mut sets: [(u32, SetLayoutDesc); N]) -> Vec<SetLayoutDesc> {
    sets.sort_by_key(|(index, _)| *index);
    sets.into_iter().map(|(_, layout)| layout).collect()
}

/// Set layouts of a scene-pass pipeline, indexed by set number.
pub fn scene_set_layouts() -> Vec<SetLayoutDesc> {
    by_set_index([
        (SCENE_SET, scene_set_layout()),
        (MATERIAL_SET, material_set_layout()),
    ])
}

/// Set layouts of a screen-pass pipeline, indexed by set number.
pub fn screen_set_layouts(sampled: SetLayoutDesc) -> Vec<SetLayoutDesc> {
    by_set_index([(SCENE_SET, scene_set_layout()), (SAMPLED_SET, sampled)])
}

/// Single-subpass pass that clears and writes the presentable image.
pub fn screen_pass(name: &str, surface_format: Format) -> PassDesc {
    PassDesc {
        name: name.into(),
        attachments: vec![AttachmentSpec::color(
            "swapchain",
            surface_format,
            ImageLayout::PresentSrc,
        )],
        subpasses: vec![SubpassSpec {
            colors: vec![0],
            depth: None,
        }],
        dependencies: vec![DependencySpec {
            src: SubpassRef::External,
            dst: SubpassRef::Index(0),
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            dst_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            by_region: false,
        }],
    }
}

pub fn screen_clears(clear_color: [f32; 4]) -> [ClearValue; 1] {
    [ClearValue::Color(clear_color)]
}
