// SPDX-License-Identifier: CEPL-1.0
use crate::device::Device;
use crate::error::{FrameError, Result};
use crate::pass::Pass;
use crate::types::{Extent2D, Format, SetLayoutDesc};
use tracing::debug;

pub const DEFAULT_ENTRY_POINT: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: Format,
    pub offset: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// No vertex input; positions come from `gl_VertexIndex`.
    pub fn none() -> Self {
        Self::default()
    }

    /// One tightly packed `vec3` stream per binding, location = binding.
    pub fn separate_vec3_streams(count: u32) -> Self {
        Self {
            bindings: (0..count)
                .map(|binding| VertexBinding { binding, stride: 12 })
                .collect(),
            attributes: (0..count)
                .map(|i| VertexAttribute {
                    location: i,
                    binding: i,
                    format: Format::R32G32B32_SFLOAT,
                    offset: 0,
                })
                .collect(),
        }
    }
}

/// SPIR-V for one stage, tagged with the logical name it was loaded under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderCode {
    pub label: String,
    pub spirv: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: ShaderCode,
    pub fragment: ShaderCode,
    pub entry_point: &'static str,
}

/// Supplies compiled shaders by logical name.
pub trait ShaderSource {
    fn load(&self, name: &str) -> Result<ShaderCode>;

    fn pair(&self, vertex: &str, fragment: &str) -> Result<ShaderPair> {
        Ok(ShaderPair {
            vertex: self.load(vertex)?,
            fragment: self.load(fragment)?,
            entry_point: DEFAULT_ENTRY_POINT,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    Min,
    Max,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ColorMask: u8 {
        const R = 1;
        const G = 2;
        const B = 4;
        const A = 8;
        const RGBA = 15;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendAttachment {
    pub blend_enable: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub op: BlendOp,
    pub write_mask: ColorMask,
}

impl BlendAttachment {
    pub const OPAQUE: Self = Self {
        blend_enable: false,
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        op: BlendOp::Add,
        write_mask: ColorMask::RGBA,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: CompareOp,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
        compare: CompareOp::Always,
    };
    pub const READ_WRITE: Self = Self {
        test: true,
        write: true,
        compare: CompareOp::LessOrEqual,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterState {
    pub cull: CullMode,
    pub front_face: FrontFace,
}

/// Whether viewport and scissor are part of the pipeline object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewportMode {
    /// Baked at build time, so a resize rebuilds the pipeline.
    #[default]
    Baked,
    /// Set while recording, so a resize leaves the pipeline alone.
    Dynamic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineDesc {
    pub name: String,
    pub subpass: u32,
    pub vertex_layout: VertexLayout,
    pub shaders: ShaderPair,
    /// One entry per colour attachment of the subpass, in attachment order.
    pub blend: Vec<BlendAttachment>,
    pub depth: DepthState,
    pub raster: RasterState,
    pub viewport: ViewportMode,
    /// Descriptor set layouts by set index.
    pub set_layouts: Vec<SetLayoutDesc>,
}

impl PipelineDesc {
    pub fn validate<D: Device>(&self, pass: &Pass<D>) -> Result<()> {
        let fail = |reason: String| FrameError::invalid_pipeline(self.name.clone(), reason);
        let pd = pass.desc();
        let sub = self.subpass as usize;
        if sub >= pd.subpasses.len() {
            return Err(fail(format!(
                "subpass {} does not exist in pass `{}`",
                self.subpass, pd.name
            )));
        }
        let colors = pd.color_count(sub);
        if self.blend.len() != colors {
            return Err(fail(format!(
                "{} blend entries for {} colour attachments of pass `{}`",
                self.blend.len(),
                colors,
                pd.name
            )));
        }
        if self.depth.test && !pd.has_depth(sub) {
            return Err(fail(format!(
                "depth test enabled but pass `{}` has no depth attachment",
                pd.name
            )));
        }
        if self.shaders.entry_point.is_empty() {
            return Err(fail("empty shader entry point".into()));
        }
        if self.shaders.vertex.spirv.is_empty() || self.shaders.fragment.spirv.is_empty() {
            return Err(fail("missing shader bytecode".into()));
        }
        for a in &self.vertex_layout.attributes {
            if !self.vertex_layout.bindings.iter().any(|b| b.binding == a.binding) {
                return Err(fail(format!(
                    "attribute at location {} reads undeclared binding {}",
                    a.location, a.binding
                )));
            }
        }
        Ok(())
    }
}

/// An immutable pipeline tied to the pass and extent it was built for.
pub struct Pipeline<D: Device> {
    raw: D::Pipeline,
    desc: PipelineDesc,
    extent: Extent2D,
}

impl<D: Device> Pipeline<D> {
    pub fn raw(&self) -> &D::Pipeline {
        &self.raw
    }

    pub fn desc(&self) -> &PipelineDesc {
        &self.desc
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn viewport_mode(&self) -> ViewportMode {
        self.desc.viewport
    }
}

pub fn build_pipeline<D: Device>(
    device: &D,
    pass: &Pass<D>,
    desc: PipelineDesc,
    extent: Extent2D,
) -> Result<Pipeline<D>> {
    desc.validate(pass)?;
    let raw = device.create_pipeline(pass.raw(), &desc, extent)?;
    debug!(
        "pipeline `{}` built for pass `{}` ({:?} viewport, {})",
        desc.name,
        pass.name(),
        desc.viewport,
        extent
    );
    Ok(Pipeline { raw, desc, extent })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
