// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral descriptions of formats, layouts and synchronisation masks.
use bitflags::bitflags;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    A2B10G10R10_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32_SFLOAT,
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
}

impl Format {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

impl ImageLayout {
    /// Layouts a fragment shader may sample from.
    pub fn is_shader_readable(self) -> bool {
        matches!(self, ImageLayout::ShaderReadOnly)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Clear,
    Load,
    DontCare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const UNIFORM_READ                   = 1 << 0;
        const SHADER_READ                    = 1 << 1;
        const COLOR_ATTACHMENT_READ          = 1 << 2;
        const COLOR_ATTACHMENT_WRITE         = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 5;
        const TRANSFER_READ                  = 1 << 6;
        const TRANSFER_WRITE                 = 1 << 7;
        const VERTEX_ATTRIBUTE_READ          = 1 << 8;
        const MEMORY_READ                    = 1 << 9;
        const MEMORY_WRITE                   = 1 << 10;
        const HOST_READ                      = 1 << 11;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE             = 1 << 0;
        const VERTEX_INPUT            = 1 << 1;
        const VERTEX_SHADER           = 1 << 2;
        const EARLY_FRAGMENT_TESTS    = 1 << 3;
        const FRAGMENT_SHADER         = 1 << 4;
        const LATE_FRAGMENT_TESTS     = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const TRANSFER                = 1 << 7;
        const BOTTOM_OF_PIPE          = 1 << 8;
        const HOST                    = 1 << 9;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT         = 1 << 0;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 1;
        const SAMPLED                  = 1 << 2;
        const TRANSFER_SRC             = 1 << 3;
        const TRANSFER_DST             = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX       = 1 << 0;
        const UNIFORM      = 1 << 1;
        const TRANSFER_SRC = 1 << 2;
        const TRANSFER_DST = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

impl ShaderStages {
    /// Pipeline stages in which these shader stages execute.
    pub fn pipeline_stages(self) -> PipelineStages {
        let mut out = PipelineStages::empty();
        if self.contains(ShaderStages::VERTEX) {
            out |= PipelineStages::VERTEX_SHADER;
        }
        if self.contains(ShaderStages::FRAGMENT) {
            out |= PipelineStages::FRAGMENT_SHADER;
        }
        out
    }
}

/// Memory barrier on a whole buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
}

/// Layout transition plus memory dependency on a whole image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBarrier {
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    SampledImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: ShaderStages,
}

/// Shape of one descriptor set; backends cache layouts by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

impl SetLayoutDesc {
    pub fn uniform(stages: ShaderStages) -> Self {
        Self {
            bindings: vec![DescriptorBinding {
                binding: 0,
                kind: DescriptorKind::UniformBuffer,
                stages,
            }],
        }
    }

    /// `count` combined image samplers at bindings `0..count`.
    pub fn sampled_images(count: u32, stages: ShaderStages) -> Self {
        Self {
            bindings: (0..count)
                .map(|binding| DescriptorBinding {
                    binding,
                    kind: DescriptorKind::SampledImage,
                    stages,
                })
                .collect(),
        }
    }
}
