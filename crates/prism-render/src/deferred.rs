// SPDX-License-Identifier: CEPL-1.0
//! The two-pass deferred layout: a G-buffer geometry pass followed by a
//! full-screen composition pass into the swapchain image.
use crate::error::Result;
use crate::layout::{scene_set_layouts, screen_set_layouts, RenderPath};
use crate::pass::{AttachmentSpec, DependencySpec, PassDesc, SubpassRef, SubpassSpec};
use crate::pipeline::{
    BlendAttachment, CullMode, DepthState, FrontFace, PipelineDesc, RasterState, ShaderPair,
    ShaderSource, VertexLayout, ViewportMode,
};
use crate::technique::Technique;
use crate::types::{AccessFlags, ClearValue, Format, ImageLayout, PipelineStages};

/// G-buffer targets in attachment and sampler-binding order.
pub const GBUFFER: [(&str, Format); 4] = [
    ("gbuffer.position", Format::R16G16B16A16_SFLOAT),
    ("gbuffer.normal", Format::R16G16B16A16_SFLOAT),
    ("gbuffer.albedo", Format::B8G8R8A8_SRGB),
    ("gbuffer.emissive", Format::B8G8R8A8_SRGB),
];

pub const DEPTH_NAME: &str = "gbuffer.depth";

pub fn geometry_pass(depth_format: Format) -> PassDesc {
    let mut attachments: Vec<AttachmentSpec> = GBUFFER
        .iter()
        .map(|&(name, format)| {
            AttachmentSpec::color(name, format, ImageLayout::ShaderReadOnly).sampled()
        })
        .collect();
    attachments.push(AttachmentSpec::depth(DEPTH_NAME, depth_format));
    let depth = GBUFFER.len() as u32;

    PassDesc {
        name: "geometry".into(),
        attachments,
        subpasses: vec![SubpassSpec {
            colors: (0..depth).collect(),
            depth: Some(depth),
        }],
        dependencies: vec![
            // previous frame's composition reads must finish before we overwrite
            DependencySpec {
                src: SubpassRef::External,
                dst: SubpassRef::Index(0),
                src_stages: PipelineStages::FRAGMENT_SHADER | PipelineStages::LATE_FRAGMENT_TESTS,
                dst_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStages::EARLY_FRAGMENT_TESTS,
                src_access: AccessFlags::SHADER_READ
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                by_region: false,
            },
            DependencySpec {
                src: SubpassRef::Index(0),
                dst: SubpassRef::External,
                src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                dst_stages: PipelineStages::FRAGMENT_SHADER,
                src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access: AccessFlags::SHADER_READ,
                by_region: true,
            },
        ],
    }
}

pub fn geometry_shaders(source: &dyn ShaderSource) -> Result<ShaderPair> {
    source.pair("gbuffer.vert", "gbuffer.frag")
}

pub fn composition_shaders(source: &dyn ShaderSource, technique: Technique) -> Result<ShaderPair> {
    source.pair("composite.vert", technique.fragment_shader())
}

pub fn geometry_pipeline(shaders: ShaderPair, viewport: ViewportMode) -> PipelineDesc {
    PipelineDesc {
        name: "geometry".into(),
        subpass: 0,
        vertex_layout: VertexLayout::separate_vec3_streams(2),
        shaders,
        blend: vec![BlendAttachment::OPAQUE; GBUFFER.len()],
        depth: DepthState::READ_WRITE,
        raster: RasterState {
            cull: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
        },
        viewport,
        set_layouts: scene_set_layouts(),
    }
}

pub fn composition_pipeline(
    shaders: ShaderPair,
    technique: Technique,
    viewport: ViewportMode,
) -> PipelineDesc {
    PipelineDesc {
        name: format!("composition.{}", technique.name()),
        subpass: 0,
        vertex_layout: VertexLayout::none(),
        shaders,
        blend: vec![BlendAttachment::OPAQUE],
        depth: DepthState::DISABLED,
        raster: RasterState {
            cull: CullMode::None,
            front_face: FrontFace::Clockwise,
        },
        viewport,
        set_layouts: screen_set_layouts(RenderPath::Deferred.sampled_set_layout()),
    }
}

/// Emissive carries the background colour; the other targets clear to zero.
pub fn geometry_clears(clear_color: [f32; 4]) -> [ClearValue; 5] {
    [
        ClearValue::Color([0.0; 4]),
        ClearValue::Color([0.0; 4]),
        ClearValue::Color([0.0; 4]),
        ClearValue::Color(clear_color),
        ClearValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        },
    ]
}
