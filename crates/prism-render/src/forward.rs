// SPDX-License-Identifier: CEPL-1.0
//! Forward shading into an intermediate colour buffer, then a full-screen
//! post-process pass that samples its colour and depth.
//!
//! The outgoing dependency of the forward pass covers only the colour
//! write. Depth is sampled too, so the pass graph adds an explicit barrier
//! for it before the post pass.
use crate::error::Result;
use crate::layout::{scene_set_layouts, screen_set_layouts, RenderPath};
use crate::pass::{AttachmentSpec, DependencySpec, PassDesc, SubpassRef, SubpassSpec};
use crate::pipeline::{
    BlendAttachment, CullMode, DepthState, FrontFace, PipelineDesc, RasterState, ShaderPair,
    ShaderSource, VertexLayout, ViewportMode,
};
use crate::types::{AccessFlags, ClearValue, Format, ImageLayout, PipelineStages, StoreOp};

pub const COLOUR: (&str, Format) = ("scene.colour", Format::B8G8R8A8_SRGB);
pub const DEPTH_NAME: &str = "scene.depth";

/// Colour at binding 0, depth at binding 1.
pub const SAMPLED_TARGETS: u32 = 2;

pub fn forward_pass(depth_format: Format) -> PassDesc {
    let (name, format) = COLOUR;
    let depth = AttachmentSpec {
        store: StoreOp::Store,
        final_layout: ImageLayout::ShaderReadOnly,
        ..AttachmentSpec::depth(DEPTH_NAME, depth_format)
    }
    .sampled();

    PassDesc {
        name: "forward".into(),
        attachments: vec![
            AttachmentSpec::color(name, format, ImageLayout::ShaderReadOnly).sampled(),
            depth,
        ],
        subpasses: vec![SubpassSpec {
            colors: vec![0],
            depth: Some(1),
        }],
        dependencies: vec![
            // previous frame's post reads must finish before we overwrite
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

pub fn forward_shaders(source: &dyn ShaderSource) -> Result<ShaderPair> {
    source.pair("gbuffer.vert", "forward.frag")
}

pub fn post_shaders(source: &dyn ShaderSource) -> Result<ShaderPair> {
    source.pair("composite.vert", "post.frag")
}

pub fn forward_pipeline(shaders: ShaderPair, viewport: ViewportMode) -> PipelineDesc {
    PipelineDesc {
        name: "forward".into(),
        subpass: 0,
        vertex_layout: VertexLayout::separate_vec3_streams(2),
        shaders,
        blend: vec![BlendAttachment::OPAQUE],
        depth: DepthState::READ_WRITE,
        raster: RasterState {
            cull: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
        },
        viewport,
        set_layouts: scene_set_layouts(),
    }
}

pub fn post_pipeline(shaders: ShaderPair, viewport: ViewportMode) -> PipelineDesc {
    PipelineDesc {
        name: "post".into(),
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
        set_layouts: screen_set_layouts(RenderPath::ForwardPost.sampled_set_layout()),
    }
}

pub fn forward_clears(clear_color: [f32; 4]) -> [ClearValue; 2] {
    [
        ClearValue::Color(clear_color),
        ClearValue::DepthStencil {
            depth: 1.0,
            stencil: 0,
        },
    ]
}
