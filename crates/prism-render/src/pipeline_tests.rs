use super::*;
use crate::mock_device::{Event, MockDevice};
use crate::pass::{build_pass, AttachmentSpec, PassDesc, SubpassSpec};
use crate::types::{ImageLayout, ShaderStages};

fn shaders() -> ShaderPair {
    ShaderPair {
        vertex: ShaderCode {
            label: "test.vert".into(),
            spirv: vec![0x0723_0203, 1],
        },
        fragment: ShaderCode {
            label: "test.frag".into(),
            spirv: vec![0x0723_0203, 2],
        },
        entry_point: DEFAULT_ENTRY_POINT,
    }
}

fn two_target_pass(device: &MockDevice, depth: bool) -> Pass<MockDevice> {
    let mut attachments = vec![
        AttachmentSpec::color("a", Format::R16G16B16A16_SFLOAT, ImageLayout::ShaderReadOnly),
        AttachmentSpec::color("b", Format::B8G8R8A8_SRGB, ImageLayout::ShaderReadOnly),
    ];
    if depth {
        attachments.push(AttachmentSpec::depth("depth", Format::D32_SFLOAT));
    }
    let desc = PassDesc {
        name: "targets".into(),
        attachments,
        subpasses: vec![SubpassSpec {
            colors: vec![0, 1],
            depth: depth.then_some(2),
        }],
        dependencies: Vec::new(),
    };
    build_pass(device, desc).unwrap()
}

fn desc() -> PipelineDesc {
    PipelineDesc {
        name: "test".into(),
        subpass: 0,
        vertex_layout: VertexLayout::separate_vec3_streams(2),
        shaders: shaders(),
        blend: vec![BlendAttachment::OPAQUE; 2],
        depth: DepthState::READ_WRITE,
        raster: RasterState {
            cull: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
        },
        viewport: ViewportMode::default(),
        set_layouts: vec![SetLayoutDesc::uniform(ShaderStages::VERTEX)],
    }
}

fn reason(e: FrameError) -> String {
    match e {
        FrameError::InvalidPipeline { reason, .. } => reason,
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn builds_against_matching_pass() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let p = build_pipeline(&device, &pass, desc(), Extent2D::new(640, 480)).unwrap();
    assert_eq!(p.extent(), Extent2D::new(640, 480));
    assert_eq!(p.viewport_mode(), ViewportMode::Baked);
    assert_eq!(
        device.count(|e| matches!(e, Event::CreatePipeline { name, .. } if name == "test")),
        1
    );
}

#[test]
fn blend_entries_must_match_colour_count() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let mut d = desc();
    d.blend.pop();
    let r = reason(build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).err().unwrap());
    assert!(r.contains("1 blend entries for 2 colour attachments"));
}

#[test]
fn blend_entries_are_independent() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let mut d = desc();
    d.blend[1] = BlendAttachment {
        blend_enable: true,
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        op: BlendOp::Add,
        write_mask: ColorMask::R | ColorMask::G | ColorMask::B,
    };
    let p = build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).unwrap();
    assert_eq!(p.desc().blend[0], BlendAttachment::OPAQUE);
    assert!(p.desc().blend[1].blend_enable);
}

#[test]
fn depth_test_needs_depth_attachment() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, false);
    let r = reason(build_pipeline(&device, &pass, desc(), Extent2D::new(8, 8)).err().unwrap());
    assert!(r.contains("no depth attachment"));

    let mut d = desc();
    d.depth = DepthState::DISABLED;
    build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).unwrap();
}

#[test]
fn empty_entry_point_is_rejected() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let mut d = desc();
    d.shaders.entry_point = "";
    let r = reason(build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).err().unwrap());
    assert!(r.contains("entry point"));
}

#[test]
fn attribute_must_read_declared_binding() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let mut d = desc();
    d.vertex_layout.bindings.truncate(1);
    let r = reason(build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).err().unwrap());
    assert!(r.contains("undeclared binding 1"));
}

#[test]
fn missing_subpass_is_rejected_before_device_call() {
    let device = MockDevice::new();
    let pass = two_target_pass(&device, true);
    let mut d = desc();
    d.subpass = 1;
    assert!(build_pipeline(&device, &pass, d, Extent2D::new(8, 8)).is_err());
    assert_eq!(device.count(|e| matches!(e, Event::CreatePipeline { .. })), 0);
}

#[test]
fn shader_pair_defaults_to_main() {
    struct Fixed;
    impl ShaderSource for Fixed {
        fn load(&self, name: &str) -> Result<ShaderCode> {
            Ok(ShaderCode {
                label: name.to_owned(),
                spirv: vec![1],
            })
        }
    }
    let pair = Fixed.pair("gbuffer.vert", "gbuffer.frag").unwrap();
    assert_eq!(pair.entry_point, "main");
    assert_eq!(pair.fragment.label, "gbuffer.frag");
}
