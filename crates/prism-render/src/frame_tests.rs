use super::*;
use crate::device::{AcquireResult, PresentResult};
use crate::mock_device::{Cmd, Event, Failure, Id, MockDevice};
use crate::pipeline::ShaderCode;
use crate::types::{AccessFlags, ImageBarrier, ImageUsage};
use std::collections::{HashMap, HashSet};

struct TestShaders;

impl ShaderSource for TestShaders {
    fn load(&self, name: &str) -> Result<ShaderCode> {
        Ok(ShaderCode {
            label: name.to_owned(),
            spirv: vec![0x0723_0203, 0x0001_0000],
        })
    }
}

const HD: Extent2D = Extent2D::new(1280, 720);
const FULL_HD: Extent2D = Extent2D::new(1920, 1080);

fn orchestrator(config: FrameConfig) -> (MockDevice, FrameOrchestrator<MockDevice>) {
    let device = MockDevice::new();
    let orch =
        FrameOrchestrator::new(device.clone(), HD, &TestShaders, config, ShutdownSignal::new())
            .unwrap();
    (device, orch)
}

fn uniform(orch: &FrameOrchestrator<MockDevice>) -> SceneUniform {
    SceneUniform {
        technique: orch.technique().code(),
        ..SceneUniform::default()
    }
}

fn cube_scene() -> (MeshSource, Vec<MaterialDesc>) {
    let mesh = MeshSource {
        positions: vec![[0.0, 0.0, 0.0]; 12],
        normals: vec![[0.0, 1.0, 0.0]; 12],
        face_materials: vec![0, 0, 1, 1],
    };
    (mesh, vec![MaterialDesc::default(); 2])
}

fn forward_post() -> FrameConfig {
    FrameConfig {
        path: RenderPath::ForwardPost,
        ..FrameConfig::default()
    }
}

fn image_ids(device: &MockDevice) -> HashMap<String, Id> {
    device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::CreateImage { id, name, .. } => Some((name, id)),
            _ => None,
        })
        .collect()
}

fn pipeline_extents(device: &MockDevice) -> Vec<Extent2D> {
    device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::CreatePipeline { extent, .. } => Some(extent),
            _ => None,
        })
        .collect()
}

#[test]
fn a_frame_acquires_records_submits_and_presents_in_order() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    device.clear_events();
    let u = uniform(&orch);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);

    let events = device.events();
    let pos = |pred: &dyn Fn(&Event) -> bool| events.iter().position(pred).unwrap();
    let acquire = pos(&|e| matches!(e, Event::Acquire { .. }));
    let wait = pos(&|e| matches!(e, Event::WaitFence { signaled: true, .. }));
    let begin = pos(&|e| matches!(e, Event::Cmd { op: Cmd::Begin, .. }));
    let submit = pos(&|e| matches!(e, Event::Submit { .. }));
    let present = pos(&|e| matches!(e, Event::Present { .. }));
    assert!(acquire < wait && wait < begin && begin < submit && submit < present);

    let ops: Vec<Cmd> = device.commands().into_iter().map(|(_, c)| c).collect();
    let passes = ops.iter().filter(|o| matches!(o, Cmd::BeginPass { .. })).count();
    assert_eq!(passes, 2);
    assert!(ops.contains(&Cmd::Draw {
        vertex_count: 3,
        first_vertex: 0
    }));
}

#[test]
fn resize_with_same_format_keeps_passes_and_rebuilds_the_rest() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    orch.render_frame(&u).unwrap();
    let passes_before: Vec<Id> = orch.graph.passes().iter().map(|p| p.raw().id).collect();
    device.clear_events();

    orch.resize(FULL_HD);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);

    assert_eq!(device.count(|e| matches!(e, Event::CreateRenderPass { .. })), 0);
    let passes_after: Vec<Id> = orch.graph.passes().iter().map(|p| p.raw().id).collect();
    assert_eq!(passes_before, passes_after);

    let images: Vec<Extent2D> = device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::CreateImage { extent, .. } => Some(extent),
            _ => None,
        })
        .collect();
    assert_eq!(images, vec![FULL_HD; 5]);
    assert_eq!(pipeline_extents(&device), vec![FULL_HD; 1 + Technique::ALL.len()]);
    let fbs = device.count(
        |e| matches!(e, Event::CreateFramebuffer { extent, .. } if *extent == FULL_HD),
    );
    assert_eq!(fbs, 1 + 3);
    assert_eq!(orch.extent(), FULL_HD);
}

#[test]
fn dynamic_viewport_pipelines_survive_a_resize() {
    let config = FrameConfig {
        viewport: ViewportMode::Dynamic,
        ..FrameConfig::default()
    };
    let (device, mut orch) = orchestrator(config);
    let u = uniform(&orch);
    device.clear_events();
    orch.resize(FULL_HD);
    orch.render_frame(&u).unwrap();
    assert!(pipeline_extents(&device).is_empty());
    assert_eq!(device.count(|e| matches!(e, Event::CreateImage { .. })), 5);
    assert!(device
        .commands()
        .iter()
        .any(|(_, c)| *c == Cmd::SetViewport { extent: FULL_HD }));
}

#[test]
fn format_change_rebuilds_passes_and_everything_downstream() {
    let (device, mut orch) = orchestrator(FrameConfig {
        viewport: ViewportMode::Dynamic,
        ..FrameConfig::default()
    });
    device.clear_events();
    device.state().surface_format = Format::R8G8B8A8_SRGB;
    orch.recreate().unwrap();
    assert_eq!(device.count(|e| matches!(e, Event::CreateRenderPass { .. })), 2);
    assert_eq!(pipeline_extents(&device).len(), 1 + Technique::ALL.len());
    assert_eq!(device.count(|e| matches!(e, Event::CreateImage { .. })), 5);
    assert_eq!(orch.surface_format(), Format::R8G8B8A8_SRGB);
    let u = uniform(&orch);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
}

#[test]
fn unchanged_recreate_only_rebuilds_framebuffers() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    device.clear_events();
    orch.recreate().unwrap();
    assert_eq!(device.count(|e| matches!(e, Event::CreateImage { .. })), 0);
    assert_eq!(device.count(|e| matches!(e, Event::CreatePipeline { .. })), 0);
    assert_eq!(device.count(|e| matches!(e, Event::CreateFramebuffer { .. })), 4);
    assert_eq!(device.count(|e| matches!(e, Event::WaitIdle)), 1);
}

#[test]
fn any_resize_sequence_converges_on_the_last_extent() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    let sizes = [
        Extent2D::new(800, 600),
        Extent2D::new(1024, 768),
        Extent2D::new(0, 0),
        Extent2D::new(640, 480),
        Extent2D::new(1600, 900),
    ];
    for (i, &size) in sizes.iter().enumerate() {
        orch.resize(size);
        // coalesce the middle pair without a frame in between
        if i != 0 {
            orch.render_frame(&u).unwrap();
        }
    }
    let last = *sizes.last().unwrap();
    assert_eq!(orch.extent(), last);
    let targets = orch.graph.pass(SCENE_PASS).unwrap().desc().attachments.len() as u32;
    for slot in 0..targets {
        let image = orch.attachments.plan_image(orch.plans[SCENE_PASS], slot).unwrap();
        assert_eq!(image.extent, last);
    }
    assert_eq!(orch.scene_pipeline.extent(), last);
    assert!(orch.screen_pipelines.iter().all(|p| p.extent() == last));

    // everything created after the final swapchain rebuild is at the final size
    let events = device.events();
    let final_rebuild = events
        .iter()
        .rposition(|e| matches!(e, Event::RecreateSwapchain { .. }))
        .unwrap();
    for e in &events[final_rebuild..] {
        if let Event::CreateImage { extent, .. } | Event::CreateFramebuffer { extent, .. } = e {
            assert_eq!(*extent, last);
        }
    }
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::RecreateSwapchain { extent, .. } if extent.is_empty()
    )));
}

#[test]
fn out_of_date_acquire_skips_the_frame_and_rebuilds() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.clear_events();
    device.script_acquire([AcquireResult::OutOfDate]);

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Skipped);
    assert_eq!(device.count(|e| matches!(e, Event::Submit { .. })), 0);
    assert_eq!(device.count(|e| matches!(e, Event::Present { .. })), 0);
    assert!(device.commands().is_empty());
    assert_eq!(device.count(|e| matches!(e, Event::RecreateSwapchain { .. })), 1);

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
}

#[test]
fn suboptimal_acquire_is_treated_like_out_of_date() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.clear_events();
    device.script_acquire([AcquireResult::Acquired {
        index: 2,
        suboptimal: true,
    }]);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Skipped);
    assert_eq!(device.count(|e| matches!(e, Event::Submit { .. })), 0);
}

#[test]
fn stale_present_rebuilds_before_the_next_acquire() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.script_present([PresentResult::OutOfDate]);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
    assert!(orch.needs_recreate());
    device.clear_events();

    orch.render_frame(&u).unwrap();
    let events = device.events();
    let rebuild = events
        .iter()
        .position(|e| matches!(e, Event::RecreateSwapchain { .. }))
        .unwrap();
    let acquire = events
        .iter()
        .position(|e| matches!(e, Event::Acquire { .. }))
        .unwrap();
    let idle = events.iter().position(|e| matches!(e, Event::WaitIdle)).unwrap();
    assert!(idle < rebuild && rebuild < acquire);
    assert!(!orch.needs_recreate());
}

#[test]
fn composition_samples_the_four_gbuffer_targets_in_order() {
    let (device, orch) = orchestrator(FrameConfig::default());
    let events = device.events();
    let names: HashMap<Id, String> = events
        .iter()
        .filter_map(|e| match e {
            Event::CreateImage { id, name, .. } => Some((*id, name.clone())),
            _ => None,
        })
        .collect();

    let bound = events
        .iter()
        .rev()
        .find_map(|e| match e {
            Event::WriteImageDescriptors { set, bindings } if *set == orch.sampled_set.id => {
                Some(bindings.clone())
            }
            _ => None,
        })
        .unwrap();
    let bound: Vec<(u32, &str)> = bound.iter().map(|(b, id)| (*b, names[id].as_str())).collect();
    assert_eq!(
        bound,
        vec![
            (0, "gbuffer.position"),
            (1, "gbuffer.normal"),
            (2, "gbuffer.albedo"),
            (3, "gbuffer.emissive"),
        ]
    );

    let geometry_fb = events
        .iter()
        .find_map(|e| match e {
            Event::CreateFramebuffer { attachments, .. } if attachments.len() == 5 => {
                Some(attachments.clone())
            }
            _ => None,
        })
        .unwrap();
    let targets: Vec<&str> = geometry_fb.iter().map(|id| names[id].as_str()).collect();
    assert_eq!(
        targets,
        vec![
            "gbuffer.position",
            "gbuffer.normal",
            "gbuffer.albedo",
            "gbuffer.emissive",
            "gbuffer.depth",
        ]
    );
}

#[test]
fn every_sampled_input_is_readable_and_covered() {
    let (_device, orch) = orchestrator(FrameConfig::default());
    assert_eq!(orch.graph.links().len(), 4);
    for link in orch.graph.links() {
        let producer = orch.graph.pass(link.input.producer).unwrap();
        let spec = &producer.desc().attachments[link.input.attachment as usize];
        assert!(spec.final_layout.is_shader_readable());
        assert!(link.covered);
    }
    assert_eq!(orch.graph.barriers_before(SCREEN_PASS).count(), 0);
}

#[test]
fn scene_uniform_reads_back_the_latest_frame() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let mut u = uniform(&orch);
    u.light_count = 1;
    orch.render_frame(&u).unwrap();
    u.light_count = 3;
    u.cam_pos = [1.0, -6.0, -15.0, 1.0];
    u.lights[2].colour = [0.5, 0.25, 1.0, 1.0];
    orch.render_frame(&u).unwrap();

    assert!(device
        .commands()
        .iter()
        .any(|(_, c)| matches!(c, Cmd::UpdateBuffer { len: 352, .. })));
    let back = orch.read_scene_uniform().unwrap();
    assert_eq!(back.len(), 352);
    assert_eq!(back.as_slice(), bytemuck::bytes_of(&u));
}

#[test]
fn technique_selects_composition_pipeline_and_uniform_flag() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let pbr_pipeline = device
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::CreatePipeline { id, name, .. } if name == "composition.pbr" => Some(id),
            _ => None,
        })
        .unwrap();
    orch.set_technique(Technique::Pbr);
    device.clear_events();
    let u = SceneUniform::default();
    orch.render_frame(&u).unwrap();
    assert!(device
        .commands()
        .iter()
        .any(|(_, c)| *c == Cmd::BindPipeline { pipeline: pbr_pipeline }));
    let back = orch.read_scene_uniform().unwrap();
    let flag = bytemuck::pod_read_unaligned::<SceneUniform>(&back).technique;
    assert_eq!(flag, Technique::Pbr.code());
}

#[test]
fn loaded_scene_draws_each_material_run_with_bracketed_uploads() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let (mesh, materials) = cube_scene();
    orch.load_scene(&mesh, &materials).unwrap();
    let u = uniform(&orch);
    device.clear_events();
    orch.render_frame(&u).unwrap();

    let ops: Vec<Cmd> = device.commands().into_iter().map(|(_, c)| c).collect();
    let draws: Vec<&Cmd> = ops.iter().filter(|o| matches!(o, Cmd::Draw { .. })).collect();
    assert_eq!(
        draws,
        vec![
            &Cmd::Draw { vertex_count: 6, first_vertex: 0 },
            &Cmd::Draw { vertex_count: 6, first_vertex: 6 },
            &Cmd::Draw { vertex_count: 3, first_vertex: 0 },
        ]
    );
    let mut updates = 0;
    for (i, op) in ops.iter().enumerate() {
        if let Cmd::UpdateBuffer { buffer, .. } = op {
            updates += 1;
            assert!(matches!(&ops[i - 1], Cmd::BufferBarrier { buffer: b, .. } if b == buffer));
            assert!(matches!(&ops[i + 1], Cmd::BufferBarrier { buffer: b, .. } if b == buffer));
        }
    }
    // scene uniform plus one per material
    assert_eq!(updates, 3);
    let first_pass = ops.iter().position(|o| matches!(o, Cmd::BeginPass { .. })).unwrap();
    let last_update = ops
        .iter()
        .rposition(|o| matches!(o, Cmd::UpdateBuffer { .. }))
        .unwrap();
    assert!(last_update < first_pass);
}

#[test]
fn slots_are_reused_only_after_their_fence_signalled() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    for _ in 0..7 {
        orch.render_frame(&u).unwrap();
    }
    let mut fence_of_cmd: HashMap<Id, Id> = HashMap::new();
    let mut outstanding: HashSet<Id> = HashSet::new();
    let mut begins = 0;
    for e in device.events() {
        match e {
            Event::Submit {
                cmd,
                fence: Some(f),
                ..
            } => {
                fence_of_cmd.insert(cmd, f);
                outstanding.insert(f);
            }
            Event::WaitFence {
                fence,
                signaled: true,
            } => {
                outstanding.remove(&fence);
            }
            Event::Cmd { cmd, op: Cmd::Begin } => {
                begins += 1;
                if let Some(f) = fence_of_cmd.get(&cmd) {
                    assert!(!outstanding.contains(f), "slot re-recorded while in flight");
                }
            }
            _ => {}
        }
    }
    assert_eq!(begins, 7);
}

#[test]
fn zero_extent_pauses_until_the_window_returns() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    orch.resize(Extent2D::new(0, 0));
    device.clear_events();
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Paused);
    assert!(device.events().is_empty());

    orch.resize(HD);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
}

#[test]
fn shutdown_cancels_without_touching_the_gpu() {
    let device = MockDevice::new();
    let shutdown = ShutdownSignal::new();
    let mut orch = FrameOrchestrator::new(
        device.clone(),
        HD,
        &TestShaders,
        FrameConfig::default(),
        shutdown.clone(),
    )
    .unwrap();
    let u = uniform(&orch);
    device.clear_events();
    shutdown.request();
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Cancelled);
    assert_eq!(device.count(|e| matches!(e, Event::Acquire { .. })), 0);
}

#[test]
fn device_loss_on_submit_is_fatal() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.fail_on("queue_submit", Failure::DeviceLost);
    let err = orch.render_frame(&u).unwrap_err();
    assert!(err.is_device_lost());
    assert_eq!(err.operation(), "queue_submit");
    assert_eq!(device.count(|e| matches!(e, Event::Present { .. })), 0);
}

#[test]
fn teardown_drains_the_queue_first() {
    let (device, orch) = orchestrator(FrameConfig::default());
    device.clear_events();
    drop(orch);
    let events = device.events();
    assert_eq!(events.first(), Some(&Event::WaitIdle));
    assert!(events.iter().any(|e| matches!(e, Event::Destroy { kind: "swapchain", .. })));
}

#[test]
fn acquire_timeout_hands_control_back_after_one_attempt() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.clear_events();
    device.script_acquire([AcquireResult::Timeout]);

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::TimedOut);
    assert_eq!(device.count(|e| matches!(e, Event::Acquire { .. })), 1);
    assert_eq!(device.count(|e| matches!(e, Event::WaitFence { .. })), 0);
    assert!(device.commands().is_empty());

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
    assert_eq!(device.count(|e| matches!(e, Event::Acquire { .. })), 2);
}

#[test]
fn fence_timeout_keeps_the_image_for_the_next_call() {
    let (device, mut orch) = orchestrator(FrameConfig::default());
    let u = uniform(&orch);
    device.clear_events();
    device.state().fence_timeouts = 1;

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::TimedOut);
    assert_eq!(device.count(|e| matches!(e, Event::Acquire { .. })), 1);
    assert_eq!(device.count(|e| matches!(e, Event::Submit { .. })), 0);

    // a resize in between waits until the held image has been presented
    orch.resize(FULL_HD);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
    assert_eq!(device.count(|e| matches!(e, Event::Acquire { .. })), 1);
    assert_eq!(device.count(|e| matches!(e, Event::RecreateSwapchain { .. })), 0);
    let presented: Vec<u32> = device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Present { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(presented, vec![0]);

    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
    assert_eq!(orch.extent(), FULL_HD);
}

#[test]
fn forward_post_samples_colour_and_depth_of_the_scene_pass() {
    let (device, orch) = orchestrator(forward_post());
    assert_eq!(orch.path(), RenderPath::ForwardPost);
    let images = image_ids(&device);
    let (colour, depth) = (images["scene.colour"], images["scene.depth"]);

    let bound = device
        .events()
        .into_iter()
        .rev()
        .find_map(|e| match e {
            Event::WriteImageDescriptors { set, bindings } if set == orch.sampled_set.id => {
                Some(bindings)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(bound, vec![(0, colour), (1, depth)]);

    let depth_image = orch.attachments.plan_image(orch.plans[SCENE_PASS], 1).unwrap();
    assert_eq!(depth_image.id, depth);
    assert_eq!(
        depth_image.usage,
        ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED
    );

    let pipelines: Vec<String> = device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::CreatePipeline { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(pipelines, vec!["forward", "post"]);
}

#[test]
fn forward_post_fences_the_depth_read_with_an_explicit_barrier() {
    let (device, mut orch) = orchestrator(forward_post());
    let depth = image_ids(&device)["scene.depth"];
    let u = uniform(&orch);
    device.clear_events();
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);

    let ops: Vec<Cmd> = device.commands().into_iter().map(|(_, c)| c).collect();
    let begins: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, o)| matches!(o, Cmd::BeginPass { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(begins.len(), 2);
    let barriers: Vec<(usize, Id, ImageBarrier)> = ops
        .iter()
        .enumerate()
        .filter_map(|(i, o)| match o {
            Cmd::ImageBarrier { image, barrier } => Some((i, *image, *barrier)),
            _ => None,
        })
        .collect();
    assert_eq!(barriers.len(), 1, "only depth lacks a covering dependency");
    let (at, image, barrier) = barriers[0];
    assert_eq!(image, depth);
    assert!(begins[0] < at && at < begins[1]);
    assert_eq!(barrier.src_access, AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);
    assert_eq!(barrier.dst_access, AccessFlags::SHADER_READ);
    assert!(ops.contains(&Cmd::Draw {
        vertex_count: 3,
        first_vertex: 0
    }));
}

#[test]
fn forward_post_rebuilds_on_resize_and_keeps_one_screen_pipeline() {
    let (device, mut orch) = orchestrator(forward_post());
    let u = uniform(&orch);
    device.clear_events();
    orch.resize(FULL_HD);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
    assert_eq!(pipeline_extents(&device), vec![FULL_HD; 2]);
    assert_eq!(device.count(|e| matches!(e, Event::CreateImage { .. })), 2);

    // the descriptor set now points at the reallocated targets
    let images = image_ids(&device);
    assert!(device.events().iter().any(|e| matches!(
        e,
        Event::WriteImageDescriptors { bindings, .. }
            if *bindings == vec![(0, images["scene.colour"]), (1, images["scene.depth"])]
    )));

    orch.set_technique(Technique::Pbr);
    assert_eq!(orch.render_frame(&u).unwrap(), FrameStatus::Presented);
}

#[test]
fn sampled_inputs_resolve_through_the_producer_plan() {
    let (_device, orch) = orchestrator(FrameConfig::default());
    let link = orch.graph.links()[2];
    let image = sampled_image(&orch.attachments, &orch.plans, &link).unwrap();
    assert_eq!(image.id, orch.attachments.plan_image(orch.plans[SCENE_PASS], 2).unwrap().id);

    let mut stray = link;
    stray.input.producer = 5;
    assert!(matches!(
        sampled_image(&orch.attachments, &orch.plans, &stray),
        Err(FrameError::Build { .. })
    ));
    stray.input.producer = SCREEN_PASS;
    assert!(sampled_image(&orch.attachments, &orch.plans, &stray).is_err());
}
