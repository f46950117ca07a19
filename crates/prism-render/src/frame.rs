// SPDX-License-Identifier: CEPL-1.0
//! The per-frame loop: acquire, wait, record, submit, present.
//!
//! A rebuild request (resize, stale acquire or stale present) is honoured
//! at the start of the next frame after draining the queue. What gets
//! rebuilt depends on what the new swapchain changed:
//!
//! | change       | passes | pipelines           | attachments | framebuffers |
//! |--------------|--------|---------------------|-------------|--------------|
//! | none         |        |                     |             | yes          |
//! | size         |        | if viewport baked   | yes         | yes          |
//! | format       | yes    | yes                 | yes         | yes          |
use crate::attachments::{
    AttachmentResources, AttachmentRole, FramebufferPlan, FramebufferTarget, PlanId,
};
use crate::batch::{split_by_material, MaterialDesc, MeshBatch, MeshSource};
use crate::device::{Device, GpuBuffer};
use crate::error::{FrameError, Result};
use crate::graph::{InputLink, PassGraph};
use crate::layout::{
    material_set_layout, scene_set_layout, screen_clears, RenderPath, SCENE_PASS, SCREEN_PASS,
};
use crate::pass::build_pass;
use crate::pipeline::{build_pipeline, Pipeline, ShaderPair, ShaderSource, ViewportMode};
use crate::recorder::{record, DrawList, PassRecording, UniformUpload};
use crate::staging::{StagingPool, StagingPurpose};
use crate::surface::{AcquireStatus, PresentStatus, SurfaceAndSwapchain, VsyncMode};
use crate::sync::{FrameSynchronizer, SlotWait};
use crate::technique::Technique;
use crate::types::{BufferUsage, Extent2D, Format, PipelineStages};
use crate::uniform::{MaterialUniform, SceneUniform};
use prism_core::ShutdownSignal;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameConfig {
    pub vsync: VsyncMode,
    pub viewport: ViewportMode,
    /// Bound on each acquire and fence wait.
    pub timeout: Duration,
    pub clear_color: [f32; 4],
    pub technique: Technique,
    /// Fixed for the orchestrator's lifetime.
    pub path: RenderPath,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            vsync: VsyncMode::Fifo,
            viewport: ViewportMode::Baked,
            timeout: DEFAULT_TIMEOUT,
            clear_color: DEFAULT_CLEAR_COLOR,
            technique: Technique::default(),
            path: RenderPath::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The acquired image was stale; the swapchain was rebuilt instead.
    Skipped,
    /// The surface has zero area.
    Paused,
    /// An acquire or fence wait hit the timeout. Nothing was submitted;
    /// the next call picks up where this one stopped.
    TimedOut,
    Cancelled,
}

struct SceneResources<D: Device> {
    positions: D::Buffer,
    normals: D::Buffer,
    batches: Vec<MeshBatch>,
    material_data: Vec<MaterialUniform>,
    material_buffers: Vec<D::Buffer>,
    material_sets: Vec<D::DescriptorSet>,
}

impl From<&MaterialDesc> for MaterialUniform {
    fn from(m: &MaterialDesc) -> Self {
        let v4 = |v: [f32; 3]| [v[0], v[1], v[2], 1.0];
        Self {
            emissive: v4(m.emissive),
            albedo: v4(m.albedo),
            specular: v4(m.specular),
            shininess: m.shininess,
            metalness: m.metalness,
            _pad: [0.0; 2],
        }
    }
}

pub struct FrameOrchestrator<D: Device> {
    device: D,
    config: FrameConfig,
    shutdown: ShutdownSignal,
    requested_extent: Extent2D,

    surface: SurfaceAndSwapchain<D>,
    depth_format: Format,
    graph: PassGraph<D>,
    scene_shaders: ShaderPair,
    screen_shaders: Vec<ShaderPair>,
    scene_pipeline: Pipeline<D>,
    /// Indexed by [`RenderPath::screen_slot`].
    screen_pipelines: Vec<Pipeline<D>>,

    attachments: AttachmentResources<D>,
    /// Indexed by pass.
    plans: Vec<PlanId>,

    scene_buffer: D::Buffer,
    scene_set: D::DescriptorSet,
    sampled_set: D::DescriptorSet,
    scene: Option<SceneResources<D>>,

    sync: FrameSynchronizer<D>,
    staging: StagingPool<D>,
    /// Image acquired by a frame whose fence wait timed out.
    pending: Option<usize>,
}

fn build_graph<D: Device>(
    device: &D,
    path: RenderPath,
    surface_format: Format,
    depth_format: Format,
) -> Result<PassGraph<D>> {
    let passes = vec![
        build_pass(device, path.scene_pass(depth_format))?,
        build_pass(device, path.screen_pass(surface_format))?,
    ];
    PassGraph::build(passes, &path.sampled_inputs())
}

/// The image a sampled input reads: slot `attachment` of the producer's
/// framebuffer plan.
fn sampled_image<'a, D: Device>(
    attachments: &'a AttachmentResources<D>,
    plans: &[PlanId],
    link: &InputLink,
) -> Result<&'a D::Image> {
    let plan = plans.get(link.input.producer).copied().ok_or_else(|| {
        FrameError::build(
            "attachment_image",
            format!("pass {} has no framebuffer plan", link.input.producer),
        )
    })?;
    attachments.plan_image(plan, link.input.attachment)
}

impl<D: Device> FrameOrchestrator<D> {
    pub fn new(
        device: D,
        extent: Extent2D,
        shaders: &dyn ShaderSource,
        config: FrameConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        if extent.is_empty() {
            return Err(FrameError::build("create_swapchain", "surface has zero extent"));
        }
        let path = config.path;
        let surface = SurfaceAndSwapchain::new(&device, extent, config.vsync)?;
        let extent = surface.extent();
        let depth_format = device.depth_format();
        let graph = build_graph(&device, path, surface.format(), depth_format)?;

        let scene_shaders = path.scene_shaders(shaders)?;
        let screen_shaders = path.screen_shaders(shaders)?;

        let scene_pass = graph
            .pass(SCENE_PASS)
            .ok_or_else(|| FrameError::build("create_framebuffer", "pass graph is incomplete"))?;
        let mut attachments = AttachmentResources::new(extent);
        let scene_targets = scene_pass
            .desc()
            .attachments
            .iter()
            .map(|a| {
                let role = if a.format.is_depth() {
                    AttachmentRole::Depth {
                        sampled: a.sampled_later,
                    }
                } else {
                    AttachmentRole::Color {
                        sampled: a.sampled_later,
                    }
                };
                FramebufferTarget::Attachment(attachments.declare(a.name.clone(), a.format, role))
            })
            .collect();
        let plans = vec![
            attachments.plan(FramebufferPlan {
                targets: scene_targets,
            }),
            attachments.plan(FramebufferPlan {
                targets: vec![FramebufferTarget::Swapchain],
            }),
        ];
        {
            let passes: Vec<_> = graph.passes().iter().collect();
            attachments.rebuild_all(&device, extent, &passes, surface.raw())?;
        }

        let scene_buffer = device.create_buffer(
            std::mem::size_of::<SceneUniform>() as u64,
            BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC,
            false,
        )?;
        let scene_set = device.create_descriptor_set(&scene_set_layout())?;
        device.write_uniform_descriptor(&scene_set, 0, &scene_buffer);
        let sampled_set = device.create_descriptor_set(&path.sampled_set_layout())?;

        let sync = FrameSynchronizer::new(&device, surface.image_count(), config.timeout)?;

        let (scene_pipeline, screen_pipelines) = Self::build_pipelines(
            &device,
            &graph,
            path,
            &scene_shaders,
            &screen_shaders,
            config.viewport,
            extent,
        )?;

        let this = Self {
            staging: StagingPool::new(config.timeout),
            device,
            config,
            shutdown,
            requested_extent: extent,
            surface,
            depth_format,
            graph,
            scene_shaders,
            screen_shaders,
            scene_pipeline,
            screen_pipelines,
            attachments,
            plans,
            scene_buffer,
            scene_set,
            sampled_set,
            scene: None,
            sync,
            pending: None,
        };
        this.write_sampled_descriptors()?;
        info!(
            "frame pipeline ready: {} path, {} at {}, depth {:?}, {:?} viewport, {} frame slots",
            path,
            this.config.technique,
            extent,
            depth_format,
            this.config.viewport,
            this.sync.slot_count()
        );
        Ok(this)
    }

    fn build_pipelines(
        device: &D,
        graph: &PassGraph<D>,
        path: RenderPath,
        scene: &ShaderPair,
        screen: &[ShaderPair],
        viewport: ViewportMode,
        extent: Extent2D,
    ) -> Result<(Pipeline<D>, Vec<Pipeline<D>>)> {
        let (Some(scene_pass), Some(screen_pass)) =
            (graph.pass(SCENE_PASS), graph.pass(SCREEN_PASS))
        else {
            return Err(FrameError::build("build_pipeline", "pass graph is incomplete"));
        };
        let s = build_pipeline(
            device,
            scene_pass,
            path.scene_pipeline(scene.clone(), viewport),
            extent,
        )?;
        let p = path
            .screen_pipelines(screen, viewport)
            .into_iter()
            .map(|desc| build_pipeline(device, screen_pass, desc, extent))
            .collect::<Result<Vec<_>>>()?;
        Ok((s, p))
    }

    fn rebuild_pipelines(&mut self) -> Result<()> {
        let (s, p) = Self::build_pipelines(
            &self.device,
            &self.graph,
            self.config.path,
            &self.scene_shaders,
            &self.screen_shaders,
            self.config.viewport,
            self.surface.extent(),
        )?;
        self.scene_pipeline = s;
        self.screen_pipelines = p;
        Ok(())
    }

    /// Points the screen pass's sampled set at the current scene targets,
    /// one binding per sampled input.
    fn write_sampled_descriptors(&self) -> Result<()> {
        let mut bindings = Vec::new();
        for link in self.graph.links() {
            if link.input.consumer != SCREEN_PASS {
                continue;
            }
            let image = sampled_image(&self.attachments, &self.plans, link)?;
            bindings.push((link.input.binding, image));
        }
        self.device
            .write_image_descriptors(&self.sampled_set, &bindings);
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn extent(&self) -> Extent2D {
        self.surface.extent()
    }

    pub fn surface_format(&self) -> Format {
        self.surface.format()
    }

    pub fn depth_format(&self) -> Format {
        self.depth_format
    }

    pub fn path(&self) -> RenderPath {
        self.config.path
    }

    pub fn technique(&self) -> Technique {
        self.config.technique
    }

    pub fn set_technique(&mut self, technique: Technique) {
        if technique != self.config.technique {
            info!("shading technique: {technique}");
            self.config.technique = technique;
        }
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.config.clear_color = color;
    }

    pub fn set_vsync(&mut self, vsync: VsyncMode) {
        if vsync != self.surface.vsync() {
            self.surface.set_vsync(vsync);
            self.sync.request_recreate();
        }
    }

    pub fn needs_recreate(&self) -> bool {
        self.sync.needs_recreate()
    }

    /// Records the new window size; the rebuild happens on the next frame.
    pub fn resize(&mut self, extent: Extent2D) {
        if extent == self.requested_extent {
            return;
        }
        debug!("resize requested: {} -> {}", self.requested_extent, extent);
        self.requested_extent = extent;
        if !extent.is_empty() {
            self.sync.request_recreate();
        }
    }

    /// Replaces the drawable geometry and its materials.
    pub fn load_scene(&mut self, mesh: &MeshSource, materials: &[MaterialDesc]) -> Result<()> {
        let batches = split_by_material(mesh, materials.len())?;
        self.device.wait_idle()?;
        self.scene = None;
        if batches.is_empty() {
            return Ok(());
        }

        let positions = self.staging.upload(
            &self.device,
            StagingPurpose::VertexPositions,
            mesh.position_bytes(),
            BufferUsage::VERTEX,
            &self.shutdown,
        )?;
        let normals = self.staging.upload(
            &self.device,
            StagingPurpose::VertexNormals,
            mesh.normal_bytes(),
            BufferUsage::VERTEX,
            &self.shutdown,
        )?;

        let mut material_buffers = Vec::with_capacity(materials.len());
        let mut material_sets = Vec::with_capacity(materials.len());
        for _ in materials {
            let buffer = self.device.create_buffer(
                std::mem::size_of::<MaterialUniform>() as u64,
                BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
                false,
            )?;
            let set = self.device.create_descriptor_set(&material_set_layout())?;
            self.device.write_uniform_descriptor(&set, 0, &buffer);
            material_buffers.push(buffer);
            material_sets.push(set);
        }

        info!(
            "scene loaded: {} vertices, {} materials, {} draws",
            mesh.vertex_count(),
            materials.len(),
            batches.len()
        );
        self.scene = Some(SceneResources {
            positions,
            normals,
            batches,
            material_data: materials.iter().map(MaterialUniform::from).collect(),
            material_buffers,
            material_sets,
        });
        Ok(())
    }

    /// Drains the queue and rebuilds whatever the new swapchain invalidated.
    pub fn recreate(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.pending = None;
        let changes = self.surface.recreate(&self.device, self.requested_extent)?;
        let extent = self.surface.extent();

        if changes.format_changed {
            info!("surface format changed to {:?}, rebuilding passes", self.surface.format());
            self.graph = build_graph(
                &self.device,
                self.config.path,
                self.surface.format(),
                self.depth_format,
            )?;
        }
        if changes.format_changed
            || (changes.size_changed && self.config.viewport == ViewportMode::Baked)
        {
            self.rebuild_pipelines()?;
        }
        {
            let passes: Vec<_> = self.graph.passes().iter().collect();
            if changes.any() {
                self.attachments
                    .rebuild_all(&self.device, extent, &passes, self.surface.raw())?;
            } else {
                self.attachments
                    .rebuild_framebuffers(&self.device, &passes, self.surface.raw())?;
            }
        }
        if changes.any() {
            self.write_sampled_descriptors()?;
        }
        self.sync.rebuild(&self.device, self.surface.image_count())?;
        Ok(())
    }

    /// Renders and presents one frame.
    ///
    /// Every wait is a single bounded attempt. When the fence wait of an
    /// acquired image times out, that image is kept and the next call
    /// resumes with it; a pending rebuild waits until it has been presented.
    pub fn render_frame(&mut self, uniform: &SceneUniform) -> Result<FrameStatus> {
        if self.shutdown.is_requested() {
            return Ok(FrameStatus::Cancelled);
        }
        if self.requested_extent.is_empty() {
            return Ok(FrameStatus::Paused);
        }

        let index = match self.pending.take() {
            Some(index) => index,
            None => {
                if self.sync.take_recreate() {
                    self.recreate()?;
                }
                let status = self.surface.acquire_frame(
                    &self.device,
                    self.sync.acquire_semaphore(),
                    self.config.timeout,
                    &self.shutdown,
                )?;
                match status {
                    AcquireStatus::Acquired { index } => index as usize,
                    AcquireStatus::Stale { suboptimal } => {
                        debug!("skipping frame, stale swapchain (suboptimal: {suboptimal})");
                        self.recreate()?;
                        return Ok(FrameStatus::Skipped);
                    }
                    AcquireStatus::TimedOut => return Ok(FrameStatus::TimedOut),
                    AcquireStatus::Cancelled => return Ok(FrameStatus::Cancelled),
                }
            }
        };

        match self.sync.begin_recording(&self.device, index, &self.shutdown)? {
            SlotWait::Ready => {}
            SlotWait::TimedOut => {
                debug!("image {index} held until its slot's fence signals");
                self.pending = Some(index);
                return Ok(FrameStatus::TimedOut);
            }
            SlotWait::Cancelled => return Ok(FrameStatus::Cancelled),
        }
        self.record_frame(index, uniform)?;
        self.sync.submit(&self.device, index)?;

        let present = self.surface.present(
            &self.device,
            index as u32,
            self.sync.render_finished(index)?,
        )?;
        self.sync.mark_presented(index, present)?;
        if present == PresentStatus::Stale {
            debug!("present reported a stale swapchain");
        }
        Ok(FrameStatus::Presented)
    }

    fn record_frame(&mut self, index: usize, uniform: &SceneUniform) -> Result<()> {
        let mut scene_uniform = *uniform;
        scene_uniform.technique = self.config.technique.code();
        let extent = self.surface.extent();

        let mut uploads = vec![UniformUpload::<D> {
            name: "scene",
            buffer: &self.scene_buffer,
            data: scene_uniform.as_bytes(),
            consumers: PipelineStages::VERTEX_SHADER | PipelineStages::FRAGMENT_SHADER,
        }];
        if let Some(scene) = &self.scene {
            for (buffer, data) in scene.material_buffers.iter().zip(&scene.material_data) {
                uploads.push(UniformUpload {
                    name: "material",
                    buffer,
                    data: data.as_bytes(),
                    consumers: PipelineStages::FRAGMENT_SHADER,
                });
            }
        }

        let (Some(scene_pass), Some(screen_pass)) =
            (self.graph.pass(SCENE_PASS), self.graph.pass(SCREEN_PASS))
        else {
            return Err(FrameError::command("record", "pass graph is incomplete"));
        };
        let path = self.config.path;
        let screen = self
            .screen_pipelines
            .get(path.screen_slot(self.config.technique))
            .ok_or_else(|| FrameError::command("record", "no pipeline for technique"))?;

        let mut barriers = Vec::new();
        for (link, barrier) in self.graph.barriers_before(SCREEN_PASS) {
            barriers.push((sampled_image(&self.attachments, &self.plans, &link)?, barrier));
        }

        let scene_clears = path.scene_clears(self.config.clear_color);
        let screen_clears = screen_clears(self.config.clear_color);
        let draws = match &self.scene {
            Some(s) => DrawList::Batches {
                positions: &s.positions,
                normals: &s.normals,
                batches: &s.batches,
                material_sets: &s.material_sets,
            },
            None => DrawList::Nothing,
        };
        let passes = [
            PassRecording {
                pass: scene_pass,
                framebuffer: self.attachments.framebuffer(self.plans[SCENE_PASS], index)?,
                pipeline: &self.scene_pipeline,
                extent,
                clears: &scene_clears,
                sets: vec![&self.scene_set],
                draws,
                barriers_before: Vec::new(),
            },
            PassRecording {
                pass: screen_pass,
                framebuffer: self.attachments.framebuffer(self.plans[SCREEN_PASS], index)?,
                pipeline: screen,
                extent,
                clears: &screen_clears,
                sets: vec![&self.scene_set, &self.sampled_set],
                draws: DrawList::FullScreen,
                barriers_before: barriers,
            },
        ];

        let cmd = self.sync.command_buffer(index)?;
        record(cmd, &uploads, &passes)
    }

    /// Reads the scene uniform back from GPU memory once all work is done.
    pub fn read_scene_uniform(&mut self) -> Result<Vec<u8>> {
        self.device.wait_idle()?;
        let size = self.scene_buffer.size();
        self.staging
            .download(&self.device, 0, &self.scene_buffer, size, &self.shutdown)
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl<D: Device> Drop for FrameOrchestrator<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle before teardown failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
