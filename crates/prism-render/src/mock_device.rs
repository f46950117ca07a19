// SPDX-License-Identifier: CEPL-1.0
//! Mock device for tests (no GPU required).
//!
//! Every call is appended to a shared event log. Submitted command buffers
//! are "executed" immediately: buffer updates and copies land in the mock's
//! memory, and the submission fence becomes signalled on the next wait.
use crate::device::{
    AcquireResult, CommandEncoder, Device, FramebufferAttachment, GpuBuffer, GpuImage,
    ImageDesc, PresentResult, SubmitInfo, SwapchainImages,
};
use crate::error::{FrameError, Result};
use crate::pass::PassDesc;
use crate::pipeline::PipelineDesc;
use crate::surface::SwapchainRequest;
use crate::types::{
    BufferBarrier, BufferUsage, ClearValue, Extent2D, Format, ImageBarrier, ImageUsage,
    SetLayoutDesc,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub type Id = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum Cmd {
    Begin,
    End,
    BufferBarrier { buffer: Id, barrier: BufferBarrier },
    ImageBarrier { image: Id, barrier: ImageBarrier },
    UpdateBuffer { buffer: Id, offset: u64, len: usize },
    CopyBuffer { src: Id, dst: Id, size: u64 },
    BeginPass { pass: Id, framebuffer: Id, extent: Extent2D },
    EndPass,
    BindPipeline { pipeline: Id },
    SetViewport { extent: Extent2D },
    BindSet { index: u32, set: Id },
    BindVertexBuffers { first: u32, buffers: Vec<Id> },
    Draw { vertex_count: u32, first_vertex: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    CreateSwapchain { id: Id, extent: Extent2D, format: Format, images: Vec<Id> },
    RecreateSwapchain { id: Id, extent: Extent2D, format: Format, images: Vec<Id> },
    CreateImage { id: Id, name: String, extent: Extent2D, usage: ImageUsage },
    CreateRenderPass { id: Id, name: String },
    CreatePipeline { id: Id, name: String, extent: Extent2D },
    CreateFramebuffer { id: Id, attachments: Vec<Id>, extent: Extent2D },
    CreateBuffer { id: Id, size: u64, usage: BufferUsage },
    CreateSet { id: Id },
    CreateFence { id: Id, signaled: bool },
    CreateSemaphore { id: Id },
    CreateCommandBuffer { id: Id },
    WriteImageDescriptors { set: Id, bindings: Vec<(u32, Id)> },
    WriteUniformDescriptor { set: Id, binding: u32, buffer: Id },
    Destroy { id: Id, kind: &'static str },
    Acquire { result: AcquireResult, semaphore: Id },
    WaitFence { fence: Id, signaled: bool },
    ResetFence { fence: Id },
    Cmd { cmd: Id, op: Cmd },
    Submit { cmd: Id, wait: Option<Id>, signal: Option<Id>, fence: Option<Id> },
    Present { index: u32, wait: Id, result: PresentResult },
    WaitIdle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    DeviceLost,
    Status(&'static str),
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: bool,
    pending: bool,
}

#[derive(Debug)]
pub struct MockState {
    next_id: Id,
    pub events: Vec<Event>,
    pub surface_format: Format,
    pub depth_format: Format,
    pub image_count: usize,
    pub acquire_script: VecDeque<AcquireResult>,
    pub present_script: VecDeque<PresentResult>,
    /// Number of upcoming fence waits that report a timeout.
    pub fence_timeouts: u32,
    failures: HashMap<&'static str, Failure>,
    buffers: HashMap<Id, Vec<u8>>,
    fences: HashMap<Id, FenceState>,
    next_image: u32,
}

impl MockState {
    fn id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, op: &'static str) -> Result<()> {
        match self.failures.remove(op) {
            None => Ok(()),
            Some(Failure::DeviceLost) => Err(FrameError::DeviceLost { op }),
            Some(Failure::Status(s)) => Err(FrameError::build(op, s)),
        }
    }
}

type Shared = Rc<RefCell<MockState>>;

macro_rules! mock_handle {
    ($name:ident, $kind:literal) => {
        #[derive(Debug)]
        pub struct $name {
            pub id: Id,
            state: Shared,
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.state.borrow_mut().events.push(Event::Destroy {
                    id: self.id,
                    kind: $kind,
                });
            }
        }
    };
}

mock_handle!(MockRenderPass, "render_pass");
mock_handle!(MockPipeline, "pipeline");
mock_handle!(MockFramebuffer, "framebuffer");
mock_handle!(MockDescriptorSet, "descriptor_set");
mock_handle!(MockFence, "fence");
mock_handle!(MockSemaphore, "semaphore");

#[derive(Debug)]
pub struct MockImage {
    pub id: Id,
    pub extent: Extent2D,
    pub format: Format,
    pub usage: ImageUsage,
    state: Shared,
}

impl GpuImage for MockImage {
    fn extent(&self) -> Extent2D {
        self.extent
    }
    fn format(&self) -> Format {
        self.format
    }
}

impl Drop for MockImage {
    fn drop(&mut self) {
        self.state.borrow_mut().events.push(Event::Destroy {
            id: self.id,
            kind: "image",
        });
    }
}

#[derive(Debug)]
pub struct MockBuffer {
    pub id: Id,
    pub size: u64,
    pub host_visible: bool,
    state: Shared,
}

impl GpuBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        let mut s = self.state.borrow_mut();
        s.buffers.remove(&self.id);
        s.events.push(Event::Destroy {
            id: self.id,
            kind: "buffer",
        });
    }
}

#[derive(Debug)]
pub struct MockSwapchain {
    pub id: Id,
    pub extent: Extent2D,
    pub format: Format,
    pub images: Vec<Id>,
    state: Shared,
}

impl SwapchainImages for MockSwapchain {
    fn format(&self) -> Format {
        self.format
    }
    fn extent(&self) -> Extent2D {
        self.extent
    }
    fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for MockSwapchain {
    fn drop(&mut self) {
        self.state.borrow_mut().events.push(Event::Destroy {
            id: self.id,
            kind: "swapchain",
        });
    }
}

#[derive(Debug)]
enum Op {
    Update { buffer: Id, offset: u64, data: Vec<u8> },
    Copy { src: Id, dst: Id, size: u64 },
}

#[derive(Debug)]
pub struct MockCommandBuffer {
    pub id: Id,
    ops: Vec<Op>,
    recording: bool,
    state: Shared,
}

impl MockCommandBuffer {
    fn log(&self, op: Cmd) {
        self.state
            .borrow_mut()
            .events
            .push(Event::Cmd { cmd: self.id, op });
    }
}

impl Drop for MockCommandBuffer {
    fn drop(&mut self) {
        self.state.borrow_mut().events.push(Event::Destroy {
            id: self.id,
            kind: "command_buffer",
        });
    }
}

impl CommandEncoder<MockDevice> for MockCommandBuffer {
    fn begin(&mut self) -> Result<()> {
        self.state.borrow_mut().check("begin_command_buffer")?;
        self.ops.clear();
        self.recording = true;
        self.log(Cmd::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.state.borrow_mut().check("end_command_buffer")?;
        if !self.recording {
            return Err(FrameError::command("end_command_buffer", "not recording"));
        }
        self.recording = false;
        self.log(Cmd::End);
        Ok(())
    }

    fn buffer_barrier(&mut self, buffer: &MockBuffer, barrier: BufferBarrier) {
        self.log(Cmd::BufferBarrier {
            buffer: buffer.id,
            barrier,
        });
    }

    fn image_barrier(&mut self, image: &MockImage, barrier: ImageBarrier) {
        self.log(Cmd::ImageBarrier {
            image: image.id,
            barrier,
        });
    }

    fn update_buffer(&mut self, buffer: &MockBuffer, offset: u64, data: &[u8]) {
        self.ops.push(Op::Update {
            buffer: buffer.id,
            offset,
            data: data.to_vec(),
        });
        self.log(Cmd::UpdateBuffer {
            buffer: buffer.id,
            offset,
            len: data.len(),
        });
    }

    fn copy_buffer(&mut self, src: &MockBuffer, dst: &MockBuffer, size: u64) {
        self.ops.push(Op::Copy {
            src: src.id,
            dst: dst.id,
            size,
        });
        self.log(Cmd::CopyBuffer {
            src: src.id,
            dst: dst.id,
            size,
        });
    }

    fn begin_pass(
        &mut self,
        pass: &MockRenderPass,
        framebuffer: &MockFramebuffer,
        extent: Extent2D,
        _clears: &[ClearValue],
    ) {
        self.log(Cmd::BeginPass {
            pass: pass.id,
            framebuffer: framebuffer.id,
            extent,
        });
    }

    fn end_pass(&mut self) {
        self.log(Cmd::EndPass);
    }

    fn bind_pipeline(&mut self, pipeline: &MockPipeline) {
        self.log(Cmd::BindPipeline {
            pipeline: pipeline.id,
        });
    }

    fn set_viewport(&mut self, extent: Extent2D) {
        self.log(Cmd::SetViewport { extent });
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &MockPipeline,
        index: u32,
        set: &MockDescriptorSet,
    ) {
        self.log(Cmd::BindSet { index, set: set.id });
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[&MockBuffer]) {
        self.log(Cmd::BindVertexBuffers {
            first: first_binding,
            buffers: buffers.iter().map(|b| b.id).collect(),
        });
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        self.log(Cmd::Draw {
            vertex_count,
            first_vertex,
        });
    }
}

#[derive(Clone, Debug)]
pub struct MockDevice {
    state: Shared,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                next_id: 0,
                events: Vec::new(),
                surface_format: Format::B8G8R8A8_SRGB,
                depth_format: Format::D32_SFLOAT,
                image_count: 3,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                fence_timeouts: 0,
                failures: HashMap::new(),
                buffers: HashMap::new(),
                fences: HashMap::new(),
                next_image: 0,
            })),
        }
    }

    pub fn state(&self) -> std::cell::RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| pred(e)).count()
    }

    /// Commands recorded since the last `clear_events`, in order.
    pub fn commands(&self) -> Vec<(Id, Cmd)> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Cmd { cmd, op } => Some((*cmd, op.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn fail_on(&self, op: &'static str, failure: Failure) {
        self.state.borrow_mut().failures.insert(op, failure);
    }

    pub fn script_acquire(&self, results: impl IntoIterator<Item = AcquireResult>) {
        self.state.borrow_mut().acquire_script.extend(results);
    }

    pub fn script_present(&self, results: impl IntoIterator<Item = PresentResult>) {
        self.state.borrow_mut().present_script.extend(results);
    }

    pub fn buffer_contents(&self, buffer: &MockBuffer) -> Vec<u8> {
        self.state
            .borrow()
            .buffers
            .get(&buffer.id)
            .cloned()
            .unwrap_or_default()
    }

    fn fresh_images(&self, count: usize) -> Vec<Id> {
        let mut s = self.state.borrow_mut();
        (0..count).map(|_| s.id()).collect()
    }
}

impl Device for MockDevice {
    type Image = MockImage;
    type Swapchain = MockSwapchain;
    type RenderPass = MockRenderPass;
    type Pipeline = MockPipeline;
    type Framebuffer = MockFramebuffer;
    type Buffer = MockBuffer;
    type DescriptorSet = MockDescriptorSet;
    type CommandBuffer = MockCommandBuffer;
    type Fence = MockFence;
    type Semaphore = MockSemaphore;

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<MockSwapchain> {
        self.state.borrow_mut().check("create_swapchain")?;
        let count = self.state.borrow().image_count;
        let images = self.fresh_images(count);
        let mut s = self.state.borrow_mut();
        let id = s.id();
        let format = s.surface_format;
        s.next_image = 0;
        s.events.push(Event::CreateSwapchain {
            id,
            extent: request.extent,
            format,
            images: images.clone(),
        });
        Ok(MockSwapchain {
            id,
            extent: request.extent,
            format,
            images,
            state: self.state.clone(),
        })
    }

    fn recreate_swapchain(
        &self,
        swapchain: &mut MockSwapchain,
        request: &SwapchainRequest,
    ) -> Result<()> {
        self.state.borrow_mut().check("create_swapchain")?;
        let count = self.state.borrow().image_count;
        let images = self.fresh_images(count);
        let mut s = self.state.borrow_mut();
        swapchain.extent = request.extent;
        swapchain.format = s.surface_format;
        swapchain.images = images.clone();
        s.next_image = 0;
        s.events.push(Event::RecreateSwapchain {
            id: swapchain.id,
            extent: swapchain.extent,
            format: swapchain.format,
            images,
        });
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: &MockSwapchain,
        signal: &MockSemaphore,
        _timeout_ns: u64,
    ) -> Result<AcquireResult> {
        let mut s = self.state.borrow_mut();
        s.check("acquire_next_image")?;
        let result = match s.acquire_script.pop_front() {
            Some(r) => r,
            None => {
                let index = s.next_image;
                s.next_image = (index + 1) % swapchain.images.len() as u32;
                AcquireResult::Acquired {
                    index,
                    suboptimal: false,
                }
            }
        };
        s.events.push(Event::Acquire {
            result,
            semaphore: signal.id,
        });
        Ok(result)
    }

    fn present(
        &self,
        _swapchain: &MockSwapchain,
        index: u32,
        wait: &MockSemaphore,
    ) -> Result<PresentResult> {
        let mut s = self.state.borrow_mut();
        s.check("queue_present")?;
        let result = s.present_script.pop_front().unwrap_or(PresentResult::Presented);
        s.events.push(Event::Present {
            index,
            wait: wait.id,
            result,
        });
        Ok(result)
    }

    fn depth_format(&self) -> Format {
        self.state.borrow().depth_format
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<MockImage> {
        let mut s = self.state.borrow_mut();
        s.check("create_image")?;
        let id = s.id();
        s.events.push(Event::CreateImage {
            id,
            name: desc.name.clone(),
            extent: desc.extent,
            usage: desc.usage,
        });
        Ok(MockImage {
            id,
            extent: desc.extent,
            format: desc.format,
            usage: desc.usage,
            state: self.state.clone(),
        })
    }

    fn create_render_pass(&self, desc: &PassDesc) -> Result<MockRenderPass> {
        let mut s = self.state.borrow_mut();
        s.check("create_render_pass")?;
        let id = s.id();
        s.events.push(Event::CreateRenderPass {
            id,
            name: desc.name.clone(),
        });
        Ok(MockRenderPass {
            id,
            state: self.state.clone(),
        })
    }

    fn create_pipeline(
        &self,
        _pass: &MockRenderPass,
        desc: &PipelineDesc,
        extent: Extent2D,
    ) -> Result<MockPipeline> {
        let mut s = self.state.borrow_mut();
        s.check("create_graphics_pipelines")?;
        let id = s.id();
        s.events.push(Event::CreatePipeline {
            id,
            name: desc.name.clone(),
            extent,
        });
        Ok(MockPipeline {
            id,
            state: self.state.clone(),
        })
    }

    fn create_framebuffer(
        &self,
        _pass: &MockRenderPass,
        attachments: &[FramebufferAttachment<'_, Self>],
        extent: Extent2D,
    ) -> Result<MockFramebuffer> {
        let mut s = self.state.borrow_mut();
        s.check("create_framebuffer")?;
        let id = s.id();
        let attachments = attachments
            .iter()
            .map(|a| match a {
                FramebufferAttachment::Image(img) => img.id,
                FramebufferAttachment::Swapchain(sc, i) => sc.images[*i],
            })
            .collect();
        s.events.push(Event::CreateFramebuffer {
            id,
            attachments,
            extent,
        });
        Ok(MockFramebuffer {
            id,
            state: self.state.clone(),
        })
    }

    fn create_buffer(
        &self,
        size: u64,
        usage: BufferUsage,
        host_visible: bool,
    ) -> Result<MockBuffer> {
        let mut s = self.state.borrow_mut();
        s.check("create_buffer")?;
        let id = s.id();
        s.buffers.insert(id, vec![0; size as usize]);
        s.events.push(Event::CreateBuffer { id, size, usage });
        Ok(MockBuffer {
            id,
            size,
            host_visible,
            state: self.state.clone(),
        })
    }

    fn write_buffer(&self, buffer: &MockBuffer, offset: u64, data: &[u8]) -> Result<()> {
        if !buffer.host_visible {
            return Err(FrameError::build("map_memory", "buffer is not host visible"));
        }
        let mut s = self.state.borrow_mut();
        let mem = s
            .buffers
            .get_mut(&buffer.id)
            .ok_or_else(|| FrameError::build("map_memory", "unknown buffer"))?;
        let start = offset as usize;
        mem[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &MockBuffer) -> Result<Vec<u8>> {
        if !buffer.host_visible {
            return Err(FrameError::build("map_memory", "buffer is not host visible"));
        }
        Ok(self.buffer_contents(buffer))
    }

    fn create_descriptor_set(&self, _layout: &SetLayoutDesc) -> Result<MockDescriptorSet> {
        let mut s = self.state.borrow_mut();
        s.check("allocate_descriptor_sets")?;
        let id = s.id();
        s.events.push(Event::CreateSet { id });
        Ok(MockDescriptorSet {
            id,
            state: self.state.clone(),
        })
    }

    fn write_uniform_descriptor(&self, set: &MockDescriptorSet, binding: u32, buffer: &MockBuffer) {
        self.state
            .borrow_mut()
            .events
            .push(Event::WriteUniformDescriptor {
                set: set.id,
                binding,
                buffer: buffer.id,
            });
    }

    fn write_image_descriptors(&self, set: &MockDescriptorSet, images: &[(u32, &MockImage)]) {
        self.state
            .borrow_mut()
            .events
            .push(Event::WriteImageDescriptors {
                set: set.id,
                bindings: images.iter().map(|(b, img)| (*b, img.id)).collect(),
            });
    }

    fn create_command_buffer(&self) -> Result<MockCommandBuffer> {
        let mut s = self.state.borrow_mut();
        s.check("allocate_command_buffers")?;
        let id = s.id();
        s.events.push(Event::CreateCommandBuffer { id });
        Ok(MockCommandBuffer {
            id,
            ops: Vec::new(),
            recording: false,
            state: self.state.clone(),
        })
    }

    fn create_fence(&self, signaled: bool) -> Result<MockFence> {
        let mut s = self.state.borrow_mut();
        s.check("create_fence")?;
        let id = s.id();
        s.fences.insert(
            id,
            FenceState {
                signaled,
                pending: false,
            },
        );
        s.events.push(Event::CreateFence { id, signaled });
        Ok(MockFence {
            id,
            state: self.state.clone(),
        })
    }

    fn create_semaphore(&self) -> Result<MockSemaphore> {
        let mut s = self.state.borrow_mut();
        s.check("create_semaphore")?;
        let id = s.id();
        s.events.push(Event::CreateSemaphore { id });
        Ok(MockSemaphore {
            id,
            state: self.state.clone(),
        })
    }

    fn wait_for_fence(&self, fence: &MockFence, _timeout_ns: u64) -> Result<bool> {
        let mut s = self.state.borrow_mut();
        s.check("wait_for_fences")?;
        let timed_out = s.fence_timeouts > 0;
        if timed_out {
            s.fence_timeouts -= 1;
        }
        let f = s.fences.entry(fence.id).or_default();
        if !timed_out && f.pending {
            f.pending = false;
            f.signaled = true;
        }
        let signaled = f.signaled && !timed_out;
        s.events.push(Event::WaitFence {
            fence: fence.id,
            signaled,
        });
        Ok(signaled)
    }

    fn reset_fence(&self, fence: &MockFence) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.check("reset_fences")?;
        s.fences.entry(fence.id).or_default().signaled = false;
        s.events.push(Event::ResetFence { fence: fence.id });
        Ok(())
    }

    fn submit(&self, info: SubmitInfo<'_, Self>) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.check("queue_submit")?;
        if info.cmd.recording {
            return Err(FrameError::command("queue_submit", "command buffer still recording"));
        }
        for op in &info.cmd.ops {
            match op {
                Op::Update { buffer, offset, data } => {
                    if let Some(mem) = s.buffers.get_mut(buffer) {
                        let start = *offset as usize;
                        mem[start..start + data.len()].copy_from_slice(data);
                    }
                }
                Op::Copy { src, dst, size } => {
                    let bytes = s
                        .buffers
                        .get(src)
                        .map(|m| m[..*size as usize].to_vec())
                        .unwrap_or_default();
                    if let Some(mem) = s.buffers.get_mut(dst) {
                        mem[..bytes.len()].copy_from_slice(&bytes);
                    }
                }
            }
        }
        if let Some(f) = info.fence {
            let st = s.fences.entry(f.id).or_default();
            if st.signaled {
                return Err(FrameError::command("queue_submit", "fence already signalled"));
            }
            st.pending = true;
        }
        s.events.push(Event::Submit {
            cmd: info.cmd.id,
            wait: info.wait.map(|(sem, _)| sem.id),
            signal: info.signal.map(|sem| sem.id),
            fence: info.fence.map(|f| f.id),
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.check("device_wait_idle")?;
        for f in s.fences.values_mut() {
            if f.pending {
                f.pending = false;
                f.signaled = true;
            }
        }
        s.events.push(Event::WaitIdle);
        Ok(())
    }
}
