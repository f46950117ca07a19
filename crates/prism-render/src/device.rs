// SPDX-License-Identifier: CEPL-1.0
//! The seam between the frame orchestrator and a GPU backend.
//!
//! Every associated type is an owning handle: dropping it releases the GPU
//! object. Consumers that only read a resource borrow it.
use crate::error::Result;
use crate::pass::PassDesc;
use crate::pipeline::PipelineDesc;
use crate::surface::SwapchainRequest;
use crate::types::{
    BufferBarrier, BufferUsage, ClearValue, Extent2D, Format, ImageBarrier, ImageUsage,
    PipelineStages, SampleCount, SetLayoutDesc,
};

pub trait GpuImage {
    fn extent(&self) -> Extent2D;
    fn format(&self) -> Format;
}

pub trait GpuBuffer {
    fn size(&self) -> u64;
}

pub trait SwapchainImages {
    fn format(&self) -> Format;
    fn extent(&self) -> Extent2D;
    fn image_count(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    pub name: String,
    pub format: Format,
    pub usage: ImageUsage,
    pub extent: Extent2D,
    pub samples: SampleCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireResult {
    Acquired { index: u32, suboptimal: bool },
    OutOfDate,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}

pub enum FramebufferAttachment<'a, D: Device + ?Sized> {
    Image(&'a D::Image),
    Swapchain(&'a D::Swapchain, usize),
}

pub struct SubmitInfo<'a, D: Device + ?Sized> {
    pub cmd: &'a D::CommandBuffer,
    pub wait: Option<(&'a D::Semaphore, PipelineStages)>,
    pub signal: Option<&'a D::Semaphore>,
    pub fence: Option<&'a D::Fence>,
}

/// Records GPU work into one command buffer.
///
/// Only `begin` and `end` can fail; everything in between is deferred until
/// submission, matching how the driver reports errors.
pub trait CommandEncoder<D: Device + ?Sized> {
    fn begin(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;

    fn buffer_barrier(&mut self, buffer: &D::Buffer, barrier: BufferBarrier);
    fn image_barrier(&mut self, image: &D::Image, barrier: ImageBarrier);
    fn update_buffer(&mut self, buffer: &D::Buffer, offset: u64, data: &[u8]);
    fn copy_buffer(&mut self, src: &D::Buffer, dst: &D::Buffer, size: u64);

    fn begin_pass(
        &mut self,
        pass: &D::RenderPass,
        framebuffer: &D::Framebuffer,
        extent: Extent2D,
        clears: &[ClearValue],
    );
    fn end_pass(&mut self);

    fn bind_pipeline(&mut self, pipeline: &D::Pipeline);
    /// Viewport and scissor covering `extent`.
    fn set_viewport(&mut self, extent: Extent2D);
    fn bind_descriptor_set(&mut self, pipeline: &D::Pipeline, index: u32, set: &D::DescriptorSet);
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[&D::Buffer]);
    fn draw(&mut self, vertex_count: u32, first_vertex: u32);
}

pub trait Device {
    type Image: GpuImage;
    type Swapchain: SwapchainImages;
    type RenderPass;
    type Pipeline;
    type Framebuffer;
    type Buffer: GpuBuffer;
    type DescriptorSet;
    type CommandBuffer: CommandEncoder<Self>;
    type Fence;
    type Semaphore;

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<Self::Swapchain>;
    /// Rebuilds in place, retiring the previous swapchain.
    fn recreate_swapchain(
        &self,
        swapchain: &mut Self::Swapchain,
        request: &SwapchainRequest,
    ) -> Result<()>;
    fn acquire_next_image(
        &self,
        swapchain: &Self::Swapchain,
        signal: &Self::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireResult>;
    fn present(
        &self,
        swapchain: &Self::Swapchain,
        index: u32,
        wait: &Self::Semaphore,
    ) -> Result<PresentResult>;

    fn depth_format(&self) -> Format;

    fn create_image(&self, desc: &ImageDesc) -> Result<Self::Image>;
    fn create_render_pass(&self, desc: &PassDesc) -> Result<Self::RenderPass>;
    fn create_pipeline(
        &self,
        pass: &Self::RenderPass,
        desc: &PipelineDesc,
        extent: Extent2D,
    ) -> Result<Self::Pipeline>;
    fn create_framebuffer(
        &self,
        pass: &Self::RenderPass,
        attachments: &[FramebufferAttachment<'_, Self>],
        extent: Extent2D,
    ) -> Result<Self::Framebuffer>;

    fn create_buffer(&self, size: u64, usage: BufferUsage, host_visible: bool)
        -> Result<Self::Buffer>;
    /// Host write into a host-visible buffer.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<()>;
    /// Host read of a host-visible buffer.
    fn read_buffer(&self, buffer: &Self::Buffer) -> Result<Vec<u8>>;

    fn create_descriptor_set(&self, layout: &SetLayoutDesc) -> Result<Self::DescriptorSet>;
    fn write_uniform_descriptor(
        &self,
        set: &Self::DescriptorSet,
        binding: u32,
        buffer: &Self::Buffer,
    );
    /// Binds each image as a sampled texture at its binding index.
    fn write_image_descriptors(&self, set: &Self::DescriptorSet, images: &[(u32, &Self::Image)]);

    fn create_command_buffer(&self) -> Result<Self::CommandBuffer>;
    fn create_fence(&self, signaled: bool) -> Result<Self::Fence>;
    fn create_semaphore(&self) -> Result<Self::Semaphore>;

    /// `Ok(false)` when the timeout elapsed before the fence signalled.
    fn wait_for_fence(&self, fence: &Self::Fence, timeout_ns: u64) -> Result<bool>;
    fn reset_fence(&self, fence: &Self::Fence) -> Result<()>;
    fn submit(&self, info: SubmitInfo<'_, Self>) -> Result<()>;
    fn wait_idle(&self) -> Result<()>;
}
