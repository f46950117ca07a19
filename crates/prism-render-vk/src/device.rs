// SPDX-License-Identifier: CEPL-1.0
//! `prism_render::Device` over a single graphics+present queue.
use crate::command::VkCommandBuffer;
use crate::context::Ctx;
use crate::convert;
use crate::error;
use crate::memory::{VkBuffer, VkImage};
use crate::pipeline::{self, VkFramebuffer, VkPipeline, VkRenderPass};
use crate::swapchain::VkSwapchain;
use ash::vk;
use prism_render::device::{
  AcquireResult, Device, FramebufferAttachment, GpuBuffer, ImageDesc, PresentResult, SubmitInfo,
};
use prism_render::pass::PassDesc;
use prism_render::pipeline::PipelineDesc;
use prism_render::surface::SwapchainRequest;
use prism_render::types::{BufferUsage, Extent2D, Format, SetLayoutDesc};
use prism_render::{FrameError, Result};
use std::rc::Rc;
use tracing::warn;

pub struct VkFence {
  ctx: Rc<Ctx>,
  raw: vk::Fence,
}

impl Drop for VkFence {
  fn drop(&mut self) {
    unsafe { self.ctx.device.destroy_fence(self.raw, None) };
  }
}

pub struct VkSemaphore {
  ctx: Rc<Ctx>,
  raw: vk::Semaphore,
}

impl Drop for VkSemaphore {
  fn drop(&mut self) {
    unsafe { self.ctx.device.destroy_semaphore(self.raw, None) };
  }
}

pub struct VkDescriptorSet {
  ctx: Rc<Ctx>,
  /// The pool this set was allocated from and is freed back to.
  pool: vk::DescriptorPool,
  pub(crate) raw: vk::DescriptorSet,
}

impl Drop for VkDescriptorSet {
  fn drop(&mut self) {
    let freed = unsafe {
      self
        .ctx
        .device
        .free_descriptor_sets(self.pool, std::slice::from_ref(&self.raw))
    };
    if let Err(e) = freed {
      warn!("free_descriptor_sets: {e}");
    }
  }
}

#[derive(Clone)]
pub struct VkDevice {
  ctx: Rc<Ctx>,
}

impl VkDevice {
  pub(crate) fn new(ctx: Rc<Ctx>) -> Self {
    Self { ctx }
  }
}

impl Device for VkDevice {
  type Image = VkImage;
  type Swapchain = VkSwapchain;
  type RenderPass = VkRenderPass;
  type Pipeline = VkPipeline;
  type Framebuffer = VkFramebuffer;
  type Buffer = VkBuffer;
  type DescriptorSet = VkDescriptorSet;
  type CommandBuffer = VkCommandBuffer;
  type Fence = VkFence;
  type Semaphore = VkSemaphore;

  fn create_swapchain(&self, request: &SwapchainRequest) -> Result<VkSwapchain> {
    VkSwapchain::new(&self.ctx, request)
  }

  fn recreate_swapchain(
    &self,
    swapchain: &mut VkSwapchain,
    request: &SwapchainRequest,
  ) -> Result<()> {
    swapchain.recreate(request)
  }

  fn acquire_next_image(
    &self,
    swapchain: &VkSwapchain,
    signal: &VkSemaphore,
    timeout_ns: u64,
  ) -> Result<AcquireResult> {
    let r = unsafe {
      self
        .ctx
        .swapchain_loader
        .acquire_next_image(swapchain.raw, timeout_ns, signal.raw, vk::Fence::null())
    };
    match r {
      Ok((index, suboptimal)) => Ok(AcquireResult::Acquired { index, suboptimal }),
      Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
      Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireResult::Timeout),
      Err(e) => Err(error::sync("acquire_next_image")(e)),
    }
  }

  fn present(
    &self,
    swapchain: &VkSwapchain,
    index: u32,
    wait: &VkSemaphore,
  ) -> Result<PresentResult> {
    let present = vk::PresentInfoKHR {
      s_type: vk::StructureType::PRESENT_INFO_KHR,
      wait_semaphore_count: 1,
      p_wait_semaphores: &wait.raw,
      swapchain_count: 1,
      p_swapchains: &swapchain.raw,
      p_image_indices: &index,
      ..Default::default()
    };
    match unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.queue, &present) } {
      Ok(false) => Ok(PresentResult::Presented),
      Ok(true) => Ok(PresentResult::Suboptimal),
      Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
      Err(e) => Err(error::command("queue_present")(e)),
    }
  }

  fn depth_format(&self) -> Format {
    self.ctx.depth_format
  }

  fn create_image(&self, desc: &ImageDesc) -> Result<VkImage> {
    VkImage::new(&self.ctx, desc)
  }

  fn create_render_pass(&self, desc: &PassDesc) -> Result<VkRenderPass> {
    pipeline::create_render_pass(&self.ctx, desc)
  }

  fn create_pipeline(
    &self,
    pass: &VkRenderPass,
    desc: &PipelineDesc,
    extent: Extent2D,
  ) -> Result<VkPipeline> {
    pipeline::create_pipeline(&self.ctx, pass, desc, extent)
  }

  fn create_framebuffer(
    &self,
    pass: &VkRenderPass,
    attachments: &[FramebufferAttachment<'_, Self>],
    extent: Extent2D,
  ) -> Result<VkFramebuffer> {
    let views = attachments
      .iter()
      .map(|a| match a {
        FramebufferAttachment::Image(img) => Ok(img.view),
        FramebufferAttachment::Swapchain(sc, i) => sc.views.get(*i).copied().ok_or_else(|| {
          FrameError::build(
            "create_framebuffer",
            format!("swapchain has no image {i} (of {})", sc.views.len()),
          )
        }),
      })
      .collect::<Result<Vec<_>>>()?;
    pipeline::create_framebuffer(&self.ctx, pass, &views, extent)
  }

  fn create_buffer(&self, size: u64, usage: BufferUsage, host_visible: bool) -> Result<VkBuffer> {
    VkBuffer::new(&self.ctx, size, usage, host_visible)
  }

  fn write_buffer(&self, buffer: &VkBuffer, offset: u64, data: &[u8]) -> Result<()> {
    buffer.write(offset, data)
  }

  fn read_buffer(&self, buffer: &VkBuffer) -> Result<Vec<u8>> {
    buffer.read()
  }

  fn create_descriptor_set(&self, layout: &SetLayoutDesc) -> Result<VkDescriptorSet> {
    let layout = self.ctx.set_layout(layout)?;
    let (pool, raw) = self.ctx.allocate_set(layout)?;
    Ok(VkDescriptorSet {
      ctx: self.ctx.clone(),
      pool,
      raw,
    })
  }

  fn write_uniform_descriptor(&self, set: &VkDescriptorSet, binding: u32, buffer: &VkBuffer) {
    let info = vk::DescriptorBufferInfo {
      buffer: buffer.raw,
      offset: 0,
      range: buffer.size(),
    };
    let write = vk::WriteDescriptorSet {
      s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
      dst_set: set.raw,
      dst_binding: binding,
      descriptor_count: 1,
      descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
      p_buffer_info: &info,
      ..Default::default()
    };
    unsafe { self.ctx.device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
  }

  fn write_image_descriptors(&self, set: &VkDescriptorSet, images: &[(u32, &VkImage)]) {
    let infos: Vec<vk::DescriptorImageInfo> = images
      .iter()
      .map(|(_, img)| vk::DescriptorImageInfo {
        sampler: self.ctx.sampler,
        image_view: img.sampled_view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
      })
      .collect();
    let writes: Vec<vk::WriteDescriptorSet> = images
      .iter()
      .zip(&infos)
      .map(|((binding, _), info)| vk::WriteDescriptorSet {
        s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
        dst_set: set.raw,
        dst_binding: *binding,
        descriptor_count: 1,
        descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        p_image_info: info,
        ..Default::default()
      })
      .collect();
    unsafe { self.ctx.device.update_descriptor_sets(&writes, &[]) };
  }

  fn create_command_buffer(&self) -> Result<VkCommandBuffer> {
    VkCommandBuffer::new(&self.ctx)
  }

  fn create_fence(&self, signaled: bool) -> Result<VkFence> {
    let info = vk::FenceCreateInfo {
      s_type: vk::StructureType::FENCE_CREATE_INFO,
      flags: if signaled {
        vk::FenceCreateFlags::SIGNALED
      } else {
        vk::FenceCreateFlags::empty()
      },
      ..Default::default()
    };
    let raw =
      unsafe { self.ctx.device.create_fence(&info, None) }.map_err(error::build("create_fence"))?;
    Ok(VkFence { ctx: self.ctx.clone(), raw })
  }

  fn create_semaphore(&self) -> Result<VkSemaphore> {
    let info = vk::SemaphoreCreateInfo {
      s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
      ..Default::default()
    };
    let raw = unsafe { self.ctx.device.create_semaphore(&info, None) }
      .map_err(error::build("create_semaphore"))?;
    Ok(VkSemaphore { ctx: self.ctx.clone(), raw })
  }

  fn wait_for_fence(&self, fence: &VkFence, timeout_ns: u64) -> Result<bool> {
    match unsafe {
      self
        .ctx
        .device
        .wait_for_fences(std::slice::from_ref(&fence.raw), true, timeout_ns)
    } {
      Ok(()) => Ok(true),
      Err(vk::Result::TIMEOUT) => Ok(false),
      Err(e) => Err(error::sync("wait_for_fences")(e)),
    }
  }

  fn reset_fence(&self, fence: &VkFence) -> Result<()> {
    unsafe { self.ctx.device.reset_fences(std::slice::from_ref(&fence.raw)) }
      .map_err(error::sync("reset_fences"))
  }

  fn submit(&self, info: SubmitInfo<'_, Self>) -> Result<()> {
    let (wait_sems, wait_stages): (Vec<vk::Semaphore>, Vec<vk::PipelineStageFlags>) = info
      .wait
      .iter()
      .map(|(s, stages)| (s.raw, convert::stages(*stages, vk::PipelineStageFlags::TOP_OF_PIPE)))
      .unzip();
    let signal: Vec<vk::Semaphore> = info.signal.iter().map(|s| s.raw).collect();
    let submit = vk::SubmitInfo {
      s_type: vk::StructureType::SUBMIT_INFO,
      wait_semaphore_count: wait_sems.len() as u32,
      p_wait_semaphores: wait_sems.as_ptr(),
      p_wait_dst_stage_mask: wait_stages.as_ptr(),
      command_buffer_count: 1,
      p_command_buffers: &info.cmd.raw,
      signal_semaphore_count: signal.len() as u32,
      p_signal_semaphores: signal.as_ptr(),
      ..Default::default()
    };
    let fence = info.fence.map_or(vk::Fence::null(), |f| f.raw);
    unsafe {
      self
        .ctx
        .device
        .queue_submit(self.ctx.queue, std::slice::from_ref(&submit), fence)
    }
    .map_err(error::command("queue_submit"))
  }

  fn wait_idle(&self) -> Result<()> {
    unsafe { self.ctx.device.device_wait_idle() }.map_err(error::sync("device_wait_idle"))
  }
}
