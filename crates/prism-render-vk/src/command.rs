// SPDX-License-Identifier: CEPL-1.0
use crate::context::Ctx;
use crate::convert;
use crate::device::{VkDescriptorSet, VkDevice};
use crate::error;
use crate::memory::{full_range, VkBuffer, VkImage};
use crate::pipeline::{VkFramebuffer, VkPipeline, VkRenderPass};
use ash::vk;
use prism_render::device::{CommandEncoder, GpuImage};
use prism_render::types::{BufferBarrier, ClearValue, Extent2D, ImageBarrier};
use prism_render::Result;
use std::rc::Rc;

pub struct VkCommandBuffer {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::CommandBuffer,
}

impl Drop for VkCommandBuffer {
  fn drop(&mut self) {
    unsafe {
      self
        .ctx
        .device
        .free_command_buffers(self.ctx.cmd_pool, std::slice::from_ref(&self.raw))
    };
  }
}

impl VkCommandBuffer {
  pub fn new(ctx: &Rc<Ctx>) -> Result<Self> {
    let alloc_info = vk::CommandBufferAllocateInfo {
      s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
      command_pool: ctx.cmd_pool,
      level: vk::CommandBufferLevel::PRIMARY,
      command_buffer_count: 1,
      ..Default::default()
    };
    let bufs = unsafe { ctx.device.allocate_command_buffers(&alloc_info) }
      .map_err(error::build("allocate_command_buffers"))?;
    let raw = bufs.into_iter().next().ok_or_else(|| {
      prism_render::FrameError::build("allocate_command_buffers", "driver returned no buffer")
    })?;
    Ok(Self { ctx: ctx.clone(), raw })
  }

  fn d(&self) -> &ash::Device {
    &self.ctx.device
  }
}

fn whole_viewport(extent: Extent2D) -> (vk::Viewport, vk::Rect2D) {
  (
    vk::Viewport {
      x: 0.0,
      y: 0.0,
      width: extent.width as f32,
      height: extent.height as f32,
      min_depth: 0.0,
      max_depth: 1.0,
    },
    vk::Rect2D {
      offset: vk::Offset2D { x: 0, y: 0 },
      extent: convert::extent(extent),
    },
  )
}

impl CommandEncoder<VkDevice> for VkCommandBuffer {
  fn begin(&mut self) -> Result<()> {
    let begin = vk::CommandBufferBeginInfo {
      s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
      flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
      ..Default::default()
    };
    unsafe {
      self
        .d()
        .reset_command_buffer(self.raw, vk::CommandBufferResetFlags::empty())
        .map_err(error::command("reset_command_buffer"))?;
      self
        .d()
        .begin_command_buffer(self.raw, &begin)
        .map_err(error::command("begin_command_buffer"))
    }
  }

  fn end(&mut self) -> Result<()> {
    unsafe { self.d().end_command_buffer(self.raw) }.map_err(error::command("end_command_buffer"))
  }

  fn buffer_barrier(&mut self, buffer: &VkBuffer, barrier: BufferBarrier) {
    let b = vk::BufferMemoryBarrier {
      s_type: vk::StructureType::BUFFER_MEMORY_BARRIER,
      src_access_mask: convert::access(barrier.src_access),
      dst_access_mask: convert::access(barrier.dst_access),
      src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
      dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
      buffer: buffer.raw,
      offset: 0,
      size: vk::WHOLE_SIZE,
      ..Default::default()
    };
    unsafe {
      self.d().cmd_pipeline_barrier(
        self.raw,
        convert::stages(barrier.src_stages, vk::PipelineStageFlags::TOP_OF_PIPE),
        convert::stages(barrier.dst_stages, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        vk::DependencyFlags::empty(),
        &[],
        std::slice::from_ref(&b),
        &[],
      )
    };
  }

  fn image_barrier(&mut self, image: &VkImage, barrier: ImageBarrier) {
    let b = vk::ImageMemoryBarrier {
      s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
      src_access_mask: convert::access(barrier.src_access),
      dst_access_mask: convert::access(barrier.dst_access),
      old_layout: convert::layout(barrier.old_layout),
      new_layout: convert::layout(barrier.new_layout),
      src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
      dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
      image: image.raw,
      subresource_range: full_range(convert::aspect(image.format())),
      ..Default::default()
    };
    unsafe {
      self.d().cmd_pipeline_barrier(
        self.raw,
        convert::stages(barrier.src_stages, vk::PipelineStageFlags::TOP_OF_PIPE),
        convert::stages(barrier.dst_stages, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&b),
      )
    };
  }

  fn update_buffer(&mut self, buffer: &VkBuffer, offset: u64, data: &[u8]) {
    unsafe { self.d().cmd_update_buffer(self.raw, buffer.raw, offset, data) };
  }

  fn copy_buffer(&mut self, src: &VkBuffer, dst: &VkBuffer, size: u64) {
    let region = vk::BufferCopy {
      src_offset: 0,
      dst_offset: 0,
      size,
    };
    unsafe {
      self
        .d()
        .cmd_copy_buffer(self.raw, src.raw, dst.raw, std::slice::from_ref(&region))
    };
  }

  fn begin_pass(
    &mut self,
    pass: &VkRenderPass,
    framebuffer: &VkFramebuffer,
    extent: Extent2D,
    clears: &[ClearValue],
  ) {
    let clears: Vec<vk::ClearValue> = clears.iter().map(|&c| convert::clear_value(c)).collect();
    let rp_begin = vk::RenderPassBeginInfo {
      s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
      render_pass: pass.raw,
      framebuffer: framebuffer.raw,
      render_area: vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: convert::extent(extent),
      },
      clear_value_count: clears.len() as u32,
      p_clear_values: clears.as_ptr(),
      ..Default::default()
    };
    unsafe {
      self
        .d()
        .cmd_begin_render_pass(self.raw, &rp_begin, vk::SubpassContents::INLINE)
    };
  }

  fn end_pass(&mut self) {
    unsafe { self.d().cmd_end_render_pass(self.raw) };
  }

  fn bind_pipeline(&mut self, pipeline: &VkPipeline) {
    unsafe {
      self
        .d()
        .cmd_bind_pipeline(self.raw, vk::PipelineBindPoint::GRAPHICS, pipeline.raw)
    };
  }

  fn set_viewport(&mut self, extent: Extent2D) {
    let (viewport, scissor) = whole_viewport(extent);
    unsafe {
      self.d().cmd_set_viewport(self.raw, 0, &[viewport]);
      self.d().cmd_set_scissor(self.raw, 0, &[scissor]);
    }
  }

  fn bind_descriptor_set(&mut self, pipeline: &VkPipeline, index: u32, set: &VkDescriptorSet) {
    unsafe {
      self.d().cmd_bind_descriptor_sets(
        self.raw,
        vk::PipelineBindPoint::GRAPHICS,
        pipeline.layout,
        index,
        std::slice::from_ref(&set.raw),
        &[],
      )
    };
  }

  fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[&VkBuffer]) {
    let raws: Vec<vk::Buffer> = buffers.iter().map(|b| b.raw).collect();
    let offsets = vec![0u64; raws.len()];
    unsafe {
      self
        .d()
        .cmd_bind_vertex_buffers(self.raw, first_binding, &raws, &offsets)
    };
  }

  fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
    unsafe { self.d().cmd_draw(self.raw, vertex_count, 1, first_vertex, 0) };
  }
}
