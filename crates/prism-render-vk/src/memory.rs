// SPDX-License-Identifier: CEPL-1.0
//! Buffers and images with dedicated allocations.
use crate::context::Ctx;
use crate::convert;
use crate::error;
use ash::vk;
use prism_render::device::{GpuBuffer, GpuImage, ImageDesc};
use prism_render::types::{BufferUsage, Extent2D, Format, ImageUsage};
use prism_render::Result;
use std::rc::Rc;

pub struct VkBuffer {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::Buffer,
  memory: vk::DeviceMemory,
  size: u64,
  host_visible: bool,
}

impl Drop for VkBuffer {
  fn drop(&mut self) {
    unsafe {
      self.ctx.device.destroy_buffer(self.raw, None);
      self.ctx.device.free_memory(self.memory, None);
    }
  }
}

impl GpuBuffer for VkBuffer {
  fn size(&self) -> u64 {
    self.size
  }
}

impl VkBuffer {
  pub fn new(ctx: &Rc<Ctx>, size: u64, usage: BufferUsage, host_visible: bool) -> Result<Self> {
    let d = &ctx.device;
    let bci = vk::BufferCreateInfo {
      s_type: vk::StructureType::BUFFER_CREATE_INFO,
      size,
      usage: convert::buffer_usage(usage),
      sharing_mode: vk::SharingMode::EXCLUSIVE,
      ..Default::default()
    };
    let raw = unsafe { d.create_buffer(&bci, None) }.map_err(error::build("create_buffer"))?;
    let props = if host_visible {
      vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
    } else {
      vk::MemoryPropertyFlags::DEVICE_LOCAL
    };
    let memory = unsafe {
      let req = d.get_buffer_memory_requirements(raw);
      let allocated = ctx
        .find_memory_type(req.memory_type_bits, props)
        .and_then(|memory_type_index| {
          let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
          };
          d.allocate_memory(&mai, None).map_err(error::build("allocate_memory"))
        })
        .and_then(|mem| {
          d.bind_buffer_memory(raw, mem, 0)
            .map(|_| mem)
            .map_err(|e| {
              d.free_memory(mem, None);
              error::build("bind_buffer_memory")(e)
            })
        });
      match allocated {
        Ok(mem) => mem,
        Err(e) => {
          d.destroy_buffer(raw, None);
          return Err(e);
        }
      }
    };
    Ok(Self {
      ctx: ctx.clone(),
      raw,
      memory,
      size,
      host_visible,
    })
  }

  fn check_host(&self, op: &'static str) -> Result<()> {
    if self.host_visible {
      Ok(())
    } else {
      Err(prism_render::FrameError::build(op, "buffer is not host visible"))
    }
  }

  /// Copies into coherent memory; no flush needed.
  pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
    self.check_host("map_memory")?;
    if offset + data.len() as u64 > self.size {
      return Err(prism_render::FrameError::build(
        "map_memory",
        format!("{} bytes at {offset} overflow a {}-byte buffer", data.len(), self.size),
      ));
    }
    let d = &self.ctx.device;
    unsafe {
      let ptr = d
        .map_memory(self.memory, offset, data.len() as u64, vk::MemoryMapFlags::empty())
        .map_err(error::build("map_memory"))?;
      std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
      d.unmap_memory(self.memory);
    }
    Ok(())
  }

  pub fn read(&self) -> Result<Vec<u8>> {
    self.check_host("map_memory")?;
    let d = &self.ctx.device;
    let mut out = vec![0u8; self.size as usize];
    unsafe {
      let ptr = d
        .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        .map_err(error::build("map_memory"))?;
      std::ptr::copy_nonoverlapping(ptr.cast::<u8>(), out.as_mut_ptr(), out.len());
      d.unmap_memory(self.memory);
    }
    Ok(out)
  }
}

/// A device-local 2D image with one view over its whole range.
///
/// A sampled depth/stencil image gets a second, depth-only view for
/// descriptors; every other image samples through `view`.
pub struct VkImage {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::Image,
  pub(crate) view: vk::ImageView,
  pub(crate) sampled_view: vk::ImageView,
  memory: vk::DeviceMemory,
  extent: Extent2D,
  format: Format,
}

impl Drop for VkImage {
  fn drop(&mut self) {
    unsafe {
      let d = &self.ctx.device;
      if self.sampled_view != self.view {
        d.destroy_image_view(self.sampled_view, None);
      }
      d.destroy_image_view(self.view, None);
      d.destroy_image(self.raw, None);
      d.free_memory(self.memory, None);
    }
  }
}

impl GpuImage for VkImage {
  fn extent(&self) -> Extent2D {
    self.extent
  }

  fn format(&self) -> Format {
    self.format
  }
}

impl VkImage {
  pub fn new(ctx: &Rc<Ctx>, desc: &ImageDesc) -> Result<Self> {
    let d = &ctx.device;
    let format = convert::format(desc.format);
    let ici = vk::ImageCreateInfo {
      s_type: vk::StructureType::IMAGE_CREATE_INFO,
      image_type: vk::ImageType::TYPE_2D,
      format,
      extent: vk::Extent3D {
        width: desc.extent.width,
        height: desc.extent.height,
        depth: 1,
      },
      mip_levels: 1,
      array_layers: 1,
      samples: convert::samples(desc.samples),
      tiling: vk::ImageTiling::OPTIMAL,
      usage: convert::image_usage(desc.usage),
      sharing_mode: vk::SharingMode::EXCLUSIVE,
      initial_layout: vk::ImageLayout::UNDEFINED,
      ..Default::default()
    };
    let raw = unsafe { d.create_image(&ici, None) }.map_err(error::build("create_image"))?;

    let memory = unsafe {
      let req = d.get_image_memory_requirements(raw);
      let allocated = ctx
        .find_memory_type(req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .and_then(|memory_type_index| {
          let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
          };
          d.allocate_memory(&mai, None).map_err(error::build("allocate_memory"))
        })
        .and_then(|mem| {
          d.bind_image_memory(raw, mem, 0).map(|_| mem).map_err(|e| {
            d.free_memory(mem, None);
            error::build("bind_image_memory")(e)
          })
        });
      match allocated {
        Ok(mem) => mem,
        Err(e) => {
          d.destroy_image(raw, None);
          return Err(e);
        }
      }
    };

    let view_ci = |aspect| vk::ImageViewCreateInfo {
      s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
      image: raw,
      view_type: vk::ImageViewType::TYPE_2D,
      format,
      subresource_range: full_range(aspect),
      ..Default::default()
    };
    let full = convert::aspect(desc.format);
    let sampled = convert::sampled_aspect(desc.format);
    let views = unsafe { d.create_image_view(&view_ci(full), None) }.and_then(|view| {
      if full == sampled || !desc.usage.contains(ImageUsage::SAMPLED) {
        return Ok((view, view));
      }
      match unsafe { d.create_image_view(&view_ci(sampled), None) } {
        Ok(depth_only) => Ok((view, depth_only)),
        Err(e) => {
          unsafe { d.destroy_image_view(view, None) };
          Err(e)
        }
      }
    });
    let (view, sampled_view) = match views {
      Ok(v) => v,
      Err(e) => {
        unsafe {
          d.destroy_image(raw, None);
          d.free_memory(memory, None);
        }
        return Err(error::build("create_image_view")(e));
      }
    };

    tracing::trace!("image `{}` {:?} {}", desc.name, desc.format, desc.extent);
    Ok(Self {
      ctx: ctx.clone(),
      raw,
      view,
      sampled_view,
      memory,
      extent: desc.extent,
      format: desc.format,
    })
  }
}

pub(crate) fn full_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
  vk::ImageSubresourceRange {
    aspect_mask,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
  }
}
