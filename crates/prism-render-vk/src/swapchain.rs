// SPDX-License-Identifier: CEPL-1.0
use crate::context::Ctx;
use crate::convert;
use crate::error;
use crate::memory::full_range;
use ash::vk;
use prism_render::device::SwapchainImages;
use prism_render::surface::{SwapchainRequest, VsyncMode};
use prism_render::types::{Extent2D, Format};
use prism_render::{FrameError, Result};
use std::rc::Rc;
use tracing::{debug, info};

pub struct VkSwapchain {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::SwapchainKHR,
  format: Format,
  extent: Extent2D,
  pub(crate) views: Vec<vk::ImageView>,
}

impl Drop for VkSwapchain {
  fn drop(&mut self) {
    unsafe {
      for &iv in &self.views {
        self.ctx.device.destroy_image_view(iv, None);
      }
      self.ctx.swapchain_loader.destroy_swapchain(self.raw, None);
    }
  }
}

impl SwapchainImages for VkSwapchain {
  fn format(&self) -> Format {
    self.format
  }

  fn extent(&self) -> Extent2D {
    self.extent
  }

  fn image_count(&self) -> usize {
    self.views.len()
  }
}

/// sRGB BGRA first so the composition output is encoded on store.
pub(crate) fn pick_surface_format(
  formats: &[vk::SurfaceFormatKHR],
) -> Option<(vk::SurfaceFormatKHR, Format)> {
  let preferred = [
    vk::Format::B8G8R8A8_SRGB,
    vk::Format::R8G8B8A8_SRGB,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
  ];
  preferred
    .iter()
    .find_map(|&want| {
      formats
        .iter()
        .find(|f| f.format == want && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
    })
    .or_else(|| formats.iter().find(|f| convert::format_from_vk(f.format).is_some()))
    .and_then(|f| convert::format_from_vk(f.format).map(|ours| (*f, ours)))
}

pub(crate) fn choose_present_mode(
  modes: &[vk::PresentModeKHR],
  vsync: VsyncMode,
) -> vk::PresentModeKHR {
  let order: &[vk::PresentModeKHR] = match vsync {
    VsyncMode::Off => &[
      vk::PresentModeKHR::IMMEDIATE,
      vk::PresentModeKHR::MAILBOX,
      vk::PresentModeKHR::FIFO,
    ],
    VsyncMode::Mailbox => &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
    VsyncMode::Fifo => &[vk::PresentModeKHR::FIFO],
  };
  order
    .iter()
    .copied()
    .find(|m| modes.contains(m))
    .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: Extent2D) -> vk::Extent2D {
  if caps.current_extent.width != u32::MAX {
    caps.current_extent
  } else {
    vk::Extent2D {
      width: want.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
      height: want.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
  }
}

/// One more than the minimum so the CPU never waits on the presentation engine.
pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
  if caps.max_image_count == 0 {
    caps.min_image_count + 1
  } else {
    (caps.min_image_count + 1).min(caps.max_image_count)
  }
}

fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
  match m {
    vk::PresentModeKHR::FIFO => "FIFO",
    vk::PresentModeKHR::MAILBOX => "MAILBOX",
    vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
    vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
    _ => "OTHER",
  }
}

struct Bundle {
  raw: vk::SwapchainKHR,
  format: Format,
  extent: Extent2D,
  views: Vec<vk::ImageView>,
}

unsafe fn create_bundle(
  ctx: &Ctx,
  request: &SwapchainRequest,
  old: vk::SwapchainKHR,
) -> Result<Bundle> {
  let surf = &ctx.surface_loader;
  let caps = unsafe { surf.get_physical_device_surface_capabilities(ctx.phys, ctx.surface) }
    .map_err(error::build("get_surface_capabilities"))?;
  let formats = unsafe { surf.get_physical_device_surface_formats(ctx.phys, ctx.surface) }
    .map_err(error::build("get_surface_formats"))?;
  let modes = unsafe { surf.get_physical_device_surface_present_modes(ctx.phys, ctx.surface) }
    .map_err(error::build("get_surface_present_modes"))?;

  let (surf_format, format) = pick_surface_format(&formats)
    .ok_or_else(|| FrameError::build("create_swapchain", "surface offers no usable format"))?;
  let present_mode = choose_present_mode(&modes, request.vsync);
  let extent = extent_from_caps(&caps, request.extent);

  let swap_info = vk::SwapchainCreateInfoKHR {
    s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
    surface: ctx.surface,
    min_image_count: image_count_from_caps(&caps),
    image_format: surf_format.format,
    image_color_space: surf_format.color_space,
    image_extent: extent,
    image_array_layers: 1,
    image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
    image_sharing_mode: vk::SharingMode::EXCLUSIVE,
    pre_transform: caps.current_transform,
    composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
    present_mode,
    clipped: vk::TRUE,
    old_swapchain: old,
    ..Default::default()
  };
  let raw = unsafe { ctx.swapchain_loader.create_swapchain(&swap_info, None) }
    .map_err(error::build("create_swapchain"))?;
  let images = match unsafe { ctx.swapchain_loader.get_swapchain_images(raw) } {
    Ok(images) => images,
    Err(e) => {
      unsafe { ctx.swapchain_loader.destroy_swapchain(raw, None) };
      return Err(error::build("get_swapchain_images")(e));
    }
  };

  let mut views = Vec::with_capacity(images.len());
  for &img in &images {
    let iv_info = vk::ImageViewCreateInfo {
      s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
      image: img,
      view_type: vk::ImageViewType::TYPE_2D,
      format: surf_format.format,
      subresource_range: full_range(vk::ImageAspectFlags::COLOR),
      ..Default::default()
    };
    match unsafe { ctx.device.create_image_view(&iv_info, None) } {
      Ok(v) => views.push(v),
      Err(e) => {
        unsafe {
          for &v in &views {
            ctx.device.destroy_image_view(v, None);
          }
          ctx.swapchain_loader.destroy_swapchain(raw, None);
        }
        return Err(error::build("create_image_view")(e));
      }
    }
  }

  info!(
    "swapchain {}x{} {:?}, {} images, {}",
    extent.width,
    extent.height,
    format,
    views.len(),
    present_mode_name(present_mode)
  );
  Ok(Bundle {
    raw,
    format,
    extent: Extent2D::new(extent.width, extent.height),
    views,
  })
}

impl VkSwapchain {
  pub fn new(ctx: &Rc<Ctx>, request: &SwapchainRequest) -> Result<Self> {
    let b = unsafe { create_bundle(ctx, request, vk::SwapchainKHR::null()) }?;
    Ok(Self {
      ctx: ctx.clone(),
      raw: b.raw,
      format: b.format,
      extent: b.extent,
      views: b.views,
    })
  }

  /// Builds the replacement from the current swapchain, then retires it.
  /// The caller has already drained the queue.
  pub fn recreate(&mut self, request: &SwapchainRequest) -> Result<()> {
    let b = unsafe { create_bundle(&self.ctx, request, self.raw) }?;
    let old_raw = std::mem::replace(&mut self.raw, b.raw);
    let old_views = std::mem::replace(&mut self.views, b.views);
    self.format = b.format;
    self.extent = b.extent;
    unsafe {
      for iv in old_views {
        self.ctx.device.destroy_image_view(iv, None);
      }
      self.ctx.swapchain_loader.destroy_swapchain(old_raw, None);
    }
    debug!("old swapchain retired");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sf(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
      format,
      color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
  }

  #[test]
  fn srgb_surface_is_preferred() {
    let formats = [sf(vk::Format::B8G8R8A8_UNORM), sf(vk::Format::B8G8R8A8_SRGB)];
    let (raw, ours) = pick_surface_format(&formats).unwrap();
    assert_eq!(raw.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(ours, Format::B8G8R8A8_SRGB);
  }

  #[test]
  fn unknown_surface_formats_are_skipped() {
    let formats = [sf(vk::Format::R5G6B5_UNORM_PACK16), sf(vk::Format::A2B10G10R10_UNORM_PACK32)];
    let (_, ours) = pick_surface_format(&formats).unwrap();
    assert_eq!(ours, Format::A2B10G10R10_UNORM);
    assert!(pick_surface_format(&[sf(vk::Format::R5G6B5_UNORM_PACK16)]).is_none());
  }

  #[test]
  fn present_mode_follows_vsync() {
    let all = [
      vk::PresentModeKHR::FIFO,
      vk::PresentModeKHR::MAILBOX,
      vk::PresentModeKHR::IMMEDIATE,
    ];
    assert_eq!(choose_present_mode(&all, VsyncMode::Off), vk::PresentModeKHR::IMMEDIATE);
    assert_eq!(choose_present_mode(&all, VsyncMode::Mailbox), vk::PresentModeKHR::MAILBOX);
    assert_eq!(choose_present_mode(&all, VsyncMode::Fifo), vk::PresentModeKHR::FIFO);
    let fifo_only = [vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&fifo_only, VsyncMode::Off), vk::PresentModeKHR::FIFO);
    assert_eq!(choose_present_mode(&fifo_only, VsyncMode::Mailbox), vk::PresentModeKHR::FIFO);
  }

  #[test]
  fn undefined_extent_is_clamped_to_caps() {
    let caps = vk::SurfaceCapabilitiesKHR {
      current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
      min_image_extent: vk::Extent2D { width: 1, height: 1 },
      max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
      ..Default::default()
    };
    let e = extent_from_caps(&caps, Extent2D::new(4000, 720));
    assert_eq!((e.width, e.height), (1920, 720));

    let fixed = vk::SurfaceCapabilitiesKHR {
      current_extent: vk::Extent2D { width: 800, height: 600 },
      ..caps
    };
    let e = extent_from_caps(&fixed, Extent2D::new(4000, 720));
    assert_eq!((e.width, e.height), (800, 600));
  }

  #[test]
  fn image_count_is_one_above_minimum_within_max() {
    let mut caps = vk::SurfaceCapabilitiesKHR {
      min_image_count: 2,
      max_image_count: 0,
      ..Default::default()
    };
    assert_eq!(image_count_from_caps(&caps), 3);
    caps.max_image_count = 2;
    assert_eq!(image_count_from_caps(&caps), 2);
  }
}
