// SPDX-License-Identifier: CEPL-1.0
//! Mapping from the backend-neutral descriptions onto `ash::vk`.
use ash::vk;
use prism_render::pipeline::{BlendFactor, BlendOp, ColorMask, CompareOp, CullMode, FrontFace};
use prism_render::types::{
  AccessFlags, BufferUsage, ClearValue, DescriptorKind, Extent2D, Format, ImageLayout, ImageUsage,
  LoadOp, PipelineStages, SampleCount, ShaderStages, StoreOp,
};

pub fn format(f: Format) -> vk::Format {
  match f {
    Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
    Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
    Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
    Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    Format::A2B10G10R10_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
    Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
    Format::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
    Format::D16_UNORM => vk::Format::D16_UNORM,
    Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    Format::D32_SFLOAT => vk::Format::D32_SFLOAT,
    Format::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
  }
}

/// Inverse of [`format`]; `None` for formats the frame pipeline never uses.
pub fn format_from_vk(f: vk::Format) -> Option<Format> {
  Some(match f {
    vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8_SRGB,
    vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8_SRGB,
    vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8_UNORM,
    vk::Format::A2B10G10R10_UNORM_PACK32 => Format::A2B10G10R10_UNORM,
    vk::Format::R16G16B16A16_SFLOAT => Format::R16G16B16A16_SFLOAT,
    vk::Format::R32G32B32_SFLOAT => Format::R32G32B32_SFLOAT,
    vk::Format::D16_UNORM => Format::D16_UNORM,
    vk::Format::D24_UNORM_S8_UINT => Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT => Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT => Format::D32_SFLOAT_S8_UINT,
    _ => return None,
  })
}

pub fn aspect(f: Format) -> vk::ImageAspectFlags {
  if f.has_stencil() {
    vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
  } else if f.is_depth() {
    vk::ImageAspectFlags::DEPTH
  } else {
    vk::ImageAspectFlags::COLOR
  }
}

/// Aspect a shader reads through: depth only, even for packed stencil formats.
pub fn sampled_aspect(f: Format) -> vk::ImageAspectFlags {
  if f.is_depth() {
    vk::ImageAspectFlags::DEPTH
  } else {
    vk::ImageAspectFlags::COLOR
  }
}

pub fn extent(e: Extent2D) -> vk::Extent2D {
  vk::Extent2D { width: e.width, height: e.height }
}

pub fn layout(l: ImageLayout) -> vk::ImageLayout {
  match l {
    ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
    ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
  }
}

pub fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
  match op {
    LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
    LoadOp::Load => vk::AttachmentLoadOp::LOAD,
    LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
  }
}

pub fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
  match op {
    StoreOp::Store => vk::AttachmentStoreOp::STORE,
    StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
  }
}

pub fn samples(s: SampleCount) -> vk::SampleCountFlags {
  match s {
    SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
    SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
    SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
    SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
  }
}

pub fn access(a: AccessFlags) -> vk::AccessFlags {
  const MAP: [(AccessFlags, vk::AccessFlags); 12] = [
    (AccessFlags::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
    (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
    (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags::COLOR_ATTACHMENT_READ),
    (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
    (AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
    (AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
    (AccessFlags::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
    (AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
    (AccessFlags::VERTEX_ATTRIBUTE_READ, vk::AccessFlags::VERTEX_ATTRIBUTE_READ),
    (AccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
    (AccessFlags::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
    (AccessFlags::HOST_READ, vk::AccessFlags::HOST_READ),
  ];
  MAP.iter()
    .filter(|(ours, _)| a.contains(*ours))
    .fold(vk::AccessFlags::empty(), |acc, (_, theirs)| acc | *theirs)
}

/// Empty masks widen to the pipeline end named by `empty`.
pub fn stages(s: PipelineStages, empty: vk::PipelineStageFlags) -> vk::PipelineStageFlags {
  const MAP: [(PipelineStages, vk::PipelineStageFlags); 10] = [
    (PipelineStages::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
    (PipelineStages::VERTEX_INPUT, vk::PipelineStageFlags::VERTEX_INPUT),
    (PipelineStages::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
    (PipelineStages::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
    (PipelineStages::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
    (PipelineStages::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags::LATE_FRAGMENT_TESTS),
    (PipelineStages::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT),
    (PipelineStages::TRANSFER, vk::PipelineStageFlags::TRANSFER),
    (PipelineStages::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    (PipelineStages::HOST, vk::PipelineStageFlags::HOST),
  ];
  let out = MAP
    .iter()
    .filter(|(ours, _)| s.contains(*ours))
    .fold(vk::PipelineStageFlags::empty(), |acc, (_, theirs)| acc | *theirs);
  if out.is_empty() { empty } else { out }
}

pub fn image_usage(u: ImageUsage) -> vk::ImageUsageFlags {
  const MAP: [(ImageUsage, vk::ImageUsageFlags); 5] = [
    (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
    (ImageUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
    (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
    (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
    (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
  ];
  MAP
    .iter()
    .filter(|(ours, _)| u.contains(*ours))
    .fold(vk::ImageUsageFlags::empty(), |acc, (_, theirs)| acc | *theirs)
}

pub fn buffer_usage(u: BufferUsage) -> vk::BufferUsageFlags {
  let mut out = vk::BufferUsageFlags::empty();
  if u.contains(BufferUsage::VERTEX) { out |= vk::BufferUsageFlags::VERTEX_BUFFER; }
  if u.contains(BufferUsage::UNIFORM) { out |= vk::BufferUsageFlags::UNIFORM_BUFFER; }
  if u.contains(BufferUsage::TRANSFER_SRC) { out |= vk::BufferUsageFlags::TRANSFER_SRC; }
  if u.contains(BufferUsage::TRANSFER_DST) { out |= vk::BufferUsageFlags::TRANSFER_DST; }
  out
}

pub fn shader_stages(s: ShaderStages) -> vk::ShaderStageFlags {
  let mut out = vk::ShaderStageFlags::empty();
  if s.contains(ShaderStages::VERTEX) { out |= vk::ShaderStageFlags::VERTEX; }
  if s.contains(ShaderStages::FRAGMENT) { out |= vk::ShaderStageFlags::FRAGMENT; }
  out
}

pub fn descriptor_type(k: DescriptorKind) -> vk::DescriptorType {
  match k {
    DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
    DescriptorKind::SampledImage => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
  }
}

pub fn clear_value(c: ClearValue) -> vk::ClearValue {
  match c {
    ClearValue::Color(rgba) => vk::ClearValue {
      color: vk::ClearColorValue { float32: rgba },
    },
    ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
      depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
    },
  }
}

pub fn blend_factor(f: BlendFactor) -> vk::BlendFactor {
  match f {
    BlendFactor::Zero => vk::BlendFactor::ZERO,
    BlendFactor::One => vk::BlendFactor::ONE,
    BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
    BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
  }
}

pub fn blend_op(op: BlendOp) -> vk::BlendOp {
  match op {
    BlendOp::Add => vk::BlendOp::ADD,
    BlendOp::Subtract => vk::BlendOp::SUBTRACT,
    BlendOp::Min => vk::BlendOp::MIN,
    BlendOp::Max => vk::BlendOp::MAX,
  }
}

pub fn color_mask(m: ColorMask) -> vk::ColorComponentFlags {
  vk::ColorComponentFlags::from_raw(u32::from(m.bits()))
}

pub fn compare_op(op: CompareOp) -> vk::CompareOp {
  match op {
    CompareOp::Less => vk::CompareOp::LESS,
    CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
    CompareOp::Always => vk::CompareOp::ALWAYS,
  }
}

pub fn cull_mode(c: CullMode) -> vk::CullModeFlags {
  match c {
    CullMode::None => vk::CullModeFlags::NONE,
    CullMode::Back => vk::CullModeFlags::BACK,
  }
}

pub fn front_face(f: FrontFace) -> vk::FrontFace {
  match f {
    FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_survive_the_trip_through_vk() {
    for f in [
      Format::B8G8R8A8_SRGB,
      Format::R16G16B16A16_SFLOAT,
      Format::A2B10G10R10_UNORM,
      Format::D24_UNORM_S8_UINT,
    ] {
      assert_eq!(format_from_vk(format(f)), Some(f));
    }
    assert_eq!(format_from_vk(vk::Format::BC1_RGB_UNORM_BLOCK), None);
  }

  #[test]
  fn empty_stage_mask_widens() {
    let s = stages(PipelineStages::empty(), vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(s, vk::PipelineStageFlags::TOP_OF_PIPE);
    let s = stages(
      PipelineStages::FRAGMENT_SHADER | PipelineStages::COLOR_ATTACHMENT_OUTPUT,
      vk::PipelineStageFlags::TOP_OF_PIPE,
    );
    assert_eq!(
      s,
      vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
    );
  }

  #[test]
  fn depth_aspect_includes_stencil_when_present() {
    assert_eq!(aspect(Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
      aspect(Format::D24_UNORM_S8_UINT),
      vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert_eq!(aspect(Format::B8G8R8A8_SRGB), vk::ImageAspectFlags::COLOR);
  }

  #[test]
  fn sampled_depth_reads_only_the_depth_aspect() {
    assert_eq!(sampled_aspect(Format::D24_UNORM_S8_UINT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(sampled_aspect(Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(sampled_aspect(Format::R16G16B16A16_SFLOAT), vk::ImageAspectFlags::COLOR);
  }

  #[test]
  fn colour_mask_bits_line_up() {
    assert_eq!(color_mask(ColorMask::RGBA), vk::ColorComponentFlags::RGBA);
    assert_eq!(color_mask(ColorMask::R), vk::ColorComponentFlags::R);
  }
}
