// SPDX-License-Identifier: CEPL-1.0
//! Render passes, framebuffers and graphics pipelines built from their
//! backend-neutral descriptions.
use crate::context::Ctx;
use crate::convert;
use crate::error;
use ash::util::read_spv;
use ash::vk;
use prism_render::pass::{PassDesc, SubpassRef};
use prism_render::pipeline::{PipelineDesc, ShaderCode, ViewportMode};
use prism_render::types::{Extent2D, ImageLayout};
use prism_render::{FrameError, Result};
use std::ffi::CString;
use std::rc::Rc;

pub struct VkRenderPass {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::RenderPass,
}

impl Drop for VkRenderPass {
  fn drop(&mut self) {
    unsafe { self.ctx.device.destroy_render_pass(self.raw, None) };
  }
}

pub struct VkFramebuffer {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::Framebuffer,
}

impl Drop for VkFramebuffer {
  fn drop(&mut self) {
    unsafe { self.ctx.device.destroy_framebuffer(self.raw, None) };
  }
}

/// Owns its layout; set layouts stay in the context cache.
pub struct VkPipeline {
  ctx: Rc<Ctx>,
  pub(crate) raw: vk::Pipeline,
  pub(crate) layout: vk::PipelineLayout,
}

impl Drop for VkPipeline {
  fn drop(&mut self) {
    unsafe {
      self.ctx.device.destroy_pipeline(self.raw, None);
      self.ctx.device.destroy_pipeline_layout(self.layout, None);
    }
  }
}

fn subpass_index(r: SubpassRef) -> u32 {
  match r {
    SubpassRef::External => vk::SUBPASS_EXTERNAL,
    SubpassRef::Index(i) => i,
  }
}

pub fn create_render_pass(ctx: &Rc<Ctx>, desc: &PassDesc) -> Result<VkRenderPass> {
  let attachments: Vec<vk::AttachmentDescription> = desc
    .attachments
    .iter()
    .map(|a| vk::AttachmentDescription {
      format: convert::format(a.format),
      samples: convert::samples(a.samples),
      load_op: convert::load_op(a.load),
      store_op: convert::store_op(a.store),
      stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
      stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
      initial_layout: convert::layout(a.initial_layout),
      final_layout: convert::layout(a.final_layout),
      ..Default::default()
    })
    .collect();

  // References must outlive the subpass descriptions that point at them.
  let color_refs: Vec<Vec<vk::AttachmentReference>> = desc
    .subpasses
    .iter()
    .map(|s| {
      s.colors
        .iter()
        .map(|&attachment| vk::AttachmentReference {
          attachment,
          layout: convert::layout(ImageLayout::ColorAttachment),
        })
        .collect()
    })
    .collect();
  let depth_refs: Vec<Option<vk::AttachmentReference>> = desc
    .subpasses
    .iter()
    .map(|s| {
      s.depth.map(|attachment| vk::AttachmentReference {
        attachment,
        layout: convert::layout(ImageLayout::DepthStencilAttachment),
      })
    })
    .collect();
  let subpasses: Vec<vk::SubpassDescription> = color_refs
    .iter()
    .zip(&depth_refs)
    .map(|(colors, depth)| vk::SubpassDescription {
      pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
      color_attachment_count: colors.len() as u32,
      p_color_attachments: colors.as_ptr(),
      p_depth_stencil_attachment: depth
        .as_ref()
        .map_or(std::ptr::null(), |d| d as *const vk::AttachmentReference),
      ..Default::default()
    })
    .collect();

  let dependencies: Vec<vk::SubpassDependency> = desc
    .dependencies
    .iter()
    .map(|d| vk::SubpassDependency {
      src_subpass: subpass_index(d.src),
      dst_subpass: subpass_index(d.dst),
      src_stage_mask: convert::stages(d.src_stages, vk::PipelineStageFlags::TOP_OF_PIPE),
      dst_stage_mask: convert::stages(d.dst_stages, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
      src_access_mask: convert::access(d.src_access),
      dst_access_mask: convert::access(d.dst_access),
      dependency_flags: if d.by_region {
        vk::DependencyFlags::BY_REGION
      } else {
        vk::DependencyFlags::empty()
      },
    })
    .collect();

  let rp_info = vk::RenderPassCreateInfo {
    s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
    attachment_count: attachments.len() as u32,
    p_attachments: attachments.as_ptr(),
    subpass_count: subpasses.len() as u32,
    p_subpasses: subpasses.as_ptr(),
    dependency_count: dependencies.len() as u32,
    p_dependencies: dependencies.as_ptr(),
    ..Default::default()
  };
  let raw = unsafe { ctx.device.create_render_pass(&rp_info, None) }
    .map_err(error::build("create_render_pass"))?;
  Ok(VkRenderPass { ctx: ctx.clone(), raw })
}

pub fn create_framebuffer(
  ctx: &Rc<Ctx>,
  pass: &VkRenderPass,
  views: &[vk::ImageView],
  extent: Extent2D,
) -> Result<VkFramebuffer> {
  let fb_info = vk::FramebufferCreateInfo {
    s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
    render_pass: pass.raw,
    attachment_count: views.len() as u32,
    p_attachments: views.as_ptr(),
    width: extent.width,
    height: extent.height,
    layers: 1,
    ..Default::default()
  };
  let raw = unsafe { ctx.device.create_framebuffer(&fb_info, None) }
    .map_err(error::build("create_framebuffer"))?;
  Ok(VkFramebuffer { ctx: ctx.clone(), raw })
}

struct ShaderModule<'a> {
  ctx: &'a Ctx,
  raw: vk::ShaderModule,
}

impl Drop for ShaderModule<'_> {
  fn drop(&mut self) {
    unsafe { self.ctx.device.destroy_shader_module(self.raw, None) };
  }
}

fn shader_module<'a>(ctx: &'a Ctx, code: &ShaderCode) -> Result<ShaderModule<'a>> {
  let ci = vk::ShaderModuleCreateInfo {
    s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
    code_size: code.spirv.len() * 4,
    p_code: code.spirv.as_ptr(),
    ..Default::default()
  };
  let raw = unsafe { ctx.device.create_shader_module(&ci, None) }
    .map_err(error::build("create_shader_module"))?;
  Ok(ShaderModule { ctx, raw })
}

/// Decodes a SPIR-V blob into words, checking magic and alignment.
pub fn decode_spirv(label: &str, bytes: &[u8]) -> Result<ShaderCode> {
  let spirv = read_spv(&mut std::io::Cursor::new(bytes))
    .map_err(|e| FrameError::build("load_shader", format!("{label}: {e}")))?;
  Ok(ShaderCode { label: label.to_string(), spirv })
}

pub fn create_pipeline(
  ctx: &Rc<Ctx>,
  pass: &VkRenderPass,
  desc: &PipelineDesc,
  extent: Extent2D,
) -> Result<VkPipeline> {
  let d = &ctx.device;
  let set_layouts = desc
    .set_layouts
    .iter()
    .map(|l| ctx.set_layout(l))
    .collect::<Result<Vec<_>>>()?;
  let layout_info = vk::PipelineLayoutCreateInfo {
    s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
    set_layout_count: set_layouts.len() as u32,
    p_set_layouts: set_layouts.as_ptr(),
    ..Default::default()
  };
  let layout = unsafe { d.create_pipeline_layout(&layout_info, None) }
    .map_err(error::build("create_pipeline_layout"))?;

  let built = build_pipeline(ctx, pass, desc, extent, layout);
  match built {
    Ok(raw) => Ok(VkPipeline { ctx: ctx.clone(), raw, layout }),
    Err(e) => {
      unsafe { d.destroy_pipeline_layout(layout, None) };
      Err(e)
    }
  }
}

fn build_pipeline(
  ctx: &Ctx,
  pass: &VkRenderPass,
  desc: &PipelineDesc,
  extent: Extent2D,
  layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
  let vs = shader_module(ctx, &desc.shaders.vertex)?;
  let fs = shader_module(ctx, &desc.shaders.fragment)?;
  let entry = CString::new(desc.shaders.entry_point)
    .map_err(|e| FrameError::invalid_pipeline(desc.name.clone(), e.to_string()))?;

  let stages = [
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::VERTEX,
      module: vs.raw,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
    vk::PipelineShaderStageCreateInfo {
      s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
      stage: vk::ShaderStageFlags::FRAGMENT,
      module: fs.raw,
      p_name: entry.as_ptr(),
      ..Default::default()
    },
  ];

  let bindings: Vec<vk::VertexInputBindingDescription> = desc
    .vertex_layout
    .bindings
    .iter()
    .map(|b| vk::VertexInputBindingDescription {
      binding: b.binding,
      stride: b.stride,
      input_rate: vk::VertexInputRate::VERTEX,
    })
    .collect();
  let attributes: Vec<vk::VertexInputAttributeDescription> = desc
    .vertex_layout
    .attributes
    .iter()
    .map(|a| vk::VertexInputAttributeDescription {
      location: a.location,
      binding: a.binding,
      format: convert::format(a.format),
      offset: a.offset,
    })
    .collect();
  let vertex_input = vk::PipelineVertexInputStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
    vertex_binding_description_count: bindings.len() as u32,
    p_vertex_binding_descriptions: bindings.as_ptr(),
    vertex_attribute_description_count: attributes.len() as u32,
    p_vertex_attribute_descriptions: attributes.as_ptr(),
    ..Default::default()
  };
  let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
    ..Default::default()
  };

  let viewport = vk::Viewport {
    x: 0.0,
    y: 0.0,
    width: extent.width as f32,
    height: extent.height as f32,
    min_depth: 0.0,
    max_depth: 1.0,
  };
  let scissor = vk::Rect2D {
    offset: vk::Offset2D { x: 0, y: 0 },
    extent: convert::extent(extent),
  };
  let baked = desc.viewport == ViewportMode::Baked;
  let viewport_state = vk::PipelineViewportStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
    viewport_count: 1,
    p_viewports: if baked { &viewport as *const vk::Viewport } else { std::ptr::null() },
    scissor_count: 1,
    p_scissors: if baked { &scissor as *const vk::Rect2D } else { std::ptr::null() },
    ..Default::default()
  };
  let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
  let dynamic_state = vk::PipelineDynamicStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
    dynamic_state_count: if baked { 0 } else { dynamic_states.len() as u32 },
    p_dynamic_states: dynamic_states.as_ptr(),
    ..Default::default()
  };

  let raster = vk::PipelineRasterizationStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
    polygon_mode: vk::PolygonMode::FILL,
    cull_mode: convert::cull_mode(desc.raster.cull),
    front_face: convert::front_face(desc.raster.front_face),
    line_width: 1.0,
    ..Default::default()
  };
  let multisample = vk::PipelineMultisampleStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
    rasterization_samples: vk::SampleCountFlags::TYPE_1,
    ..Default::default()
  };
  let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
    depth_test_enable: desc.depth.test.into(),
    depth_write_enable: desc.depth.write.into(),
    depth_compare_op: convert::compare_op(desc.depth.compare),
    max_depth_bounds: 1.0,
    ..Default::default()
  };

  let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
    .blend
    .iter()
    .map(|b| vk::PipelineColorBlendAttachmentState {
      blend_enable: b.blend_enable.into(),
      src_color_blend_factor: convert::blend_factor(b.src_factor),
      dst_color_blend_factor: convert::blend_factor(b.dst_factor),
      color_blend_op: convert::blend_op(b.op),
      src_alpha_blend_factor: convert::blend_factor(b.src_factor),
      dst_alpha_blend_factor: convert::blend_factor(b.dst_factor),
      alpha_blend_op: convert::blend_op(b.op),
      color_write_mask: convert::color_mask(b.write_mask),
    })
    .collect();
  let color_blend = vk::PipelineColorBlendStateCreateInfo {
    s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
    attachment_count: blend_attachments.len() as u32,
    p_attachments: blend_attachments.as_ptr(),
    ..Default::default()
  };

  let info = vk::GraphicsPipelineCreateInfo {
    s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
    stage_count: stages.len() as u32,
    p_stages: stages.as_ptr(),
    p_vertex_input_state: &vertex_input,
    p_input_assembly_state: &input_assembly,
    p_viewport_state: &viewport_state,
    p_rasterization_state: &raster,
    p_multisample_state: &multisample,
    p_depth_stencil_state: &depth_stencil,
    p_color_blend_state: &color_blend,
    p_dynamic_state: &dynamic_state,
    layout,
    render_pass: pass.raw,
    subpass: desc.subpass,
    ..Default::default()
  };

  let pipelines = unsafe {
    ctx
      .device
      .create_graphics_pipelines(ctx.pipeline_cache, std::slice::from_ref(&info), None)
  }
  .map_err(|(_, e)| error::build("create_graphics_pipelines")(e))?;
  pipelines
    .into_iter()
    .next()
    .ok_or_else(|| FrameError::build("create_graphics_pipelines", "driver returned no pipeline"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn spirv_decode_checks_magic() {
    let mut words = vec![0x0723_0203u32, 0x0001_0000, 0, 1, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let code = decode_spirv("tiny", &bytes).unwrap();
    assert_eq!(code.spirv.len(), 5);
    assert_eq!(code.label, "tiny");

    words[0] = 0xdead_beef;
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let err = decode_spirv("broken", &bytes).unwrap_err();
    assert_eq!(err.operation(), "load_shader");
  }

  #[test]
  fn spirv_decode_rejects_truncated_blob() {
    assert!(decode_spirv("short", &[0x03, 0x02, 0x23]).is_err());
  }

  #[test]
  fn external_subpass_maps_to_vk_constant() {
    assert_eq!(subpass_index(SubpassRef::External), vk::SUBPASS_EXTERNAL);
    assert_eq!(subpass_index(SubpassRef::Index(2)), 2);
  }
}
