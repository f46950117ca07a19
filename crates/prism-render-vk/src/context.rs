// SPDX-License-Identifier: CEPL-1.0
//! Instance, device and the long-lived objects every other handle borrows.
//!
//! Every GPU handle keeps an `Rc<Ctx>`, so the context is destroyed only
//! after the last image, buffer or pipeline that was created from it.
use crate::convert;
use crate::error;
use anyhow::{anyhow, Context as _, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use prism_render::types::{Format, SetLayoutDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::fs;
use tracing::{debug, error, info, trace, warn};

/// Sets per descriptor pool. A full pool is never resized; another is added.
const SETS_PER_POOL: u32 = 64;
/// Largest sampled-image set the frame layouts declare.
const SAMPLERS_PER_SET: u32 = 4;

type DebugState = Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>;

pub struct Ctx {
  _entry: Entry,
  pub instance: Instance,
  debug: DebugState,
  pub surface_loader: surface::Instance,
  pub surface: vk::SurfaceKHR,

  pub phys: vk::PhysicalDevice,
  pub mem_props: vk::PhysicalDeviceMemoryProperties,
  pub device: ash::Device,
  pub queue: vk::Queue,
  pub swapchain_loader: swapchain::Device,

  pub cmd_pool: vk::CommandPool,
  /// Newest last. Sets remember their own pool for freeing.
  descriptor_pools: RefCell<Vec<vk::DescriptorPool>>,
  /// Nearest-filtered, edge-clamped; G-buffer reads use `texelFetch`.
  pub sampler: vk::Sampler,
  pub pipeline_cache: vk::PipelineCache,
  cache_path: PathBuf,
  set_layouts: RefCell<HashMap<SetLayoutDesc, vk::DescriptorSetLayout>>,

  pub depth_format: Format,
}

impl Drop for Ctx {
  fn drop(&mut self) {
    unsafe {
      let d = &self.device;
      d.device_wait_idle().ok();

      if let Err(e) = save_pipeline_cache(d, self.pipeline_cache, &self.cache_path) {
        warn!("pipeline cache not saved: {e:#}");
      }
      d.destroy_pipeline_cache(self.pipeline_cache, None);
      for (_, layout) in self.set_layouts.get_mut().drain() {
        d.destroy_descriptor_set_layout(layout, None);
      }
      d.destroy_sampler(self.sampler, None);
      for pool in self.descriptor_pools.get_mut().drain(..) {
        d.destroy_descriptor_pool(pool, None);
      }
      d.destroy_command_pool(self.cmd_pool, None);
      d.destroy_device(None);

      self.surface_loader.destroy_surface(self.surface, None);
      if let Some((loader, messenger)) = self.debug.take() {
        loader.destroy_debug_utils_messenger(messenger, None);
      }
      self.instance.destroy_instance(None);
    }
    debug!("vulkan context destroyed");
  }
}

impl Ctx {
  pub fn new(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle) -> Result<Rc<Self>> {
    unsafe { build_context(window, display) }.map(Rc::new)
  }

  /// Layouts are cached by shape and live as long as the context.
  pub fn set_layout(&self, desc: &SetLayoutDesc) -> prism_render::Result<vk::DescriptorSetLayout> {
    if let Some(&layout) = self.set_layouts.borrow().get(desc) {
      return Ok(layout);
    }
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
      .bindings
      .iter()
      .map(|b| vk::DescriptorSetLayoutBinding {
        binding: b.binding,
        descriptor_type: convert::descriptor_type(b.kind),
        descriptor_count: 1,
        stage_flags: convert::shader_stages(b.stages),
        ..Default::default()
      })
      .collect();
    let ci = vk::DescriptorSetLayoutCreateInfo {
      s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
      binding_count: bindings.len() as u32,
      p_bindings: bindings.as_ptr(),
      ..Default::default()
    };
    let layout = unsafe { self.device.create_descriptor_set_layout(&ci, None) }
      .map_err(error::build("create_descriptor_set_layout"))?;
    self.set_layouts.borrow_mut().insert(desc.clone(), layout);
    Ok(layout)
  }

  /// Allocates one set of `layout` from the first pool with room, newest
  /// first, adding a pool when all of them are exhausted.
  pub fn allocate_set(
    &self,
    layout: vk::DescriptorSetLayout,
  ) -> prism_render::Result<(vk::DescriptorPool, vk::DescriptorSet)> {
    let pools: Vec<vk::DescriptorPool> =
      self.descriptor_pools.borrow().iter().rev().copied().collect();
    for pool in pools {
      match unsafe { allocate_one(&self.device, pool, layout) } {
        Ok(set) => return Ok((pool, set)),
        Err(e) if pool_exhausted(e) => continue,
        Err(e) => return Err(error::build("allocate_descriptor_sets")(e)),
      }
    }
    let pool = unsafe { create_descriptor_pool(&self.device) }
      .map_err(error::build("create_descriptor_pool"))?;
    self.descriptor_pools.borrow_mut().push(pool);
    debug!(
      "descriptor pool #{} created ({SETS_PER_POOL} sets)",
      self.descriptor_pools.borrow().len()
    );
    let set = unsafe { allocate_one(&self.device, pool, layout) }
      .map_err(error::build("allocate_descriptor_sets"))?;
    Ok((pool, set))
  }

  pub fn find_memory_type(
    &self,
    type_bits: u32,
    req: vk::MemoryPropertyFlags,
  ) -> prism_render::Result<u32> {
    find_memory_type(&self.mem_props, type_bits, req).ok_or_else(|| {
      prism_render::FrameError::build(
        "allocate_memory",
        format!("no memory type with {req:?} in mask {type_bits:#x}"),
      )
    })
  }
}

/// Out-of-pool results mean "try another pool", not failure.
fn pool_exhausted(e: vk::Result) -> bool {
  matches!(
    e,
    vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL
  )
}

fn pool_sizes() -> [vk::DescriptorPoolSize; 2] {
  [
    vk::DescriptorPoolSize {
      ty: vk::DescriptorType::UNIFORM_BUFFER,
      descriptor_count: SETS_PER_POOL,
    },
    vk::DescriptorPoolSize {
      ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
      descriptor_count: SETS_PER_POOL * SAMPLERS_PER_SET,
    },
  ]
}

unsafe fn create_descriptor_pool(
  device: &ash::Device,
) -> ash::prelude::VkResult<vk::DescriptorPool> {
  let sizes = pool_sizes();
  let ci = vk::DescriptorPoolCreateInfo {
    s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
    flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
    max_sets: SETS_PER_POOL,
    pool_size_count: sizes.len() as u32,
    p_pool_sizes: sizes.as_ptr(),
    ..Default::default()
  };
  unsafe { device.create_descriptor_pool(&ci, None) }
}

unsafe fn allocate_one(
  device: &ash::Device,
  pool: vk::DescriptorPool,
  layout: vk::DescriptorSetLayout,
) -> ash::prelude::VkResult<vk::DescriptorSet> {
  let alloc = vk::DescriptorSetAllocateInfo {
    s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
    descriptor_pool: pool,
    descriptor_set_count: 1,
    p_set_layouts: &layout,
    ..Default::default()
  };
  let sets = unsafe { device.allocate_descriptor_sets(&alloc) }?;
  sets.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
}

pub(crate) fn find_memory_type(
  mem: &vk::PhysicalDeviceMemoryProperties,
  type_bits: u32,
  req: vk::MemoryPropertyFlags,
) -> Option<u32> {
  (0..mem.memory_type_count).find(|&i| {
    (type_bits & (1 << i)) != 0 && mem.memory_types[i as usize].property_flags.contains(req)
  })
}

unsafe extern "system" fn debug_callback(
  severity: vk::DebugUtilsMessageSeverityFlagsEXT,
  _types: vk::DebugUtilsMessageTypeFlagsEXT,
  data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
  _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
  if data.is_null() || unsafe { (*data).p_message.is_null() } {
    return vk::FALSE;
  }
  let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
  if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
    error!(target: "vulkan", "{msg}");
  } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
    warn!(target: "vulkan", "{msg}");
  } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
    debug!(target: "vulkan", "{msg}");
  } else {
    trace!(target: "vulkan", "{msg}");
  }
  vk::FALSE
}

unsafe fn create_debug_messenger(entry: &Entry, instance: &Instance) -> Result<DebugState> {
  let loader = ash::ext::debug_utils::Instance::new(entry, instance);
  let ci = vk::DebugUtilsMessengerCreateInfoEXT {
    s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
      | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
      | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
      | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
      | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
      | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
    pfn_user_callback: Some(debug_callback),
    ..Default::default()
  };
  let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
    .context("create_debug_utils_messenger")?;
  Ok(Some((loader, messenger)))
}

fn has_extension(props: &[vk::ExtensionProperties], name: &CStr) -> bool {
  props
    .iter()
    .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == name))
}

fn has_layer(props: &[vk::LayerProperties], name: &CStr) -> bool {
  props
    .iter()
    .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == name))
}

/// Validation is requested in debug builds when the loader offers it.
unsafe fn create_instance(
  entry: &Entry,
  display_raw: RawDisplayHandle,
) -> Result<(Instance, bool)> {
  let app_name = CString::new("Prism")?;

  let app_info = vk::ApplicationInfo {
    s_type: vk::StructureType::APPLICATION_INFO,
    p_application_name: app_name.as_ptr(),
    application_version: 0,
    p_engine_name: app_name.as_ptr(),
    engine_version: 0,
    api_version: vk::API_VERSION_1_0,
    ..Default::default()
  };

  let mut exts = ash_window::enumerate_required_extensions(display_raw)
    .context("enumerate_required_extensions")?
    .to_vec();

  let validation = CString::new("VK_LAYER_KHRONOS_validation")?;
  let mut layers = Vec::new();
  let mut debug_utils = false;
  if cfg!(debug_assertions) {
    let available_exts = unsafe { entry.enumerate_instance_extension_properties(None) }
      .context("enumerate_instance_extension_properties")?;
    if has_extension(&available_exts, ash::ext::debug_utils::NAME) {
      exts.push(ash::ext::debug_utils::NAME.as_ptr());
      debug_utils = true;
    }
    let available_layers = unsafe { entry.enumerate_instance_layer_properties() }
      .context("enumerate_instance_layer_properties")?;
    if has_layer(&available_layers, &validation) {
      layers.push(validation.as_ptr());
    } else {
      warn!("validation layer not installed; running without it");
    }
  }

  let create_info = vk::InstanceCreateInfo {
    s_type: vk::StructureType::INSTANCE_CREATE_INFO,
    p_application_info: &app_info,
    enabled_extension_count: exts.len() as u32,
    pp_enabled_extension_names: exts.as_ptr(),
    enabled_layer_count: layers.len() as u32,
    pp_enabled_layer_names: layers.as_ptr(),
    ..Default::default()
  };

  let instance = unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?;
  Ok((instance, debug_utils))
}

/// First device with a graphics queue that can present, discrete GPUs first.
unsafe fn pick_device_and_queue(
  instance: &Instance,
  surface_loader: &surface::Instance,
  surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
  let mut devices = unsafe { instance.enumerate_physical_devices() }?;
  devices.sort_by_key(|&p| {
    let props = unsafe { instance.get_physical_device_properties(p) };
    props.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
  });
  for phys in devices {
    let ext_props = unsafe { instance.enumerate_device_extension_properties(phys) }?;
    if !has_extension(&ext_props, swapchain::NAME) {
      continue;
    }
    let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    for (i, q) in qprops.iter().enumerate() {
      let present = unsafe {
        surface_loader.get_physical_device_surface_support(phys, i as u32, surface)
      }
      .unwrap_or(false);
      if q.queue_flags.contains(vk::QueueFlags::GRAPHICS) && present {
        return Ok((phys, i as u32));
      }
    }
  }
  Err(anyhow!("no physical device with a graphics queue that can present"))
}

/// Prefers 32-bit float, then packed stencil formats, then 16-bit. The
/// forward path samples depth, so the format must support sampling too.
unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> Result<Format> {
  let candidates = [
    Format::D32_SFLOAT,
    Format::D24_UNORM_S8_UINT,
    Format::D32_SFLOAT_S8_UINT,
    Format::D16_UNORM,
  ];
  candidates
    .into_iter()
    .find(|&f| {
      let props =
        unsafe { instance.get_physical_device_format_properties(phys, convert::format(f)) };
      props.optimal_tiling_features.contains(
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT | vk::FormatFeatureFlags::SAMPLED_IMAGE,
      )
    })
    .ok_or_else(|| anyhow!("no depth format is both attachable and sampleable"))
}

fn hex_bytes(b: &[u8]) -> String {
  use std::fmt::Write as _;
  b.iter().fold(String::with_capacity(b.len() * 2), |mut s, x| {
    let _ = write!(s, "{x:02x}");
    s
  })
}

/// Local file named after vendor, device, driver and cache UUID.
fn pipeline_cache_path(props: &vk::PhysicalDeviceProperties) -> PathBuf {
  PathBuf::from(format!(
    "vk_pipeline_cache_{:04x}_{:04x}_{:08x}_{}.bin",
    props.vendor_id,
    props.device_id,
    props.driver_version,
    hex_bytes(&props.pipeline_cache_uuid)
  ))
}

unsafe fn create_or_load_pipeline_cache(
  device: &ash::Device,
  path: &Path,
) -> Result<vk::PipelineCache> {
  let data = fs::read(path).ok();
  let (p_initial_data, initial_data_size) = match &data {
    Some(bytes) => (bytes.as_ptr().cast(), bytes.len()),
    None => (std::ptr::null(), 0),
  };
  let ci = vk::PipelineCacheCreateInfo {
    s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
    initial_data_size,
    p_initial_data,
    ..Default::default()
  };
  match unsafe { device.create_pipeline_cache(&ci, None) } {
    Ok(cache) => {
      if data.is_some() {
        debug!("pipeline cache loaded from {}", path.display());
      }
      Ok(cache)
    }
    // A stale blob from another driver is rejected; start empty instead.
    Err(_) if data.is_some() => {
      let ci = vk::PipelineCacheCreateInfo {
        s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
        ..Default::default()
      };
      Ok(unsafe { device.create_pipeline_cache(&ci, None) }.context("create_pipeline_cache")?)
    }
    Err(e) => Err(e).context("create_pipeline_cache"),
  }
}

unsafe fn save_pipeline_cache(
  device: &ash::Device,
  cache: vk::PipelineCache,
  path: &Path,
) -> Result<()> {
  let bytes = unsafe { device.get_pipeline_cache_data(cache) }.context("get_pipeline_cache_data")?;
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).ok();
  }
  fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
  debug!("pipeline cache saved ({} bytes)", bytes.len());
  Ok(())
}

unsafe fn build_context(
  window: &dyn HasWindowHandle,
  display: &dyn HasDisplayHandle,
) -> Result<Ctx> {
  // Instance, then a surface from that instance, then a device that can
  // present to that surface.
  let dh = display.display_handle().map_err(|e| anyhow!("{e}"))?.as_raw();
  let wh = window.window_handle().map_err(|e| anyhow!("{e}"))?.as_raw();

  let entry = Entry::linked();
  let (instance, debug_utils) = unsafe { create_instance(&entry, dh) }?;
  let debug = if debug_utils {
    unsafe { create_debug_messenger(&entry, &instance) }?
  } else {
    None
  };

  let surface_loader = surface::Instance::new(&entry, &instance);
  let surface = unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
    .context("create_surface")?;

  let (phys, queue_family) = unsafe { pick_device_and_queue(&instance, &surface_loader, surface) }?;
  let props = unsafe { instance.get_physical_device_properties(phys) };
  let mem_props = unsafe { instance.get_physical_device_memory_properties(phys) };
  let name = props
    .device_name_as_c_str()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  info!("using {name} (queue family {queue_family})");

  let priorities = [1.0_f32];
  let qinfo = vk::DeviceQueueCreateInfo {
    s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
    queue_family_index: queue_family,
    queue_count: 1,
    p_queue_priorities: priorities.as_ptr(),
    ..Default::default()
  };
  let device_exts = [swapchain::NAME.as_ptr()];
  let dinfo = vk::DeviceCreateInfo {
    s_type: vk::StructureType::DEVICE_CREATE_INFO,
    queue_create_info_count: 1,
    p_queue_create_infos: &qinfo,
    enabled_extension_count: device_exts.len() as u32,
    pp_enabled_extension_names: device_exts.as_ptr(),
    ..Default::default()
  };
  let device = unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;
  let queue = unsafe { device.get_device_queue(queue_family, 0) };
  let swapchain_loader = swapchain::Device::new(&instance, &device);

  let pool_info = vk::CommandPoolCreateInfo {
    s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
    queue_family_index: queue_family,
    flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
    ..Default::default()
  };
  let cmd_pool =
    unsafe { device.create_command_pool(&pool_info, None) }.context("create_command_pool")?;

  let descriptor_pool =
    unsafe { create_descriptor_pool(&device) }.context("create_descriptor_pool")?;

  let sampler_info = vk::SamplerCreateInfo {
    s_type: vk::StructureType::SAMPLER_CREATE_INFO,
    mag_filter: vk::Filter::NEAREST,
    min_filter: vk::Filter::NEAREST,
    mipmap_mode: vk::SamplerMipmapMode::NEAREST,
    address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
    address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
    address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
    max_lod: 0.0,
    ..Default::default()
  };
  let sampler = unsafe { device.create_sampler(&sampler_info, None) }.context("create_sampler")?;

  let cache_path = pipeline_cache_path(&props);
  let pipeline_cache = unsafe { create_or_load_pipeline_cache(&device, &cache_path) }?;
  let depth_format = unsafe { pick_depth_format(&instance, phys) }?;
  debug!("depth format {depth_format:?}");

  Ok(Ctx {
    _entry: entry,
    instance,
    debug,
    surface_loader,
    surface,
    phys,
    mem_props,
    device,
    queue,
    swapchain_loader,
    cmd_pool,
    descriptor_pools: RefCell::new(vec![descriptor_pool]),
    sampler,
    pipeline_cache,
    cache_path,
    set_layouts: RefCell::new(HashMap::new()),
    depth_format,
  })
}
