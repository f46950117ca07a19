// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use prism_render::FrameError;

/// Losses take precedence over the category the caller asked for.
fn lost(op: &'static str, r: vk::Result) -> Option<FrameError> {
  match r {
    vk::Result::ERROR_DEVICE_LOST => Some(FrameError::DeviceLost { op }),
    vk::Result::ERROR_SURFACE_LOST_KHR => Some(FrameError::SurfaceLost { op }),
    _ => None,
  }
}

pub fn build(op: &'static str) -> impl Fn(vk::Result) -> FrameError {
  move |r| lost(op, r).unwrap_or_else(|| FrameError::build(op, r))
}

pub fn sync(op: &'static str) -> impl Fn(vk::Result) -> FrameError {
  move |r| lost(op, r).unwrap_or_else(|| FrameError::sync(op, r))
}

pub fn command(op: &'static str) -> impl Fn(vk::Result) -> FrameError {
  move |r| lost(op, r).unwrap_or_else(|| FrameError::command(op, r))
}
