// SPDX-License-Identifier: CEPL-1.0
use crate::sync::SlotState;
use crate::types::Extent2D;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrameError>;

/// Every way a frame can fail.
///
/// Out-of-date and suboptimal presentation are not here: they are statuses
/// handled inside the frame loop by rebuilding the swapchain.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{op} failed: {status}")]
    Build { op: &'static str, status: String },

    #[error("{op} failed: {status}")]
    Sync { op: &'static str, status: String },

    #[error("{op} failed: {status}")]
    Command { op: &'static str, status: String },

    #[error("device lost during {op}")]
    DeviceLost { op: &'static str },

    #[error("surface lost during {op}")]
    SurfaceLost { op: &'static str },

    #[error("pass `{pass}` is invalid: {reason}")]
    InvalidPass { pass: String, reason: String },

    #[error("pipeline `{pipeline}` is invalid: {reason}")]
    InvalidPipeline { pipeline: String, reason: String },

    #[error("attachment `{name}` is {actual} but the surface is {expected}")]
    ExtentMismatch {
        name: String,
        actual: Extent2D,
        expected: Extent2D,
    },

    #[error("uniform `{name}` is {size} bytes: {reason}")]
    Uniform {
        name: &'static str,
        size: usize,
        reason: &'static str,
    },

    #[error("frame slot {index} cannot move from {from:?} to {to:?}")]
    SlotState {
        index: usize,
        from: SlotState,
        to: SlotState,
    },

    #[error("mesh batching failed: {0}")]
    Batch(String),
}

impl FrameError {
    pub fn build(op: &'static str, status: impl std::fmt::Display) -> Self {
        Self::Build {
            op,
            status: status.to_string(),
        }
    }

    pub fn sync(op: &'static str, status: impl std::fmt::Display) -> Self {
        Self::Sync {
            op,
            status: status.to_string(),
        }
    }

    pub fn command(op: &'static str, status: impl std::fmt::Display) -> Self {
        Self::Command {
            op,
            status: status.to_string(),
        }
    }

    pub fn invalid_pass(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPass {
            pass: pass.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pipeline(pipeline: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            pipeline: pipeline.into(),
            reason: reason.into(),
        }
    }

    /// Name of the operation that failed, for the exit diagnostic.
    pub fn operation(&self) -> &str {
        match self {
            FrameError::Build { op, .. }
            | FrameError::Sync { op, .. }
            | FrameError::Command { op, .. }
            | FrameError::DeviceLost { op }
            | FrameError::SurfaceLost { op } => op,
            FrameError::InvalidPass { .. } => "build_pass",
            FrameError::InvalidPipeline { .. } => "build_pipeline",
            FrameError::ExtentMismatch { .. } => "allocate_attachment",
            FrameError::Uniform { .. } => "upload_uniform",
            FrameError::SlotState { .. } => "frame_slot_transition",
            FrameError::Batch(_) => "split_batches",
        }
    }

    pub fn is_device_lost(&self) -> bool {
        matches!(self, FrameError::DeviceLost { .. })
    }
}
