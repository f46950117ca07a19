// SPDX-License-Identifier: CEPL-1.0
//! The presentable swapchain and its acquire/present protocol.
//!
//! Out-of-date and suboptimal results are reported as [`AcquireStatus::Stale`]
//! and [`PresentStatus::Stale`]. They are never errors: the frame loop
//! answers them by calling [`SurfaceAndSwapchain::recreate`].
use crate::device::{AcquireResult, Device, PresentResult, SwapchainImages};
use crate::error::{FrameError, Result};
use crate::types::{Extent2D, Format};
use prism_core::ShutdownSignal;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Presentation pacing requested from the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VsyncMode {
    /// Present immediately, tearing allowed.
    Off,
    #[default]
    Fifo,
    /// Low-latency vsync; the backend falls back to FIFO when unsupported.
    Mailbox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub extent: Extent2D,
    pub vsync: VsyncMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireStatus {
    Acquired { index: u32 },
    /// Do not record with this image; rebuild the swapchain first.
    Stale { suboptimal: bool },
    /// No image became available within the timeout. Nothing was signalled.
    TimedOut,
    /// Shutdown was requested before the attempt.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Stale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainChanges {
    pub format_changed: bool,
    pub size_changed: bool,
}

impl SwapchainChanges {
    pub fn any(&self) -> bool {
        self.format_changed || self.size_changed
    }
}

pub struct SurfaceAndSwapchain<D: Device> {
    swapchain: D::Swapchain,
    vsync: VsyncMode,
}

fn check_image_count<D: Device>(swapchain: &D::Swapchain) -> Result<()> {
    let n = swapchain.image_count();
    if n < 2 {
        return Err(FrameError::build(
            "create_swapchain",
            format!("backend returned {n} image(s), at least 2 are required"),
        ));
    }
    Ok(())
}

impl<D: Device> SurfaceAndSwapchain<D> {
    pub fn new(device: &D, extent: Extent2D, vsync: VsyncMode) -> Result<Self> {
        let swapchain = device.create_swapchain(&SwapchainRequest { extent, vsync })?;
        check_image_count::<D>(&swapchain)?;
        info!(
            "swapchain created: {} images, {:?}, {}",
            swapchain.image_count(),
            swapchain.format(),
            swapchain.extent()
        );
        Ok(Self { swapchain, vsync })
    }

    pub fn raw(&self) -> &D::Swapchain {
        &self.swapchain
    }

    pub fn format(&self) -> Format {
        self.swapchain.format()
    }

    pub fn extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn vsync(&self) -> VsyncMode {
        self.vsync
    }

    /// Takes effect on the next [`recreate`](Self::recreate).
    pub fn set_vsync(&mut self, vsync: VsyncMode) {
        self.vsync = vsync;
    }

    /// Makes one acquire attempt bounded by `timeout`, signalling `signal`
    /// on success.
    ///
    /// A timeout is reported as [`AcquireStatus::TimedOut`] rather than
    /// retried here; the caller returns to its event loop and tries again.
    pub fn acquire_frame(
        &self,
        device: &D,
        signal: &D::Semaphore,
        timeout: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<AcquireStatus> {
        if shutdown.is_requested() {
            return Ok(AcquireStatus::Cancelled);
        }
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        Ok(match device.acquire_next_image(&self.swapchain, signal, timeout_ns)? {
            AcquireResult::Acquired {
                index,
                suboptimal: false,
            } => AcquireStatus::Acquired { index },
            AcquireResult::Acquired {
                suboptimal: true, ..
            } => {
                debug!("acquire reported a suboptimal swapchain");
                AcquireStatus::Stale { suboptimal: true }
            }
            AcquireResult::OutOfDate => {
                debug!("acquire reported an out-of-date swapchain");
                AcquireStatus::Stale { suboptimal: false }
            }
            AcquireResult::Timeout => {
                trace!("acquire timed out after {timeout:?}");
                AcquireStatus::TimedOut
            }
        })
    }

    pub fn present(&self, device: &D, index: u32, wait: &D::Semaphore) -> Result<PresentStatus> {
        Ok(match device.present(&self.swapchain, index, wait)? {
            PresentResult::Presented => PresentStatus::Presented,
            PresentResult::Suboptimal | PresentResult::OutOfDate => PresentStatus::Stale,
        })
    }

    /// Rebuilds the swapchain at `extent`, retiring the old one.
    ///
    /// The caller must have drained the queue first.
    pub fn recreate(&mut self, device: &D, extent: Extent2D) -> Result<SwapchainChanges> {
        let old_format = self.format();
        let old_extent = self.extent();
        device.recreate_swapchain(
            &mut self.swapchain,
            &SwapchainRequest {
                extent,
                vsync: self.vsync,
            },
        )?;
        check_image_count::<D>(&self.swapchain)?;
        let changes = SwapchainChanges {
            format_changed: self.format() != old_format,
            size_changed: self.extent() != old_extent,
        };
        info!(
            "swapchain recreated: {} -> {}, {:?} -> {:?}",
            old_extent,
            self.extent(),
            old_format,
            self.format()
        );
        Ok(changes)
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
