// SPDX-License-Identifier: CEPL-1.0
//! Per-image frame slots and the fence/semaphore protocol between them.
//!
//! Each slot walks `Idle -> Recording -> Submitted -> Presented` and is
//! reused only after its fence has been observed signalled. Acquire always
//! signals a spare semaphore; once the slot for the acquired image is free,
//! the spare and the slot's image-available semaphore swap places.
use crate::device::{Device, SubmitInfo};
use crate::error::{FrameError, Result};
use crate::surface::PresentStatus;
use crate::types::PipelineStages;
use prism_core::ShutdownSignal;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording,
    Submitted,
    Presented,
}

impl SlotState {
    fn can_become(self, next: SlotState) -> bool {
        use SlotState::*;
        matches!(
            (self, next),
            (Idle | Presented, Recording) | (Recording, Submitted) | (Submitted, Presented)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotWait {
    Ready,
    /// The fence did not signal within one timeout; nothing changed.
    TimedOut,
    Cancelled,
}

pub struct FrameSlot<D: Device> {
    cmd: D::CommandBuffer,
    fence: D::Fence,
    image_available: D::Semaphore,
    render_finished: D::Semaphore,
    state: SlotState,
}

impl<D: Device> FrameSlot<D> {
    fn new(device: &D) -> Result<Self> {
        Ok(Self {
            cmd: device.create_command_buffer()?,
            fence: device.create_fence(true)?,
            image_available: device.create_semaphore()?,
            render_finished: device.create_semaphore()?,
            state: SlotState::Idle,
        })
    }

    pub fn state(&self) -> SlotState {
        self.state
    }
}

fn timeout_ns(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// One wait on `fence` of at most `timeout`. Shutdown is checked before
/// and after the wait.
pub fn wait_fence_bounded<D: Device>(
    device: &D,
    fence: &D::Fence,
    timeout: Duration,
    shutdown: &ShutdownSignal,
) -> Result<SlotWait> {
    if shutdown.is_requested() {
        return Ok(SlotWait::Cancelled);
    }
    if device.wait_for_fence(fence, timeout_ns(timeout))? {
        return Ok(SlotWait::Ready);
    }
    if shutdown.is_requested() {
        return Ok(SlotWait::Cancelled);
    }
    trace!("fence wait timed out after {timeout:?}");
    Ok(SlotWait::TimedOut)
}

pub struct FrameSynchronizer<D: Device> {
    slots: Vec<FrameSlot<D>>,
    spare: D::Semaphore,
    timeout: Duration,
    needs_recreate: bool,
}

impl<D: Device> FrameSynchronizer<D> {
    pub fn new(device: &D, image_count: usize, timeout: Duration) -> Result<Self> {
        let slots = (0..image_count)
            .map(|_| FrameSlot::new(device))
            .collect::<Result<Vec<_>>>()?;
        debug!("created {} frame slots", slots.len());
        Ok(Self {
            slots,
            spare: device.create_semaphore()?,
            timeout,
            needs_recreate: false,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(FrameSlot::state)
    }

    /// Semaphore the next acquire should signal.
    pub fn acquire_semaphore(&self) -> &D::Semaphore {
        &self.spare
    }

    pub fn render_finished(&self, index: usize) -> Result<&D::Semaphore> {
        Ok(&self.slot(index)?.render_finished)
    }

    pub fn command_buffer(&mut self, index: usize) -> Result<&mut D::CommandBuffer> {
        let slot = self.slot_mut(index)?;
        if slot.state != SlotState::Recording {
            return Err(FrameError::SlotState {
                index,
                from: slot.state,
                to: SlotState::Recording,
            });
        }
        Ok(&mut slot.cmd)
    }

    fn slot(&self, index: usize) -> Result<&FrameSlot<D>> {
        self.slots.get(index).ok_or_else(|| {
            FrameError::sync("frame_slot", format!("no slot {index} of {}", self.slots.len()))
        })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut FrameSlot<D>> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or_else(|| FrameError::sync("frame_slot", format!("no slot {index} of {count}")))
    }

    fn transition(&mut self, index: usize, to: SlotState) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if !slot.state.can_become(to) {
            return Err(FrameError::SlotState {
                index,
                from: slot.state,
                to,
            });
        }
        slot.state = to;
        Ok(())
    }

    /// Idle -> Recording for the slot of the image just acquired.
    ///
    /// Waits (bounded) for the slot's previous submission, then resets its
    /// fence and hands it the semaphore the acquire signalled. On
    /// [`SlotWait::TimedOut`] the slot is untouched and the call can be
    /// repeated for the same index.
    pub fn begin_recording(
        &mut self,
        device: &D,
        index: usize,
        shutdown: &ShutdownSignal,
    ) -> Result<SlotWait> {
        let timeout = self.timeout;
        let slot = self.slot(index)?;
        if !slot.state.can_become(SlotState::Recording) {
            return Err(FrameError::SlotState {
                index,
                from: slot.state,
                to: SlotState::Recording,
            });
        }
        match wait_fence_bounded(device, &slot.fence, timeout, shutdown)? {
            SlotWait::Ready => {}
            other => return Ok(other),
        }
        device.reset_fence(&slot.fence)?;
        let slot = &mut self.slots[index];
        std::mem::swap(&mut slot.image_available, &mut self.spare);
        self.transition(index, SlotState::Recording)?;
        Ok(SlotWait::Ready)
    }

    /// Recording -> Submitted. The command buffer must already be ended.
    pub fn submit(&mut self, device: &D, index: usize) -> Result<()> {
        let slot = self.slot(index)?;
        if slot.state != SlotState::Recording {
            return Err(FrameError::SlotState {
                index,
                from: slot.state,
                to: SlotState::Submitted,
            });
        }
        device.submit(SubmitInfo {
            cmd: &slot.cmd,
            wait: Some((
                &slot.image_available,
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            )),
            signal: Some(&slot.render_finished),
            fence: Some(&slot.fence),
        })?;
        self.transition(index, SlotState::Submitted)
    }

    /// Submitted -> Presented. A stale present schedules a rebuild.
    pub fn mark_presented(&mut self, index: usize, status: PresentStatus) -> Result<()> {
        self.transition(index, SlotState::Presented)?;
        if status == PresentStatus::Stale {
            self.request_recreate();
        }
        Ok(())
    }

    pub fn request_recreate(&mut self) {
        if !self.needs_recreate {
            debug!("swapchain rebuild requested");
        }
        self.needs_recreate = true;
    }

    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    /// Returns and clears the rebuild request.
    pub fn take_recreate(&mut self) -> bool {
        std::mem::take(&mut self.needs_recreate)
    }

    /// Replaces every slot after a swapchain rebuild. The queue must be idle.
    pub fn rebuild(&mut self, device: &D, image_count: usize) -> Result<()> {
        self.slots.clear();
        for _ in 0..image_count {
            self.slots.push(FrameSlot::new(device)?);
        }
        self.spare = device.create_semaphore()?;
        debug!("rebuilt {} frame slots", self.slots.len());
        Ok(())
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
