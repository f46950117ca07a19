// SPDX-License-Identifier: CEPL-1.0
//! Host-visible staging buffers, reused across frames.
//!
//! A pool entry is keyed by `(slot, purpose)` and only grows: a request that
//! fits the existing buffer reuses it.
use crate::device::{CommandEncoder, Device, GpuBuffer, SubmitInfo};
use crate::error::{FrameError, Result};
use crate::sync::{wait_fence_bounded, SlotWait};
use crate::types::{AccessFlags, BufferBarrier, BufferUsage, PipelineStages};
use prism_core::ShutdownSignal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StagingPurpose {
    VertexPositions,
    VertexNormals,
    Readback,
}

/// Fence waits a transfer may take before it is reported as stuck.
const TRANSFER_WAITS: u32 = 50;

struct Transfer<D: Device> {
    cmd: D::CommandBuffer,
    fence: D::Fence,
    /// Submitted but not yet observed complete; the fence is unsignalled or
    /// signalled but not reset.
    in_flight: bool,
}

fn wait_transfer<D: Device>(
    device: &D,
    fence: &D::Fence,
    timeout: Duration,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    for _ in 0..TRANSFER_WAITS {
        match wait_fence_bounded(device, fence, timeout, shutdown)? {
            SlotWait::Ready => return Ok(()),
            SlotWait::Cancelled => {
                return Err(FrameError::sync(
                    "wait_for_fences",
                    "transfer cancelled by shutdown",
                ))
            }
            SlotWait::TimedOut => trace!("transfer still running"),
        }
    }
    Err(FrameError::sync(
        "wait_for_fences",
        format!("transfer unfinished after {:?}", timeout * TRANSFER_WAITS),
    ))
}

pub struct StagingPool<D: Device> {
    buffers: HashMap<(usize, StagingPurpose), D::Buffer>,
    transfer: Option<Transfer<D>>,
    timeout: Duration,
}

impl<D: Device> StagingPool<D> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            transfer: None,
            timeout,
        }
    }

    pub fn capacity(&self, slot: usize, purpose: StagingPurpose) -> Option<u64> {
        self.buffers.get(&(slot, purpose)).map(GpuBuffer::size)
    }

    /// Staging buffer of at least `size` bytes for `(slot, purpose)`.
    pub fn acquire(
        &mut self,
        device: &D,
        slot: usize,
        purpose: StagingPurpose,
        size: u64,
    ) -> Result<&D::Buffer> {
        let key = (slot, purpose);
        let fits = self.buffers.get(&key).is_some_and(|b| b.size() >= size);
        if !fits {
            let buffer = device.create_buffer(
                size,
                BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
                true,
            )?;
            debug!("staging {purpose:?} for slot {slot} grown to {size} bytes");
            self.buffers.insert(key, buffer);
        }
        self.buffers
            .get(&key)
            .ok_or_else(|| FrameError::build("create_buffer", "staging buffer missing"))
    }

    /// Runs `record` in a one-shot command buffer and blocks until it is done.
    ///
    /// A transfer abandoned by an earlier error or shutdown is drained and
    /// its fence reset before the command buffer is reused.
    fn run_transfer(
        &mut self,
        device: &D,
        shutdown: &ShutdownSignal,
        record: impl FnOnce(&mut D::CommandBuffer, &HashMap<(usize, StagingPurpose), D::Buffer>),
    ) -> Result<()> {
        if self.transfer.is_none() {
            self.transfer = Some(Transfer {
                cmd: device.create_command_buffer()?,
                fence: device.create_fence(false)?,
                in_flight: false,
            });
        }
        let timeout = self.timeout;
        let Some(t) = self.transfer.as_mut() else {
            return Err(FrameError::command("begin_command_buffer", "no transfer buffer"));
        };
        if t.in_flight {
            debug!("draining an abandoned transfer");
            wait_transfer(device, &t.fence, timeout, shutdown)?;
            device.reset_fence(&t.fence)?;
            t.in_flight = false;
        }
        t.cmd.begin()?;
        record(&mut t.cmd, &self.buffers);
        t.cmd.end()?;
        device.submit(SubmitInfo {
            cmd: &t.cmd,
            wait: None,
            signal: None,
            fence: Some(&t.fence),
        })?;
        t.in_flight = true;
        wait_transfer(device, &t.fence, timeout, shutdown)?;
        device.reset_fence(&t.fence)?;
        t.in_flight = false;
        Ok(())
    }

    /// Copies `data` into a new device-local buffer with `usage`.
    pub fn upload(
        &mut self,
        device: &D,
        purpose: StagingPurpose,
        data: &[u8],
        usage: BufferUsage,
        shutdown: &ShutdownSignal,
    ) -> Result<D::Buffer> {
        let size = data.len() as u64;
        let staging = self.acquire(device, 0, purpose, size)?;
        device.write_buffer(staging, 0, data)?;
        let target = device.create_buffer(size, usage | BufferUsage::TRANSFER_DST, false)?;
        let key = (0, purpose);
        self.run_transfer(device, shutdown, |cmd, buffers| {
            if let Some(src) = buffers.get(&key) {
                cmd.copy_buffer(src, &target, size);
            }
            cmd.buffer_barrier(
                &target,
                BufferBarrier {
                    src_access: AccessFlags::TRANSFER_WRITE,
                    dst_access: AccessFlags::VERTEX_ATTRIBUTE_READ | AccessFlags::UNIFORM_READ,
                    src_stages: PipelineStages::TRANSFER,
                    dst_stages: PipelineStages::VERTEX_INPUT | PipelineStages::VERTEX_SHADER,
                },
            );
        })?;
        Ok(target)
    }

    /// Reads back the first `size` bytes of a device-local buffer.
    ///
    /// Transfer writes recorded by earlier submissions are made visible
    /// first, so a uniform written with `update_buffer` reads back its
    /// latest value.
    pub fn download(
        &mut self,
        device: &D,
        slot: usize,
        src: &D::Buffer,
        size: u64,
        shutdown: &ShutdownSignal,
    ) -> Result<Vec<u8>> {
        self.acquire(device, slot, StagingPurpose::Readback, size)?;
        let key = (slot, StagingPurpose::Readback);
        self.run_transfer(device, shutdown, |cmd, buffers| {
            cmd.buffer_barrier(
                src,
                BufferBarrier {
                    src_access: AccessFlags::TRANSFER_WRITE,
                    dst_access: AccessFlags::TRANSFER_READ,
                    src_stages: PipelineStages::TRANSFER,
                    dst_stages: PipelineStages::TRANSFER,
                },
            );
            if let Some(dst) = buffers.get(&key) {
                cmd.copy_buffer(src, dst, size);
                cmd.buffer_barrier(
                    dst,
                    BufferBarrier {
                        src_access: AccessFlags::TRANSFER_WRITE,
                        dst_access: AccessFlags::HOST_READ,
                        src_stages: PipelineStages::TRANSFER,
                        dst_stages: PipelineStages::HOST,
                    },
                );
            }
        })?;
        let staging = self
            .buffers
            .get(&key)
            .ok_or_else(|| FrameError::build("map_memory", "readback buffer missing"))?;
        let mut bytes = device.read_buffer(staging)?;
        bytes.truncate(size as usize);
        Ok(bytes)
    }
}
