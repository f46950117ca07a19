// SPDX-License-Identifier: CEPL-1.0
//! Records one frame's command buffer: uniform uploads, then each pass.
use crate::batch::MeshBatch;
use crate::device::{CommandEncoder, Device, GpuBuffer};
use crate::error::{FrameError, Result};
use crate::layout::{MATERIAL_SET, SCENE_SET};
use crate::pass::Pass;
use crate::pipeline::{Pipeline, ViewportMode};
use crate::types::{
    AccessFlags, BufferBarrier, ClearValue, Extent2D, ImageBarrier, PipelineStages,
};
use crate::uniform::check_update_size;

/// A payload written with `update_buffer` inside a read/write barrier pair.
pub struct UniformUpload<'a, D: Device> {
    pub name: &'static str,
    pub buffer: &'a D::Buffer,
    pub data: &'a [u8],
    /// Stages whose uniform reads must not overlap the write.
    pub consumers: PipelineStages,
}

pub enum DrawList<'a, D: Device> {
    /// The pass only clears its attachments.
    Nothing,
    /// One triangle covering the viewport, no vertex input.
    FullScreen,
    Batches {
        positions: &'a D::Buffer,
        normals: &'a D::Buffer,
        batches: &'a [MeshBatch],
        /// Bound at [`MATERIAL_SET`], indexed by `MeshBatch::material`.
        material_sets: &'a [D::DescriptorSet],
    },
}

pub struct PassRecording<'a, D: Device> {
    pub pass: &'a Pass<D>,
    pub framebuffer: &'a D::Framebuffer,
    pub pipeline: &'a Pipeline<D>,
    pub extent: Extent2D,
    pub clears: &'a [ClearValue],
    /// Bound once after the pipeline, starting at [`SCENE_SET`].
    pub sets: Vec<&'a D::DescriptorSet>,
    pub draws: DrawList<'a, D>,
    /// Explicit barriers emitted before the pass begins.
    pub barriers_before: Vec<(&'a D::Image, ImageBarrier)>,
}

fn check_upload<D: Device>(u: &UniformUpload<'_, D>) -> Result<()> {
    check_update_size(u.name, u.data.len())?;
    if u.data.len() as u64 > u.buffer.size() {
        return Err(FrameError::Uniform {
            name: u.name,
            size: u.data.len(),
            reason: "larger than the destination buffer",
        });
    }
    Ok(())
}

fn check_pass<D: Device>(p: &PassRecording<'_, D>) -> Result<()> {
    if p.pipeline.viewport_mode() == ViewportMode::Baked && p.pipeline.extent() != p.extent {
        return Err(FrameError::ExtentMismatch {
            name: p.pipeline.desc().name.clone(),
            actual: p.pipeline.extent(),
            expected: p.extent,
        });
    }
    let attachments = p.pass.desc().attachments.len();
    if p.clears.len() < attachments {
        return Err(FrameError::invalid_pass(
            p.pass.name(),
            format!("{} clear values for {attachments} attachments", p.clears.len()),
        ));
    }
    if let DrawList::Batches {
        batches,
        material_sets,
        ..
    } = &p.draws
    {
        if let Some(b) = batches
            .iter()
            .find(|b| b.material as usize >= material_sets.len())
        {
            return Err(FrameError::Batch(format!(
                "batch at vertex {} uses material {} but only {} sets exist",
                b.first_vertex,
                b.material,
                material_sets.len()
            )));
        }
    }
    Ok(())
}

/// Writes `upload` bracketed by a reader-to-writer and a writer-to-reader
/// barrier on the same buffer.
pub fn record_upload<D: Device>(cmd: &mut D::CommandBuffer, upload: &UniformUpload<'_, D>) {
    cmd.buffer_barrier(
        upload.buffer,
        BufferBarrier {
            src_access: AccessFlags::UNIFORM_READ,
            dst_access: AccessFlags::TRANSFER_WRITE,
            src_stages: upload.consumers,
            dst_stages: PipelineStages::TRANSFER,
        },
    );
    cmd.update_buffer(upload.buffer, 0, upload.data);
    cmd.buffer_barrier(
        upload.buffer,
        BufferBarrier {
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::UNIFORM_READ,
            src_stages: PipelineStages::TRANSFER,
            dst_stages: upload.consumers,
        },
    );
}

fn record_pass<D: Device>(cmd: &mut D::CommandBuffer, p: &PassRecording<'_, D>) {
    for (image, barrier) in &p.barriers_before {
        cmd.image_barrier(image, *barrier);
    }
    cmd.begin_pass(p.pass.raw(), p.framebuffer, p.extent, p.clears);
    let pipeline = p.pipeline.raw();
    cmd.bind_pipeline(pipeline);
    if p.pipeline.viewport_mode() == ViewportMode::Dynamic {
        cmd.set_viewport(p.extent);
    }
    for (index, set) in p.sets.iter().enumerate() {
        cmd.bind_descriptor_set(pipeline, SCENE_SET + index as u32, set);
    }
    match &p.draws {
        DrawList::Nothing => {}
        DrawList::FullScreen => cmd.draw(3, 0),
        DrawList::Batches {
            positions,
            normals,
            batches,
            material_sets,
        } => {
            for b in batches.iter() {
                let material = &material_sets[b.material as usize];
                cmd.bind_descriptor_set(pipeline, MATERIAL_SET, material);
                cmd.bind_vertex_buffers(0, &[*positions, *normals]);
                cmd.draw(b.vertex_count, b.first_vertex);
            }
        }
    }
    cmd.end_pass();
}

/// Records the whole frame into `cmd`.
///
/// Everything is validated before `begin`, so a rejected frame leaves the
/// command buffer untouched.
pub fn record<D: Device>(
    cmd: &mut D::CommandBuffer,
    uploads: &[UniformUpload<'_, D>],
    passes: &[PassRecording<'_, D>],
) -> Result<()> {
    uploads.iter().try_for_each(check_upload)?;
    passes.iter().try_for_each(check_pass)?;

    cmd.begin()?;
    for u in uploads {
        record_upload(cmd, u);
    }
    for p in passes {
        record_pass(cmd, p);
    }
    cmd.end()
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
