// SPDX-License-Identifier: CEPL-1.0
//! Ordered passes plus the textures later passes sample from earlier ones.
use crate::device::Device;
use crate::error::{FrameError, Result};
use crate::pass::Pass;
use crate::types::{AccessFlags, ImageBarrier, ImageLayout, PipelineStages};
use tracing::debug;

/// `consumer` samples attachment `attachment` of `producer` at `binding`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampledInput {
    pub consumer: usize,
    pub producer: usize,
    pub attachment: u32,
    pub binding: u32,
}

/// A sampled input after link analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputLink {
    pub input: SampledInput,
    /// An outgoing dependency of the producer already makes the write visible.
    pub covered: bool,
}

impl InputLink {
    /// Barrier the recorder emits before the consumer when no dependency
    /// covers the read. The layout is already shader-readable, so this is a
    /// pure memory dependency.
    pub fn barrier(&self, depth: bool) -> Option<ImageBarrier> {
        if self.covered {
            return None;
        }
        let (src_access, src_stages) = if depth {
            (
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                PipelineStages::LATE_FRAGMENT_TESTS,
            )
        } else {
            (
                AccessFlags::COLOR_ATTACHMENT_WRITE,
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            )
        };
        Some(ImageBarrier {
            old_layout: ImageLayout::ShaderReadOnly,
            new_layout: ImageLayout::ShaderReadOnly,
            src_access,
            dst_access: AccessFlags::SHADER_READ,
            src_stages,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
        })
    }
}

pub struct PassGraph<D: Device> {
    passes: Vec<Pass<D>>,
    links: Vec<InputLink>,
}

impl<D: Device> PassGraph<D> {
    /// Checks every sampled input against its producer and records whether
    /// an explicit barrier is needed.
    pub fn build(passes: Vec<Pass<D>>, inputs: &[SampledInput]) -> Result<Self> {
        let mut links = Vec::with_capacity(inputs.len());
        for (k, input) in inputs.iter().enumerate() {
            let consumer = passes.get(input.consumer).ok_or_else(|| {
                FrameError::invalid_pass(
                    format!("#{}", input.consumer),
                    format!("sampled input {k} names a pass that does not exist"),
                )
            })?;
            if input.producer >= input.consumer {
                return Err(FrameError::invalid_pass(
                    consumer.name(),
                    format!("samples pass {} which does not run earlier", input.producer),
                ));
            }
            if inputs[..k]
                .iter()
                .any(|o| o.consumer == input.consumer && o.binding == input.binding)
            {
                return Err(FrameError::invalid_pass(
                    consumer.name(),
                    format!("binding {} is sampled twice", input.binding),
                ));
            }
            let producer = &passes[input.producer];
            let spec = producer
                .desc()
                .attachments
                .get(input.attachment as usize)
                .ok_or_else(|| {
                    FrameError::invalid_pass(
                        producer.name(),
                        format!("has no attachment {} to sample", input.attachment),
                    )
                })?;
            if !spec.sampled_later {
                return Err(FrameError::invalid_pass(
                    producer.name(),
                    format!("attachment `{}` is sampled but not marked as sampled", spec.name),
                ));
            }
            if !spec.final_layout.is_shader_readable() {
                return Err(FrameError::invalid_pass(
                    producer.name(),
                    format!(
                        "attachment `{}` is sampled but ends in {:?}",
                        spec.name, spec.final_layout
                    ),
                ));
            }
            let covered = producer.desc().covers_sampled_read(input.attachment);
            if !covered {
                debug!(
                    "`{}` samples `{}` without a covering dependency; adding a barrier",
                    consumer.name(),
                    spec.name
                );
            }
            links.push(InputLink {
                input: *input,
                covered,
            });
        }
        Ok(Self { passes, links })
    }

    pub fn passes(&self) -> &[Pass<D>] {
        &self.passes
    }

    pub fn pass(&self, index: usize) -> Option<&Pass<D>> {
        self.passes.get(index)
    }

    pub fn links(&self) -> &[InputLink] {
        &self.links
    }

    /// Links that need an explicit barrier before `consumer` begins, with
    /// the barrier to record.
    pub fn barriers_before(
        &self,
        consumer: usize,
    ) -> impl Iterator<Item = (InputLink, ImageBarrier)> + '_ {
        self.links
            .iter()
            .filter(move |l| l.input.consumer == consumer)
            .filter_map(move |l| {
                let producer = self.passes[l.input.producer].desc();
                let depth = producer.attachments[l.input.attachment as usize].format.is_depth();
                l.barrier(depth).map(|b| (*l, b))
            })
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
