// SPDX-License-Identifier: CEPL-1.0
//! Render pass descriptions and their validation.
//!
//! Attachments are addressed by position: subpasses and dependency edges
//! refer to them by index into [`PassDesc::attachments`].
use crate::device::Device;
use crate::error::{FrameError, Result};
use crate::types::{AccessFlags, Format, ImageLayout, LoadOp, PipelineStages, SampleCount, StoreOp};
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentSpec {
    pub name: String,
    pub format: Format,
    pub samples: SampleCount,
    pub load: LoadOp,
    pub store: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
    /// A later pass binds this attachment as a texture.
    pub sampled_later: bool,
}

impl AttachmentSpec {
    /// Cleared colour target that ends in `final_layout`.
    pub fn color(name: impl Into<String>, format: Format, final_layout: ImageLayout) -> Self {
        Self {
            name: name.into(),
            format,
            samples: SampleCount::X1,
            load: LoadOp::Clear,
            store: StoreOp::Store,
            initial_layout: ImageLayout::Undefined,
            final_layout,
            sampled_later: false,
        }
    }

    /// Cleared depth target whose contents are discarded after the pass.
    pub fn depth(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            format,
            samples: SampleCount::X1,
            load: LoadOp::Clear,
            store: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilAttachment,
            sampled_later: false,
        }
    }

    pub fn sampled(mut self) -> Self {
        self.sampled_later = true;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubpassSpec {
    pub colors: Vec<u32>,
    pub depth: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubpassRef {
    External,
    Index(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependencySpec {
    pub src: SubpassRef,
    pub dst: SubpassRef,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub by_region: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassDesc {
    pub name: String,
    pub attachments: Vec<AttachmentSpec>,
    pub subpasses: Vec<SubpassSpec>,
    pub dependencies: Vec<DependencySpec>,
}

impl PassDesc {
    fn fail(&self, reason: impl Into<String>) -> FrameError {
        FrameError::invalid_pass(self.name.clone(), reason)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subpasses.is_empty() {
            return Err(self.fail("no subpasses"));
        }
        let n = self.attachments.len() as u32;
        let mut referenced_as_depth = vec![false; self.attachments.len()];

        for (s, sub) in self.subpasses.iter().enumerate() {
            for (k, &c) in sub.colors.iter().enumerate() {
                if c >= n {
                    return Err(self.fail(format!(
                        "subpass {s} colour {k} references attachment {c} but only {n} exist"
                    )));
                }
                if sub.colors[..k].contains(&c) {
                    return Err(self.fail(format!("subpass {s} references attachment {c} twice")));
                }
                if self.attachments[c as usize].format.is_depth() {
                    return Err(self.fail(format!(
                        "subpass {s} uses depth attachment {c} as a colour target"
                    )));
                }
            }
            if let Some(d) = sub.depth {
                if d >= n {
                    return Err(self.fail(format!(
                        "subpass {s} depth references attachment {d} but only {n} exist"
                    )));
                }
                if sub.colors.contains(&d) {
                    return Err(self.fail(format!(
                        "subpass {s} references attachment {d} as both colour and depth"
                    )));
                }
                if !self.attachments[d as usize].format.is_depth() {
                    return Err(self.fail(format!(
                        "subpass {s} depth attachment {d} has colour format {:?}",
                        self.attachments[d as usize].format
                    )));
                }
                referenced_as_depth[d as usize] = true;
            }
        }

        for (i, a) in self.attachments.iter().enumerate() {
            if a.load == LoadOp::Load && a.initial_layout == ImageLayout::Undefined {
                return Err(self.fail(format!(
                    "attachment `{}` loads contents from an undefined layout",
                    a.name
                )));
            }
            if a.sampled_later && a.store != StoreOp::Store {
                return Err(self.fail(format!(
                    "attachment `{}` is sampled later but not stored",
                    a.name
                )));
            }
            if referenced_as_depth[i] {
                let want = if a.sampled_later {
                    ImageLayout::ShaderReadOnly
                } else {
                    ImageLayout::DepthStencilAttachment
                };
                if a.final_layout != want {
                    return Err(self.fail(format!(
                        "depth attachment `{}` must end in {want:?}, not {:?}",
                        a.name, a.final_layout
                    )));
                }
            }
        }

        let subs = self.subpasses.len() as u32;
        for (k, dep) in self.dependencies.iter().enumerate() {
            for r in [dep.src, dep.dst] {
                if let SubpassRef::Index(i) = r {
                    if i >= subs {
                        return Err(self.fail(format!(
                            "dependency {k} names subpass {i} but only {subs} exist"
                        )));
                    }
                }
            }
            if dep.src == SubpassRef::External && dep.dst == SubpassRef::External {
                return Err(self.fail(format!("dependency {k} is external on both sides")));
            }
        }
        Ok(())
    }

    /// Colour attachment count of the given subpass.
    pub fn color_count(&self, subpass: usize) -> usize {
        self.subpasses.get(subpass).map_or(0, |s| s.colors.len())
    }

    pub fn has_depth(&self, subpass: usize) -> bool {
        self.subpasses.get(subpass).is_some_and(|s| s.depth.is_some())
    }

    /// Whether a declared outgoing dependency makes writes to `attachment`
    /// visible to fragment-shader reads in later work.
    pub fn covers_sampled_read(&self, attachment: u32) -> bool {
        let Some(a) = self.attachments.get(attachment as usize) else {
            return false;
        };
        let (write, stage) = if a.format.is_depth() {
            (
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
            )
        } else {
            (
                AccessFlags::COLOR_ATTACHMENT_WRITE,
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            )
        };
        self.dependencies.iter().any(|d| {
            matches!(d.src, SubpassRef::Index(_))
                && d.dst == SubpassRef::External
                && d.src_access.contains(write)
                && d.src_stages.intersects(stage)
                && d.dst_access.contains(AccessFlags::SHADER_READ)
                && d.dst_stages.contains(PipelineStages::FRAGMENT_SHADER)
        })
    }

    pub fn formats(&self) -> impl Iterator<Item = Format> + '_ {
        self.attachments.iter().map(|a| a.format)
    }
}

/// A validated pass and the GPU object built from it.
pub struct Pass<D: Device> {
    raw: D::RenderPass,
    desc: PassDesc,
}

impl<D: Device> Pass<D> {
    pub fn raw(&self) -> &D::RenderPass {
        &self.raw
    }

    pub fn desc(&self) -> &PassDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }
}

pub fn build_pass<D: Device>(device: &D, desc: PassDesc) -> Result<Pass<D>> {
    desc.validate()?;
    let raw = device.create_render_pass(&desc)?;
    debug!(
        "pass `{}` built: {} attachments, {} dependencies",
        desc.name,
        desc.attachments.len(),
        desc.dependencies.len()
    );
    Ok(Pass { raw, desc })
}

#[cfg(test)]
#[path = "pass_tests.rs"]
mod tests;
