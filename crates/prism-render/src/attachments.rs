// SPDX-License-Identifier: CEPL-1.0
//! Off-screen attachment images and the framebuffers that bind them.
//!
//! Images are owned here and handed out as borrows only. Every image must
//! match the current surface extent; a mismatch is reported, never clamped.
use crate::device::{Device, FramebufferAttachment, GpuImage, ImageDesc, SwapchainImages};
use crate::error::{FrameError, Result};
use crate::pass::Pass;
use crate::types::{Extent2D, Format, ImageUsage, SampleCount};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentRole {
    Color { sampled: bool },
    Depth { sampled: bool },
}

impl AttachmentRole {
    pub fn usage(self) -> ImageUsage {
        let (base, sampled) = match self {
            AttachmentRole::Color { sampled } => (ImageUsage::COLOR_ATTACHMENT, sampled),
            AttachmentRole::Depth { sampled } => (ImageUsage::DEPTH_STENCIL_ATTACHMENT, sampled),
        };
        if sampled {
            base | ImageUsage::SAMPLED
        } else {
            base
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentDecl {
    pub name: String,
    pub format: Format,
    pub role: AttachmentRole,
}

/// What fills one attachment slot of a framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferTarget {
    Attachment(AttachmentId),
    /// The presentable image; one framebuffer is built per swapchain image.
    Swapchain,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramebufferPlan {
    pub targets: Vec<FramebufferTarget>,
}

impl FramebufferPlan {
    fn per_swapchain_image(&self) -> bool {
        self.targets.contains(&FramebufferTarget::Swapchain)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(pub usize);

pub struct AttachmentResources<D: Device> {
    extent: Extent2D,
    decls: Vec<AttachmentDecl>,
    images: Vec<D::Image>,
    plans: Vec<FramebufferPlan>,
    /// Per plan: one framebuffer, or one per swapchain image.
    framebuffers: Vec<Vec<D::Framebuffer>>,
}

impl<D: Device> AttachmentResources<D> {
    pub fn new(extent: Extent2D) -> Self {
        Self {
            extent,
            decls: Vec::new(),
            images: Vec::new(),
            plans: Vec::new(),
            framebuffers: Vec::new(),
        }
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// Registers an attachment; it is allocated by the next `rebuild_all`.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        format: Format,
        role: AttachmentRole,
    ) -> AttachmentId {
        self.decls.push(AttachmentDecl {
            name: name.into(),
            format,
            role,
        });
        AttachmentId(self.decls.len() - 1)
    }

    pub fn plan(&mut self, plan: FramebufferPlan) -> PlanId {
        self.plans.push(plan);
        PlanId(self.plans.len() - 1)
    }

    pub fn decl(&self, id: AttachmentId) -> Option<&AttachmentDecl> {
        self.decls.get(id.0)
    }

    /// Forgets every declaration, plan, image and framebuffer.
    pub fn clear(&mut self) {
        self.framebuffers.clear();
        self.images.clear();
        self.plans.clear();
        self.decls.clear();
    }

    pub fn image(&self, id: AttachmentId) -> Result<&D::Image> {
        self.images.get(id.0).ok_or_else(|| {
            FrameError::build(
                "attachment_image",
                format!("attachment {} is not allocated", id.0),
            )
        })
    }

    /// The image filling slot `slot` of `plan`. The swapchain slot has no
    /// single image and is an error.
    pub fn plan_image(&self, plan: PlanId, slot: u32) -> Result<&D::Image> {
        let targets = &self
            .plans
            .get(plan.0)
            .ok_or_else(|| {
                FrameError::build("attachment_image", format!("no framebuffer plan {}", plan.0))
            })?
            .targets;
        match targets.get(slot as usize) {
            Some(&FramebufferTarget::Attachment(id)) => self.image(id),
            Some(FramebufferTarget::Swapchain) => Err(FrameError::build(
                "attachment_image",
                format!("slot {slot} of plan {} is the swapchain image", plan.0),
            )),
            None => Err(FrameError::build(
                "attachment_image",
                format!("plan {} has {} slots, asked for {slot}", plan.0, targets.len()),
            )),
        }
    }

    pub fn framebuffer(&self, plan: PlanId, swapchain_index: usize) -> Result<&D::Framebuffer> {
        let set = self.framebuffers.get(plan.0).ok_or_else(|| {
            FrameError::build("framebuffer", format!("plan {} has no framebuffers", plan.0))
        })?;
        let k = if set.len() == 1 { 0 } else { swapchain_index };
        set.get(k).ok_or_else(|| {
            FrameError::build(
                "framebuffer",
                format!("plan {} has no framebuffer for image {swapchain_index}", plan.0),
            )
        })
    }

    /// Creates one image at `extent`, which must equal the current extent.
    pub fn allocate(
        &self,
        device: &D,
        name: &str,
        format: Format,
        usage: ImageUsage,
        extent: Extent2D,
    ) -> Result<D::Image> {
        if extent != self.extent {
            return Err(FrameError::ExtentMismatch {
                name: name.to_owned(),
                actual: extent,
                expected: self.extent,
            });
        }
        device.create_image(&ImageDesc {
            name: name.to_owned(),
            format,
            usage,
            extent,
            samples: SampleCount::X1,
        })
    }

    /// Reallocates every declared attachment at `extent`.
    ///
    /// Framebuffers are dropped with the old images; call
    /// [`rebuild_framebuffers`](Self::rebuild_framebuffers) afterwards.
    pub fn reallocate(&mut self, device: &D, extent: Extent2D) -> Result<()> {
        self.framebuffers.clear();
        self.images.clear();
        self.extent = extent;
        let mut images = Vec::with_capacity(self.decls.len());
        for d in &self.decls {
            images.push(self.allocate(device, &d.name, d.format, d.role.usage(), extent)?);
        }
        self.images = images;
        debug!("allocated {} attachments at {}", self.images.len(), extent);
        Ok(())
    }

    /// Rebuilds the framebuffer of each plan against `passes[i]`.
    pub fn rebuild_framebuffers(
        &mut self,
        device: &D,
        passes: &[&Pass<D>],
        swapchain: &D::Swapchain,
    ) -> Result<()> {
        if passes.len() != self.plans.len() {
            return Err(FrameError::build(
                "create_framebuffer",
                format!("{} plans for {} passes", self.plans.len(), passes.len()),
            ));
        }
        if swapchain.extent() != self.extent {
            return Err(FrameError::ExtentMismatch {
                name: "swapchain".into(),
                actual: swapchain.extent(),
                expected: self.extent,
            });
        }
        self.framebuffers.clear();
        let mut all = Vec::with_capacity(self.plans.len());
        for (plan, pass) in self.plans.iter().zip(passes) {
            self.check_plan(plan, pass, swapchain)?;
            let count = if plan.per_swapchain_image() {
                swapchain.image_count()
            } else {
                1
            };
            let mut fbs = Vec::with_capacity(count);
            for index in 0..count {
                let views = plan
                    .targets
                    .iter()
                    .map(|t| match *t {
                        FramebufferTarget::Attachment(id) => {
                            self.image(id).map(FramebufferAttachment::Image)
                        }
                        FramebufferTarget::Swapchain => {
                            Ok(FramebufferAttachment::Swapchain(swapchain, index))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                fbs.push(device.create_framebuffer(pass.raw(), &views, self.extent)?);
            }
            all.push(fbs);
        }
        self.framebuffers = all;
        debug!("rebuilt framebuffers for {} passes", passes.len());
        Ok(())
    }

    /// Reallocates every attachment, then every framebuffer.
    pub fn rebuild_all(
        &mut self,
        device: &D,
        extent: Extent2D,
        passes: &[&Pass<D>],
        swapchain: &D::Swapchain,
    ) -> Result<()> {
        self.reallocate(device, extent)?;
        self.rebuild_framebuffers(device, passes, swapchain)
    }

    fn check_plan(
        &self,
        plan: &FramebufferPlan,
        pass: &Pass<D>,
        swapchain: &D::Swapchain,
    ) -> Result<()> {
        let expected = &pass.desc().attachments;
        if plan.targets.len() != expected.len() {
            return Err(FrameError::invalid_pass(
                pass.name(),
                format!(
                    "framebuffer has {} attachments, pass declares {}",
                    plan.targets.len(),
                    expected.len()
                ),
            ));
        }
        for (i, (t, spec)) in plan.targets.iter().zip(expected).enumerate() {
            let (name, format, extent) = match *t {
                FramebufferTarget::Attachment(id) => {
                    let img = self.image(id)?;
                    let name = self.decl(id).map_or("", |d| d.name.as_str());
                    (name, img.format(), img.extent())
                }
                FramebufferTarget::Swapchain => {
                    ("swapchain", swapchain.format(), swapchain.extent())
                }
            };
            if format != spec.format {
                return Err(FrameError::invalid_pass(
                    pass.name(),
                    format!(
                        "framebuffer attachment {i} (`{name}`) is {format:?}, pass expects {:?}",
                        spec.format
                    ),
                ));
            }
            if extent != self.extent {
                return Err(FrameError::ExtentMismatch {
                    name: name.to_owned(),
                    actual: extent,
                    expected: self.extent,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
