//! Render pass and framebuffers.
//!
//! The pass has a single subpass. Its attachments depend on the enabled
//! features:
//!
//! | samples | attachments                                   |
//! |---------|-----------------------------------------------|
//! | 1       | swapchain colour, depth?                      |
//! | > 1     | msaa colour, depth?, swapchain resolve target |
//!
//! Framebuffers bind image views in the same order.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Formats and sample count a [`RenderPass`] is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderPassDesc {
    /// Swapchain image format.
    pub color_format: vk::Format,
    /// Depth attachment format, `None` when depth testing is off.
    pub depth_format: Option<vk::Format>,
    /// Sample count of the colour and depth attachments.
    pub samples: vk::SampleCountFlags,
}

impl RenderPassDesc {
    /// True if the colour attachment is multisampled and needs a resolve target.
    #[inline]
    pub fn is_multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }

    /// Attachment descriptions in framebuffer order.
    pub fn attachments(&self) -> Vec<vk::AttachmentDescription> {
        let multisampled = self.is_multisampled();
        let mut attachments = Vec::with_capacity(3);

        attachments.push(
            vk::AttachmentDescription::default()
                .format(self.color_format)
                .samples(self.samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(if multisampled {
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                } else {
                    vk::ImageLayout::PRESENT_SRC_KHR
                }),
        );

        if let Some(depth_format) = self.depth_format {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(depth_format)
                    .samples(self.samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
        }

        if multisampled {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(self.color_format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            );
        }

        attachments
    }

    /// Dependency from the previous frame's use of the attachments.
    pub fn external_dependency(&self) -> vk::SubpassDependency {
        let mut stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let mut access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
        if self.depth_format.is_some() {
            stages |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
            access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }

        vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(access)
    }

    /// Orders the views of one framebuffer to match [`Self::attachments`].
    ///
    /// `color_view` is the multisampled target and is ignored for a
    /// single-sampled pass.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if a view the pass needs is missing.
    pub fn framebuffer_views(
        &self,
        swapchain_view: vk::ImageView,
        color_view: Option<vk::ImageView>,
        depth_view: Option<vk::ImageView>,
    ) -> RhiResult<Vec<vk::ImageView>> {
        let mut views = Vec::with_capacity(3);

        if self.is_multisampled() {
            views.push(color_view.ok_or_else(|| {
                RhiError::InvalidHandle("multisampled pass needs a colour view".to_string())
            })?);
        } else {
            views.push(swapchain_view);
        }

        if self.depth_format.is_some() {
            views.push(depth_view.ok_or_else(|| {
                RhiError::InvalidHandle("depth pass needs a depth view".to_string())
            })?);
        }

        if self.is_multisampled() {
            views.push(swapchain_view);
        }

        Ok(views)
    }

    /// Clear values in attachment order.
    pub fn clear_values(&self) -> Vec<vk::ClearValue> {
        let mut values = vec![vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];
        if self.depth_format.is_some() {
            values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        }
        values
    }
}

/// Vulkan render pass wrapper.
pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

impl RenderPass {
    /// Creates a single-subpass render pass from `desc`.
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(device: Arc<Device>, desc: RenderPassDesc) -> RhiResult<Self> {
        let attachments = desc.attachments();

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let resolve_refs = [vk::AttachmentReference {
            attachment: attachments.len() as u32 - 1,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if desc.depth_format.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        if desc.is_multisampled() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }

        let subpasses = [subpass];
        let dependencies = [desc.external_dependency()];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        debug!(
            "Created render pass ({} attachment(s), {:?})",
            attachments.len(),
            desc.samples
        );

        Ok(Self {
            device,
            render_pass,
            desc,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// The description the pass was built from.
    #[inline]
    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }

    /// True if the pass has a depth attachment.
    #[inline]
    pub fn has_depth(&self) -> bool {
        self.desc.depth_format.is_some()
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        debug!("Destroyed render pass");
    }
}

/// Vulkan framebuffer wrapper.
pub struct Framebuffer {
    device: Arc<Device>,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a framebuffer for `render_pass` over `views`.
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(depth: bool, samples: vk::SampleCountFlags) -> RenderPassDesc {
        RenderPassDesc {
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: depth.then_some(vk::Format::D32_SFLOAT),
            samples,
        }
    }

    #[test]
    fn test_single_sample_presents_from_color_attachment() {
        let attachments = desc(false, vk::SampleCountFlags::TYPE_1).attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_multisampled_pass_resolves_into_last_attachment() {
        let attachments = desc(true, vk::SampleCountFlags::TYPE_4).attachments();
        assert_eq!(attachments.len(), 3);

        assert_eq!(attachments[0].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(
            attachments[0].final_layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );

        assert_eq!(attachments[1].format, vk::Format::D32_SFLOAT);
        assert_eq!(attachments[1].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(attachments[1].store_op, vk::AttachmentStoreOp::DONT_CARE);

        assert_eq!(attachments[2].samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attachments[2].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_dependency_includes_depth_stage_only_with_depth() {
        let without = desc(false, vk::SampleCountFlags::TYPE_1).external_dependency();
        assert!(
            !without
                .dst_stage_mask
                .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
        );

        let with = desc(true, vk::SampleCountFlags::TYPE_1).external_dependency();
        assert!(
            with.dst_stage_mask
                .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
        );
        assert!(
            with.dst_access_mask
                .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
        assert_eq!(with.src_subpass, vk::SUBPASS_EXTERNAL);
    }

    #[test]
    fn test_framebuffer_views_follow_attachment_order() {
        use ash::vk::Handle;

        let swapchain = vk::ImageView::from_raw(1);
        let color = vk::ImageView::from_raw(2);
        let depth = vk::ImageView::from_raw(3);

        let msaa = desc(true, vk::SampleCountFlags::TYPE_8);
        assert_eq!(
            msaa.framebuffer_views(swapchain, Some(color), Some(depth))
                .unwrap(),
            vec![color, depth, swapchain]
        );

        let plain = desc(false, vk::SampleCountFlags::TYPE_1);
        assert_eq!(
            plain
                .framebuffer_views(swapchain, Some(color), None)
                .unwrap(),
            vec![swapchain]
        );
    }

    #[test]
    fn test_framebuffer_views_require_depth_view() {
        let result = desc(true, vk::SampleCountFlags::TYPE_1).framebuffer_views(
            vk::ImageView::null(),
            None,
            None,
        );
        assert!(matches!(result, Err(RhiError::InvalidHandle(_))));
    }

    #[test]
    fn test_clear_values_match_attachments_before_resolve() {
        assert_eq!(desc(false, vk::SampleCountFlags::TYPE_1).clear_values().len(), 1);
        assert_eq!(desc(true, vk::SampleCountFlags::TYPE_4).clear_values().len(), 2);
    }
}
