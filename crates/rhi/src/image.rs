//! Images with gpu-allocator managed memory.
//!
//! - attachments sized from the swapchain extent (MSAA color, depth)
//! - the sampled model texture, uploaded through staging with an optional
//!   mip chain generated by blits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkroom_rhi::device::Device;
//! use vkroom_rhi::image::Image;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkroom_rhi::RhiError> {
//! let depth = Image::depth_attachment(
//!     device,
//!     vk::Extent2D { width: 800, height: 600 },
//!     vk::Format::D32_SFLOAT,
//!     vk::SampleCountFlags::TYPE_4,
//! )?;
//! let view = depth.view();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool, one_time_submit};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Number of mip levels for a full chain down to 1x1.
pub fn mip_levels_for(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

/// Creates a 2D view over `mip_levels` levels of `image`.
///
/// # Errors
///
/// Returns an error if view creation fails.
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(mip_levels)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.handle().create_image_view(&view_info, None)? };
    Ok(view)
}

/// Parameters for [`Image::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub name: &'static str,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// A device-local 2D image with a view over all of its mip levels.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    name: &'static str,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
}

impl Image {
    /// Creates an image, binds GPU-only memory to it and creates its view.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero extent, or if image creation, allocation,
    /// binding or view creation fails.
    pub fn new(device: Arc<Device>, desc: &ImageDesc) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} dimensions must be greater than 0",
                desc.name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(desc.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        // Drop releases whatever has been created so far.
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            name: desc.name,
            format: desc.format,
            extent: desc.extent,
            mip_levels: desc.mip_levels,
        };

        let requirements = unsafe { this.device.handle().get_image_memory_requirements(image) };

        let allocation = this.device.lock_allocator()?.allocate(&AllocationCreateDesc {
            name: desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        unsafe {
            this.device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }
        this.allocation = Some(allocation);

        this.view = create_image_view(
            &this.device,
            image,
            desc.format,
            desc.aspect,
            desc.mip_levels,
        )?;

        debug!(
            "Created {}: {}x{} ({:?}, {} mip level(s), {:?})",
            desc.name,
            desc.extent.width,
            desc.extent.height,
            desc.format,
            desc.mip_levels,
            desc.samples
        );

        Ok(this)
    }

    /// Multisampled color target that is resolved into the swapchain image.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation fails.
    pub fn color_attachment(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        Self::new(
            device,
            &ImageDesc {
                name: "color_attachment",
                extent,
                format,
                mip_levels: 1,
                samples,
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                aspect: vk::ImageAspectFlags::COLOR,
            },
        )
    }

    /// Depth attachment. The render pass performs the layout transition.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation fails.
    pub fn depth_attachment(
        device: Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RhiResult<Self> {
        Self::new(
            device,
            &ImageDesc {
                name: "depth_attachment",
                extent,
                format,
                mip_levels: 1,
                samples,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
            },
        )
    }

    /// Uploads tightly packed RGBA8 `pixels` into an sRGB sampled image.
    ///
    /// With `mip_levels > 1` the remaining levels are generated by linear
    /// blits, which the format must support. The upload blocks on the
    /// graphics queue. The image ends in `SHADER_READ_ONLY_OPTIMAL`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ResourceError`] if the pixel data does not match the
    /// extent or linear blits are unsupported, or any Vulkan error.
    pub fn texture_rgba8(
        device: Arc<Device>,
        instance: &Instance,
        pool: &CommandPool,
        extent: vk::Extent2D,
        pixels: &[u8],
        mip_levels: u32,
    ) -> RhiResult<Self> {
        const FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

        let expected = extent.width as usize * extent.height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::ResourceError(format!(
                "texture data is {} bytes, expected {} for {}x{} RGBA8",
                pixels.len(),
                expected,
                extent.width,
                extent.height
            )));
        }

        if mip_levels > 1 {
            let properties = unsafe {
                instance
                    .handle()
                    .get_physical_device_format_properties(device.physical_device(), FORMAT)
            };
            if !properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
            {
                return Err(RhiError::ResourceError(format!(
                    "{:?} does not support linear blitting",
                    FORMAT
                )));
            }
        }

        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        let mut usage = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED;
        if mip_levels > 1 {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }

        let image = Self::new(
            device.clone(),
            &ImageDesc {
                name: "texture",
                extent,
                format: FORMAT,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                usage,
                aspect: vk::ImageAspectFlags::COLOR,
            },
        )?;

        one_time_submit(&device, pool, |cmd| {
            transition_layout(
                cmd,
                image.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                mip_levels,
            )?;

            let region = vk::BufferImageCopy::default()
                .image_subresource(color_layers(0))
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                });
            cmd.copy_buffer_to_image(
                staging.handle(),
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            if mip_levels > 1 {
                generate_mipmaps(cmd, image.image, extent, mip_levels);
                Ok(())
            } else {
                transition_layout(
                    cmd,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    1,
                )
            }
        })?;

        info!(
            "Texture uploaded: {}x{}, {} mip level(s)",
            extent.width, extent.height, mip_levels
        );

        Ok(image)
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the view covering every mip level.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free {} allocation: {:?}", self.name, e);
                    }
                }
                Err(e) => tracing::error!("Leaking {} allocation: {}", self.name, e),
            }
        }

        debug!(
            "Destroyed {}: {}x{}",
            self.name, self.extent.width, self.extent.height
        );
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .mip_level(mip_level)
        .base_array_layer(0)
        .layer_count(1)
}

/// Access masks and stages for the supported layout transitions.
struct TransitionMasks {
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
}

fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> Option<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => {
            Some(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            })
        }
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Some(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        _ => None,
    }
}

/// Records a layout transition over every mip level of a color image.
///
/// # Errors
///
/// Returns [`RhiError::ResourceError`] for an unsupported transition.
pub fn transition_layout(
    cmd: &CommandBuffer<'_>,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    mip_levels: u32,
) -> RhiResult<()> {
    let (barrier, masks) = layout_barrier(image, old_layout, new_layout, mip_levels)?;
    cmd.pipeline_barrier(masks.src_stage, masks.dst_stage, &[barrier]);
    Ok(())
}

fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    mip_levels: u32,
) -> RhiResult<(vk::ImageMemoryBarrier<'static>, TransitionMasks)> {
    let masks = transition_masks(old_layout, new_layout).ok_or_else(|| {
        RhiError::ResourceError(format!(
            "unsupported layout transition {:?} -> {:?}",
            old_layout, new_layout
        ))
    })?;

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(mip_levels)
                .base_array_layer(0)
                .layer_count(1),
        )
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access);

    Ok((barrier, masks))
}

/// Halves a mip dimension, never going below 1.
#[inline]
fn next_mip_dimension(dimension: i32) -> i32 {
    if dimension > 1 { dimension / 2 } else { 1 }
}

/// Fills levels `1..mip_levels` from level 0 and leaves every level in
/// `SHADER_READ_ONLY_OPTIMAL`. Level 0 must be in `TRANSFER_DST_OPTIMAL`.
fn generate_mipmaps(cmd: &CommandBuffer<'_>, image: vk::Image, extent: vk::Extent2D, mip_levels: u32) {
    let mut barrier = vk::ImageMemoryBarrier::default()
        .image(image)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let mut mip_width = extent.width as i32;
    let mut mip_height = extent.height as i32;

    for level in 1..mip_levels {
        barrier.subresource_range.base_mip_level = level - 1;
        barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
        barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            &[barrier],
        );

        let next_width = next_mip_dimension(mip_width);
        let next_height = next_mip_dimension(mip_height);

        let blit = vk::ImageBlit::default()
            .src_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: mip_width,
                    y: mip_height,
                    z: 1,
                },
            ])
            .src_subresource(color_layers(level - 1))
            .dst_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: next_width,
                    y: next_height,
                    z: 1,
                },
            ])
            .dst_subresource(color_layers(level));
        cmd.blit_image(
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
        barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[barrier],
        );

        mip_width = next_width;
        mip_height = next_height;
    }

    // The last level was only ever written to.
    barrier.subresource_range.base_mip_level = mip_levels - 1;
    barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
    barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
    barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
    barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
    cmd.pipeline_barrier(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        &[barrier],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_levels_for() {
        assert_eq!(mip_levels_for(1, 1), 1);
        assert_eq!(mip_levels_for(2, 1), 2);
        assert_eq!(mip_levels_for(1024, 1024), 11);
        assert_eq!(mip_levels_for(1024, 768), 11);
        assert_eq!(mip_levels_for(1000, 3), 10);
    }

    #[test]
    fn test_mip_levels_for_zero_is_one() {
        assert_eq!(mip_levels_for(0, 0), 1);
    }

    #[test]
    fn test_next_mip_dimension_stops_at_one() {
        assert_eq!(next_mip_dimension(1024), 512);
        assert_eq!(next_mip_dimension(3), 1);
        assert_eq!(next_mip_dimension(1), 1);
    }

    #[test]
    fn test_supported_transitions() {
        let upload = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(upload.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(upload.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let sample = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(sample.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(sample.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_single_level_upload_ends_shader_readable() {
        let (barrier, masks) = layout_barrier(
            vk::Image::null(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            1,
        )
        .unwrap();
        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barrier.subresource_range.level_count, 1);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_unsupported_transition() {
        assert!(
            transition_masks(
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::UNDEFINED
            )
            .is_none()
        );
    }
}
