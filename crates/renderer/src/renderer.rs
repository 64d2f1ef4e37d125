//! Renderer setup and the Vulkan frame backend.
//!
//! [`RendererState`] owns every Vulkan object and implements
//! [`FrameBackend`]. Objects sized or formatted from the swapchain live in
//! [`SwapchainResources`] and are rebuilt as a unit. [`Renderer`] pairs the
//! state with a [`FrameSyncController`].
//!
//! # Resource Destruction Order
//!
//! Struct fields drop in declaration order, which encodes the teardown:
//! 1. Frame synchronization objects (after a device wait)
//! 2. Swapchain resources: command buffers, pipeline, pipeline layout,
//!    framebuffers, render pass, attachments, swapchain, uniform buffers,
//!    descriptor pool
//! 3. Model buffers, texture, sampler, shaders, descriptor set layout
//! 4. Command pool
//! 5. Device (last `Arc`), surface, instance

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use vkroom_core::{AppConfig, Timer};
use vkroom_platform::{Surface, SurfaceEvents, Window};
use vkroom_resources::{Model, TextureData};
use vkroom_rhi::buffer::{Buffer, BufferUsage};
use vkroom_rhi::command::{CommandBuffers, CommandPool};
use vkroom_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, update_descriptor_sets,
};
use vkroom_rhi::device::Device;
use vkroom_rhi::image::{Image, mip_levels_for};
use vkroom_rhi::instance::Instance;
use vkroom_rhi::physical_device::{find_depth_format, select_physical_device};
use vkroom_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkroom_rhi::render_pass::{Framebuffer, RenderPass, RenderPassDesc};
use vkroom_rhi::sampler::Sampler;
use vkroom_rhi::shader::{Shader, ShaderStage};
use vkroom_rhi::swapchain::Swapchain;
use vkroom_rhi::sync::{Fence, Semaphore};
use vkroom_rhi::vertex::Vertex;
use vkroom_rhi::{RhiError, RhiResult};

use crate::backend::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::error::RendererResult;
use crate::frame_sync::{FrameStatus, FrameSyncController};
use crate::ubo::UniformBufferObject;

/// Everything derived from the current swapchain.
struct SwapchainResources {
    command_buffers: CommandBuffers,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    framebuffers: Vec<Framebuffer>,
    render_pass: RenderPass,
    // Attachments and the pool are only referenced through handles.
    _depth_image: Option<Image>,
    _color_image: Option<Image>,
    swapchain: Swapchain,
    uniform_buffers: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
}

/// Device, model and swapchain state driven by the frame loop.
pub struct RendererState {
    swapchain: Option<SwapchainResources>,

    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    texture: Image,
    sampler: Sampler,
    vertex_shader: Shader,
    fragment_shader: Shader,
    descriptor_set_layout: DescriptorSetLayout,
    command_pool: CommandPool,

    samples: vk::SampleCountFlags,
    depth_format: Option<vk::Format>,
    timer: Timer,

    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
}

impl RendererState {
    /// Runs the full setup for `window` as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object cannot be created or an asset
    /// cannot be loaded.
    pub fn new(window: &Window, config: &AppConfig) -> RendererResult<Self> {
        let features = config.features;
        info!("Initializing renderer with {:?}", features);

        let extensions = window.required_extensions()?;
        let instance = Instance::new(features.validation, &extensions)?;
        info!(
            "Validation layer {}",
            if instance.has_validation() { "enabled" } else { "disabled" }
        );
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device)?;

        let samples = if features.msaa {
            physical_device.max_usable_sample_count()
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        let depth_format = if features.depth {
            Some(find_depth_format(instance.handle(), physical_device.device)?)
        } else {
            None
        };
        info!("Samples: {:?}, depth format: {:?}", samples, depth_format);

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let texture_data = TextureData::load(&config.texture_path)?;
        let mip_levels = if features.mipmaps {
            mip_levels_for(texture_data.width, texture_data.height)
        } else {
            1
        };
        let texture = Image::texture_rgba8(
            device.clone(),
            &instance,
            &command_pool,
            vk::Extent2D {
                width: texture_data.width,
                height: texture_data.height,
            },
            &texture_data.pixels,
            mip_levels,
        )?;
        let sampler = Sampler::new(
            device.clone(),
            physical_device.max_sampler_anisotropy(),
            texture.mip_levels(),
        )?;

        let model = Model::load(&config.model_path)?;
        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&model.vertices),
        )?;
        let index_buffer = Buffer::device_local_with_data(
            device.clone(),
            &command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(&model.indices),
        )?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &config.vertex_shader_path,
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &config.fragment_shader_path,
            ShaderStage::Fragment,
        )?;

        let descriptor_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
                DescriptorBindingBuilder::combined_image_sampler(
                    1,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
            ],
        )?;

        let mut state = Self {
            swapchain: None,
            vertex_buffer,
            index_buffer,
            index_count: model.indices.len() as u32,
            texture,
            sampler,
            vertex_shader,
            fragment_shader,
            descriptor_set_layout,
            command_pool,
            samples,
            depth_format,
            timer: Timer::new(),
            device,
            surface,
            instance,
        };

        let (width, height) = window.framebuffer_size();
        state.rebuild_swapchain(vk::Extent2D { width, height })?;

        info!("Renderer initialized");
        Ok(state)
    }

    fn resources(&self) -> RhiResult<&SwapchainResources> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("swapchain has not been built".to_string()))
    }

    /// Current swapchain extent, if a swapchain exists.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(|r| r.swapchain.extent())
    }

    /// The logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn build_swapchain_resources(
        &self,
        framebuffer_extent: vk::Extent2D,
    ) -> RhiResult<SwapchainResources> {
        let device = &self.device;

        let swapchain = Swapchain::new(
            &self.instance,
            device.clone(),
            self.surface.handle(),
            self.surface.loader(),
            (framebuffer_extent.width, framebuffer_extent.height),
        )?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let desc = RenderPassDesc {
            color_format: swapchain.format(),
            depth_format: self.depth_format,
            samples: self.samples,
        };
        let render_pass = RenderPass::new(device.clone(), desc)?;

        let color_image = if desc.is_multisampled() {
            Some(Image::color_attachment(
                device.clone(),
                extent,
                desc.color_format,
                self.samples,
            )?)
        } else {
            None
        };
        let depth_image = self
            .depth_format
            .map(|format| Image::depth_attachment(device.clone(), extent, format, self.samples))
            .transpose()?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                let views = desc.framebuffer_views(
                    view,
                    color_image.as_ref().map(Image::view),
                    depth_image.as_ref().map(Image::view),
                )?;
                Framebuffer::new(device.clone(), &render_pass, &views, extent)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[self.descriptor_set_layout.handle()])?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&self.vertex_shader)
            .fragment_shader(&self.fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .extent(extent)
            .rasterization_samples(self.samples)
            .build(device.clone(), &pipeline_layout, &render_pass)?;

        let uniform_buffers = (0..image_count)
            .map(|_| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    UniformBufferObject::SIZE as vk::DeviceSize,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let (descriptor_pool, descriptor_sets) = self.create_descriptor_sets(&uniform_buffers)?;

        let command_buffers = self.command_pool.allocate_command_buffers(image_count as u32)?;

        let resources = SwapchainResources {
            command_buffers,
            pipeline,
            pipeline_layout,
            framebuffers,
            render_pass,
            _depth_image: depth_image,
            _color_image: color_image,
            swapchain,
            uniform_buffers,
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
        };
        self.record_command_buffers(&resources)?;

        Ok(resources)
    }

    fn create_descriptor_sets(
        &self,
        uniform_buffers: &[Buffer],
    ) -> RhiResult<(DescriptorPool, Vec<vk::DescriptorSet>)> {
        let count = uniform_buffers.len() as u32;
        let pool = DescriptorPool::new(
            self.device.clone(),
            count,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: count,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: count,
                },
            ],
        )?;

        let layouts = vec![self.descriptor_set_layout.handle(); uniform_buffers.len()];
        let sets = pool.allocate(&layouts)?;

        let image_info = [vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.texture.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];

        for (&set, buffer) in sets.iter().zip(uniform_buffers) {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: UniformBufferObject::SIZE as vk::DeviceSize,
            }];
            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info),
            ];
            update_descriptor_sets(&self.device, &writes);
        }

        Ok((pool, sets))
    }

    /// Records the draw of the model into every per-image command buffer.
    fn record_command_buffers(&self, resources: &SwapchainResources) -> RhiResult<()> {
        let extent = resources.swapchain.extent();
        let clear_values = resources.render_pass.desc().clear_values();

        for (i, framebuffer) in resources.framebuffers.iter().enumerate() {
            let (Some(cmd), Some(&descriptor_set)) = (
                resources.command_buffers.get(i),
                resources.descriptor_sets.get(i),
            ) else {
                return Err(RhiError::InvalidHandle(format!(
                    "no command buffer or descriptor set for image {}",
                    i
                )));
            };

            cmd.begin_reusable()?;

            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(resources.render_pass.handle())
                .framebuffer(framebuffer.handle())
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            cmd.begin_render_pass(&begin_info);
            cmd.bind_graphics_pipeline(resources.pipeline.handle());
            cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
            cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT32);
            cmd.bind_descriptor_sets(resources.pipeline_layout.handle(), 0, &[descriptor_set]);
            cmd.draw_indexed(self.index_count, 1, 0, 0, 0);
            cmd.end_render_pass();

            cmd.end()?;
        }

        debug!(
            "Recorded {} command buffer(s)",
            resources.command_buffers.len()
        );
        Ok(())
    }

    fn update_uniform_buffer(
        &self,
        resources: &SwapchainResources,
        image_index: usize,
    ) -> RhiResult<()> {
        let extent = resources.swapchain.extent();
        let ubo =
            UniformBufferObject::spinning(self.timer.elapsed_secs(), extent.width, extent.height);

        let buffer = resources.uniform_buffers.get(image_index).ok_or_else(|| {
            RhiError::InvalidHandle(format!("no uniform buffer for image {}", image_index))
        })?;
        buffer.write_data(0, bytemuck::bytes_of(&ubo))
    }
}

impl FrameBackend for RendererState {
    type Fence = Fence;
    type Semaphore = Semaphore;

    fn create_fence(&mut self, signaled: bool) -> RhiResult<Fence> {
        Fence::new(self.device.clone(), signaled)
    }

    fn create_semaphore(&mut self) -> RhiResult<Semaphore> {
        Semaphore::new(self.device.clone())
    }

    fn wait_for_fence(&mut self, fence: &Fence) -> RhiResult<()> {
        fence.wait()
    }

    fn reset_fence(&mut self, fence: &Fence) -> RhiResult<()> {
        fence.reset()
    }

    fn acquire_next_image(&mut self, signal: &Semaphore) -> RhiResult<AcquireOutcome> {
        self.resources()?
            .swapchain
            .acquire_next_image(signal.handle())
    }

    fn submit(
        &mut self,
        image_index: u32,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> RhiResult<()> {
        let resources = self.resources()?;
        self.update_uniform_buffer(resources, image_index as usize)?;

        let command_buffer = resources
            .command_buffers
            .handle(image_index as usize)
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("no command buffer for image {}", image_index))
            })?;

        let wait_semaphores = [wait.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [signal.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer was fully recorded at rebuild time, the
        // wait semaphore was signaled by the acquire of this frame, and the
        // controller reset the fence just before this call.
        unsafe { self.device.submit_graphics(&[submit_info], fence.handle()) }
    }

    fn present(&mut self, image_index: u32, wait: &Semaphore) -> RhiResult<PresentOutcome> {
        self.resources()?.swapchain.present(
            self.device.present_queue(),
            image_index,
            wait.handle(),
        )
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn rebuild_swapchain(&mut self, framebuffer_extent: vk::Extent2D) -> RhiResult<usize> {
        // The old chain must be gone before the surface accepts a new one.
        self.swapchain = None;

        let resources = self.build_swapchain_resources(framebuffer_extent)?;
        let image_count = resources.swapchain.image_count();
        let extent = resources.swapchain.extent();
        self.swapchain = Some(resources);

        info!(
            "Swapchain resources built: {}x{}, {} images",
            extent.width, extent.height, image_count
        );
        Ok(image_count)
    }

    fn image_count(&self) -> usize {
        self.swapchain
            .as_ref()
            .map_or(0, |r| r.swapchain.image_count())
    }
}

/// The renderer: frame synchronization plus the Vulkan state it drives.
pub struct Renderer {
    frames: FrameSyncController<RendererState>,
    state: RendererState,
    frames_submitted: u64,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if setup fails.
    pub fn new(window: &Window, config: &AppConfig) -> RendererResult<Self> {
        let mut state = RendererState::new(window, config)?;
        let frames = FrameSyncController::new(&mut state)?;

        Ok(Self {
            frames,
            state,
            frames_submitted: 0,
        })
    }

    /// Draws one frame, rebuilding the swapchain when it goes stale.
    ///
    /// # Errors
    ///
    /// Returns an error for any non-recoverable Vulkan failure.
    pub fn draw_frame<W: SurfaceEvents>(&mut self, window: &mut W) -> RhiResult<FrameStatus> {
        let status = self.frames.draw_frame(&mut self.state, window)?;
        if status.submitted() {
            self.frames_submitted += 1;
        }
        Ok(status)
    }

    /// Blocks until the GPU has finished all submitted work.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.state.device().wait_idle()
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.state.extent()
    }

    /// Frames submitted since creation.
    #[inline]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Fences and semaphores may still be referenced by queued work.
        if let Err(e) = self.state.device().wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }
        info!(
            "Renderer destroyed after {} frame(s)",
            self.frames_submitted
        );
    }
}
