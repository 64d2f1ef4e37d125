//! The graphics collaborator driven by the frame loop.
//!
//! [`FrameBackend`] covers the device/queue calls one frame needs and the
//! swapchain rebuild. [`RendererState`](crate::RendererState) implements it
//! on Vulkan; tests implement it with a scripted fake.

use vkroom_rhi::RhiResult;
use vkroom_rhi::vk;

pub use vkroom_rhi::swapchain::{AcquireOutcome, PresentOutcome};

/// Device, queue and swapchain operations used by
/// [`FrameSyncController`](crate::FrameSyncController).
///
/// Any `Err` returned here is fatal to the frame loop. Out-of-date and
/// suboptimal swapchains are reported through the outcome enums.
pub trait FrameBackend {
    /// CPU-waitable completion signal.
    type Fence;
    /// GPU-side ordering signal between queue operations.
    type Semaphore;

    /// Creates a fence, optionally already signaled.
    fn create_fence(&mut self, signaled: bool) -> RhiResult<Self::Fence>;

    /// Creates an unsignaled binary semaphore.
    fn create_semaphore(&mut self) -> RhiResult<Self::Semaphore>;

    /// Blocks until `fence` is signaled.
    fn wait_for_fence(&mut self, fence: &Self::Fence) -> RhiResult<()>;

    /// Returns `fence` to the unsignaled state.
    fn reset_fence(&mut self, fence: &Self::Fence) -> RhiResult<()>;

    /// Requests the next presentable image, signaling `signal` once it is usable.
    fn acquire_next_image(&mut self, signal: &Self::Semaphore) -> RhiResult<AcquireOutcome>;

    /// Submits the work for `image_index` to the graphics queue.
    ///
    /// Waits on `wait` at colour-attachment output, then signals `signal`
    /// and `fence` on completion. Per-image data (uniforms) is updated first.
    fn submit(
        &mut self,
        image_index: u32,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> RhiResult<()>;

    /// Presents `image_index` once `wait` is signaled.
    fn present(&mut self, image_index: u32, wait: &Self::Semaphore) -> RhiResult<PresentOutcome>;

    /// Blocks until the device has no outstanding work.
    fn wait_idle(&mut self) -> RhiResult<()>;

    /// Destroys every swapchain-dependent resource and builds it again for
    /// `framebuffer_extent`. Returns the new swapchain image count.
    fn rebuild_swapchain(&mut self, framebuffer_extent: vk::Extent2D) -> RhiResult<usize>;

    /// Number of images in the current swapchain.
    fn image_count(&self) -> usize;
}
