//! Frames-in-flight synchronization and swapchain recreation.
//!
//! [`FrameSyncController`] owns [`MAX_FRAMES_IN_FLIGHT`] frame slots, each
//! with an "image available" semaphore, a "render finished" semaphore and an
//! "in flight" fence. It also tracks, per swapchain image, which slot last
//! submitted work targeting that image.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on in_flight[slot]
//! 2. Acquire image (signals image_available[slot])
//!    out of date -> recreate, keep slot, return
//! 3. Wait on the fence of the slot that last used this image, if any
//! 4. Record this slot as the image's owner
//! 5. Reset in_flight[slot], submit:
//!    - wait image_available[slot] at colour output
//!    - signal render_finished[slot] and in_flight[slot]
//! 6. Present (waits render_finished[slot])
//!    suboptimal, out of date or window resized -> recreate
//! 7. slot = (slot + 1) % MAX_FRAMES_IN_FLIGHT
//! ```

use tracing::{debug, info};

use vkroom_platform::SurfaceEvents;
use vkroom_rhi::{RhiError, RhiResult};
use vkroom_rhi::vk;

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::backend::{AcquireOutcome, FrameBackend};

/// What happened during one call to [`FrameSyncController::draw_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented.
    Rendered,
    /// The frame was submitted, then the swapchain was rebuilt.
    RenderedAndRecreated,
    /// The swapchain was out of date at acquire; nothing was submitted.
    Skipped,
}

impl FrameStatus {
    /// True if command buffers went to the GPU this frame.
    ///
    /// Says nothing about visibility: a present that comes back out of date
    /// still counts as submitted.
    #[inline]
    pub fn submitted(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Synchronization objects of one frame slot.
struct FrameSlot<B: FrameBackend> {
    image_available: B::Semaphore,
    render_finished: B::Semaphore,
    in_flight: B::Fence,
}

/// Bounds the frames in flight and prevents two slots from rendering into
/// the same swapchain image at once.
pub struct FrameSyncController<B: FrameBackend> {
    slots: Vec<FrameSlot<B>>,
    /// Per swapchain image: the slot whose fence guards the last submission.
    image_fences: Vec<Option<usize>>,
    current_slot: usize,
}

impl<B: FrameBackend> FrameSyncController<B> {
    /// Creates the frame slots. Fences start signaled so the first
    /// [`MAX_FRAMES_IN_FLIGHT`] frames do not block.
    ///
    /// # Errors
    ///
    /// Returns an error if a semaphore or fence cannot be created.
    pub fn new(backend: &mut B) -> RhiResult<Self> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            slots.push(FrameSlot {
                image_available: backend.create_semaphore()?,
                render_finished: backend.create_semaphore()?,
                in_flight: backend.create_fence(true)?,
            });
        }

        let image_count = backend.image_count();
        info!(
            "Frame sync created: {} frames in flight, {} swapchain images",
            MAX_FRAMES_IN_FLIGHT, image_count
        );

        Ok(Self {
            slots,
            image_fences: vec![None; image_count],
            current_slot: 0,
        })
    }

    /// Index of the slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Slot that last submitted work for swapchain image `image_index`.
    #[inline]
    pub fn image_fence(&self, image_index: usize) -> Option<usize> {
        self.image_fences.get(image_index).copied().flatten()
    }

    /// Number of swapchain images tracked.
    #[inline]
    pub fn tracked_images(&self) -> usize {
        self.image_fences.len()
    }

    /// Renders and presents one frame.
    ///
    /// # Errors
    ///
    /// Returns the first fatal backend error. Stale swapchains are handled
    /// here and never returned.
    pub fn draw_frame<W: SurfaceEvents>(
        &mut self,
        backend: &mut B,
        window: &mut W,
    ) -> RhiResult<FrameStatus> {
        let slot_index = self.current_slot;
        let slot = &self.slots[slot_index];

        backend.wait_for_fence(&slot.in_flight)?;

        let image_index = match backend.acquire_next_image(&slot.image_available)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal swapchain", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire, skipping frame");
                self.recreate(backend, window)?;
                return Ok(FrameStatus::Skipped);
            }
        };

        let image = image_index as usize;
        if image >= self.image_fences.len() {
            return Err(RhiError::InvalidHandle(format!(
                "acquired image {} but the swapchain has {} images",
                image_index,
                self.image_fences.len()
            )));
        }

        if let Some(owner) = self.image_fences[image] {
            backend.wait_for_fence(&self.slots[owner].in_flight)?;
        }
        self.image_fences[image] = Some(slot_index);

        let slot = &self.slots[slot_index];
        backend.reset_fence(&slot.in_flight)?;
        backend.submit(
            image_index,
            &slot.image_available,
            &slot.render_finished,
            &slot.in_flight,
        )?;

        let outcome = backend.present(image_index, &slot.render_finished)?;
        let resized = window.take_resized();

        self.current_slot = (slot_index + 1) % MAX_FRAMES_IN_FLIGHT;

        if outcome.needs_recreate() || resized {
            debug!(
                "Recreating swapchain after present ({:?}, resized: {})",
                outcome, resized
            );
            if self.recreate(backend, window)? {
                return Ok(FrameStatus::RenderedAndRecreated);
            }
        }

        Ok(FrameStatus::Rendered)
    }

    /// Rebuilds the swapchain for the current framebuffer size.
    ///
    /// Blocks on window events while either dimension is zero. Returns
    /// `false` without rebuilding if the window is closed during that wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the device wait or the rebuild fails.
    pub fn recreate<W: SurfaceEvents>(
        &mut self,
        backend: &mut B,
        window: &mut W,
    ) -> RhiResult<bool> {
        let (mut width, mut height) = window.framebuffer_size();
        while width == 0 || height == 0 {
            if window.close_requested() {
                debug!("Window closed while minimized, not rebuilding swapchain");
                return Ok(false);
            }
            window.wait_events();
            (width, height) = window.framebuffer_size();
        }
        // The size below already reflects any pending resize.
        window.take_resized();

        backend.wait_idle()?;
        let image_count = backend.rebuild_swapchain(vk::Extent2D { width, height })?;
        self.image_fences = vec![None; image_count];

        info!(
            "Swapchain recreated: {}x{}, {} images",
            width, height, image_count
        );

        Ok(true)
    }
}
