//! Semaphores and fences for the frames-in-flight ring.
//!
//! Each frame slot owns two [`Semaphore`]s (image available, render
//! finished) and one [`Fence`] (in flight). The fence is what throttles the
//! CPU; the semaphores only order acquire, submit and present on the GPU.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkroom_rhi::device::Device;
//! use vkroom_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkroom_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//! let in_flight = Fence::new(device, true)?;
//!
//! in_flight.wait()?; // returns at once: created signaled
//! in_flight.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore, unsignaled at creation.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// # Errors
    ///
    /// Returns the Vulkan error if creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        debug!("Semaphore {:?} created", semaphore);

        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_semaphore(self.semaphore, None) };
        debug!("Semaphore {:?} destroyed", self.semaphore);
    }
}

/// Host-visible completion signal of one queue submission.
///
/// A fence must not be reset while a submission that signals it is still
/// pending; the frame controller guarantees this by waiting first.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates the fence. Frame slots start `signaled` so that the first
    /// wait on them falls straight through.
    ///
    /// # Errors
    ///
    /// Returns the Vulkan error if creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let fence = unsafe {
            device
                .handle()
                .create_fence(&fence_create_info(signaled), None)?
        };
        debug!("Fence {:?} created (signaled: {})", fence, signaled);

        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks without a timeout until the GPU signals the fence.
    ///
    /// # Errors
    ///
    /// Returns the Vulkan error, e.g. `ERROR_DEVICE_LOST`.
    pub fn wait(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, u64::MAX)?
        };
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the Vulkan error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_fence(self.fence, None) };
        debug!("Fence {:?} destroyed", self.fence);
    }
}

fn fence_create_info(signaled: bool) -> vk::FenceCreateInfo<'static> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    vk::FenceCreateInfo::default().flags(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_create_info_flags() {
        assert_eq!(fence_create_info(true).flags, vk::FenceCreateFlags::SIGNALED);
        assert!(fence_create_info(false).flags.is_empty());
    }
}
