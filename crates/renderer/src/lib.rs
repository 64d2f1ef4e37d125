//! Frame loop and swapchain lifecycle.
//!
//! This crate drives rendering:
//! - Frames-in-flight synchronization ([`FrameSyncController`])
//! - Swapchain recreation on resize or staleness
//! - The Vulkan renderer state and its setup ([`RendererState`], [`Renderer`])

mod error;

pub mod backend;
pub mod frame_sync;
pub mod renderer;
pub mod ubo;

pub use backend::FrameBackend;
pub use error::{RendererError, RendererResult};
pub use frame_sync::{FrameStatus, FrameSyncController};
pub use renderer::{Renderer, RendererState};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
