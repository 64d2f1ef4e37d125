//! Platform abstraction layer for the viewer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit, driven by explicit event pumping
//! - Vulkan surface creation from raw window handles
//! - The [`SurfaceEvents`] trait the render loop consults for size and resize state

mod events;
mod window;

pub use events::SurfaceEvents;
pub use window::{Surface, Window, required_extensions};
