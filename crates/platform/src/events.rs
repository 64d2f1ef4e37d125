//! The windowing collaborator consumed by the render loop.

/// Window state the frame loop needs around acquire and present.
///
/// Implemented by [`Window`](crate::Window); tests provide scripted
/// implementations.
pub trait SurfaceEvents {
    /// Current drawable size in pixels. Either dimension is zero while the
    /// window is minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Blocks until at least one window event has been processed.
    fn wait_events(&mut self);

    /// Returns whether a resize happened since the last call, clearing the flag.
    fn take_resized(&mut self) -> bool;

    /// Whether the user asked to close the window.
    fn close_requested(&self) -> bool;
}
