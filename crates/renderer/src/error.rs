//! Errors raised while setting up the renderer.

use thiserror::Error;

/// Setup failure from any of the layers the renderer builds on.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Rhi(#[from] vkroom_rhi::RhiError),

    #[error(transparent)]
    Platform(#[from] vkroom_core::Error),

    #[error(transparent)]
    Resource(#[from] vkroom_resources::ResourceError),
}

/// Result type alias for renderer setup.
pub type RendererResult<T> = Result<T, RendererError>;
