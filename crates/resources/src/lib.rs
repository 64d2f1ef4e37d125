//! Resource loading.
//!
//! This crate handles loading of external assets:
//! - Wavefront OBJ models, de-duplicated into an indexed vertex list
//! - Textures decoded to tightly packed RGBA8

mod error;

pub mod model;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use model::Model;
pub use texture::TextureData;
