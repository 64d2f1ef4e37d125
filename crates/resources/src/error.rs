//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to parse an OBJ file.
    #[error("Failed to load OBJ file '{path}': {source}")]
    Obj {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: tobj::LoadError,
    },

    /// The OBJ file parsed but contains no triangles.
    #[error("OBJ file '{0}' contains no geometry")]
    EmptyModel(PathBuf),

    /// A face refers to a vertex that does not exist.
    #[error("Index {index} out of range in mesh '{mesh}'")]
    IndexOutOfRange {
        /// Name of the offending mesh.
        mesh: String,
        /// The bad index.
        index: u32,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
