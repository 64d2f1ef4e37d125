//! Application configuration.
//!
//! The viewer is configured by a single [`AppConfig`]: window geometry, asset
//! locations and a [`FeatureSet`] describing which optional rendering
//! features the setup code enables.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Optional rendering features, consumed once by the renderer setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureSet {
    /// Enable the Khronos validation layer and debug messenger (if installed).
    pub validation: bool,
    /// Create a depth attachment and enable depth testing.
    pub depth: bool,
    /// Render with the highest sample count supported by color and depth.
    pub msaa: bool,
    /// Generate a full mip chain for the model texture.
    pub mipmaps: bool,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            depth: true,
            msaa: true,
            mipmaps: true,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// Wavefront OBJ model to display.
    pub model_path: PathBuf,
    /// Texture applied to the model.
    pub texture_path: PathBuf,
    /// Compiled SPIR-V vertex shader.
    pub vertex_shader_path: PathBuf,
    /// Compiled SPIR-V fragment shader.
    pub fragment_shader_path: PathBuf,
    /// Optional rendering features.
    pub features: FeatureSet,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan".to_string(),
            model_path: PathBuf::from("assets/viking_room.obj"),
            texture_path: PathBuf::from("assets/viking_room.png"),
            vertex_shader_path: PathBuf::from("shaders/vert.spv"),
            fragment_shader_path: PathBuf::from("shaders/frag.spv"),
            features: FeatureSet::default(),
        }
    }
}

impl AppConfig {
    /// Checks values that would otherwise fail deep inside Vulkan setup.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        let paths = [
            ("model", &self.model_path),
            ("texture", &self.texture_path),
            ("vertex shader", &self.vertex_shader_path),
            ("fragment shader", &self.fragment_shader_path),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(format!("{} path is empty", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.width, config.height), (800, 600));
    }

    #[test]
    fn test_default_features_enable_everything_but_validation_in_release() {
        let features = FeatureSet::default();
        assert!(features.depth);
        assert!(features.msaa);
        assert!(features.mipmaps);
        assert_eq!(features.validation, cfg!(debug_assertions));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let config = AppConfig {
            height: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = AppConfig {
            texture_path: PathBuf::new(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("texture"));
    }
}
