//! vkroom - Main Entry Point
//!
//! Opens a window and renders a textured, depth-tested, multisampled model
//! spinning in front of a fixed camera until the window is closed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vkroom_core::{AppConfig, FeatureSet, Timer};
use vkroom_platform::{SurfaceEvents, Window};
use vkroom_renderer::Renderer;

/// How often the average frame rate is logged.
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "vkroom", version, about = "Vulkan model viewer")]
struct Args {
    /// Initial window width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Wavefront OBJ model to display
    #[arg(long)]
    model: Option<PathBuf>,

    /// Texture applied to the model
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Compiled SPIR-V vertex shader
    #[arg(long)]
    vertex_shader: Option<PathBuf>,

    /// Compiled SPIR-V fragment shader
    #[arg(long)]
    fragment_shader: Option<PathBuf>,

    /// Disable the Khronos validation layer
    #[arg(long)]
    no_validation: bool,

    /// Disable the depth attachment
    #[arg(long)]
    no_depth: bool,

    /// Render with a single sample per pixel
    #[arg(long)]
    no_msaa: bool,

    /// Sample the texture without a mip chain
    #[arg(long)]
    no_mipmaps: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> AppConfig {
        let defaults = AppConfig::default();
        let features = FeatureSet::default();

        AppConfig {
            width: self.width,
            height: self.height,
            title: defaults.title,
            model_path: self.model.unwrap_or(defaults.model_path),
            texture_path: self.texture.unwrap_or(defaults.texture_path),
            vertex_shader_path: self.vertex_shader.unwrap_or(defaults.vertex_shader_path),
            fragment_shader_path: self
                .fragment_shader
                .unwrap_or(defaults.fragment_shader_path),
            features: FeatureSet {
                validation: features.validation && !self.no_validation,
                depth: !self.no_depth,
                msaa: !self.no_msaa,
                mipmaps: !self.no_mipmaps,
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    vkroom_core::init_logging(args.verbose);

    let config = args.into_config();
    config.validate()?;
    info!("Starting vkroom with {:?}", config);

    let mut window = Window::new(config.width, config.height, &config.title)
        .context("Failed to create window")?;
    let mut renderer = Renderer::new(&window, &config).context("Failed to create renderer")?;
    info!("Initialization complete, entering main loop");

    let mut timer = Timer::new();
    while !window.close_requested() {
        window.poll_events();
        if window.close_requested() {
            break;
        }

        renderer.draw_frame(&mut window)?;

        if let Some(fps) = timer.frame(FPS_REPORT_INTERVAL) {
            info!("{:.1} fps", fps);
        }
    }

    renderer.wait_idle()?;
    info!(
        "Shutting down after {} frame(s) in {:.1}s",
        renderer.frames_submitted(),
        timer.elapsed_secs()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_default_config() {
        let args = Args::parse_from(["vkroom"]);
        let config = args.into_config();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_feature_flags_disable_features() {
        let args = Args::parse_from([
            "vkroom",
            "--no-validation",
            "--no-depth",
            "--no-msaa",
            "--no-mipmaps",
        ]);
        let features = args.into_config().features;
        assert_eq!(
            features,
            FeatureSet {
                validation: false,
                depth: false,
                msaa: false,
                mipmaps: false,
            }
        );
    }

    #[test]
    fn test_paths_and_size_override_defaults() {
        let args = Args::parse_from([
            "vkroom",
            "--width",
            "1024",
            "--height",
            "768",
            "--model",
            "models/cube.obj",
            "--texture",
            "textures/cube.png",
        ]);
        let config = args.into_config();
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.model_path, PathBuf::from("models/cube.obj"));
        assert_eq!(config.texture_path, PathBuf::from("textures/cube.png"));
        assert_eq!(
            config.vertex_shader_path,
            AppConfig::default().vertex_shader_path
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
