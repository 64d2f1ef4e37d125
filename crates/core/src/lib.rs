//! Core utilities shared by every vkroom crate.
//!
//! This crate provides foundational types used across the viewer:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Application configuration and the renderer feature set

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, FeatureSet};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
