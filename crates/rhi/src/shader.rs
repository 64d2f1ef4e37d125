//! SPIR-V shader modules.
//!
//! The viewer uses exactly two modules, compiled ahead of time from
//! `shaders/shader.vert` and `shaders/shader.frag`. They are created once at
//! startup and outlive every pipeline rebuilt after a swapchain recreation.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vkroom_rhi::device::Device;
//! use vkroom_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkroom_rhi::RhiError> {
//! let vert = Shader::from_spirv_file(device, Path::new("shaders/vert.spv"), ShaderStage::Vertex)?;
//! let _stage = vert.stage_create_info();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

const SPIRV_MAGIC: u32 = 0x0723_0203;

const ENTRY_POINT: &CStr = c"main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[inline]
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// A shader module plus the stage it is bound to. Entry point is `main`.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    /// Loads a compiled `.spv` file.
    ///
    /// # Errors
    ///
    /// [`RhiError::ShaderError`] if the file is missing or is not SPIR-V;
    /// the Vulkan error if the driver rejects the module.
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("cannot read {} shader {:?}: {}", stage, path, e))
        })?;
        let code = spirv_words(&bytes)?;

        let module = unsafe {
            device
                .handle()
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&code), None)?
        };
        info!("Loaded {} shader {:?} ({} words)", stage, path, code.len());

        Ok(Self {
            device,
            module,
            stage,
        })
    }

    /// Borrowing stage description for [`crate::pipeline::GraphicsPipelineBuilder`].
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_shader_module(self.module, None) };
        debug!("{} shader module destroyed", self.stage);
    }
}

/// Decodes a SPIR-V binary into aligned words and checks the magic number.
fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    let code = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| RhiError::ShaderError(format!("malformed SPIR-V: {}", e)))?;

    match code.first() {
        Some(&SPIRV_MAGIC) => Ok(code),
        Some(&word) => Err(RhiError::ShaderError(format!(
            "not a SPIR-V module (magic {:#010x})",
            word
        ))),
        None => Err(RhiError::ShaderError("empty SPIR-V module".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flags_and_names() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_vk_stage(), vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_spirv_words_rejects_bad_length() {
        assert!(matches!(spirv_words(&[0u8; 5]), Err(RhiError::ShaderError(_))));
        assert!(matches!(spirv_words(&[]), Err(RhiError::ShaderError(_))));
    }

    #[test]
    fn test_spirv_words_checks_magic() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 0x0001_0000]);

        assert!(spirv_words(b"#version 450\n\0\0\0").is_err());
    }
}
