//! Uniform buffer object for the model shader.
//!
//! The structure matches the vertex shader's `UniformBufferObject` block at
//! binding 0. It uses `#[repr(C)]` and implements `Pod` and `Zeroable` so it
//! can be copied into a mapped buffer as bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Model rotation speed around Z, in degrees per second.
pub const ROTATION_DEGREES_PER_SEC: f32 = 90.0;

/// Vertical field of view, in degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;

pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 10.0;

/// Model, view and projection matrices.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Matrices for the spinning model `elapsed_secs` after start.
    ///
    /// The camera sits at (2, 2, 2) looking at the origin with Z up. The
    /// projection flips Y, since Vulkan clip space points Y down.
    pub fn spinning(elapsed_secs: f32, width: u32, height: u32) -> Self {
        let model = Mat4::from_rotation_z((elapsed_secs * ROTATION_DEGREES_PER_SEC).to_radians());
        let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);

        let aspect = width as f32 / height.max(1) as f32;
        let mut proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_ubo_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(UniformBufferObject::SIZE, 192);
        assert_eq!(
            bytemuck::bytes_of(&UniformBufferObject::default()).len(),
            192
        );
    }

    #[test]
    fn test_model_rotates_quarter_turn_per_second() {
        let ubo = UniformBufferObject::spinning(1.0, 800, 600);
        let x_axis = ubo.model.transform_vector3(Vec3::X);
        assert!(x_axis.abs_diff_eq(Vec3::Y, EPSILON));

        let start = UniformBufferObject::spinning(0.0, 800, 600);
        assert!(start.model.abs_diff_eq(Mat4::IDENTITY, EPSILON));
    }

    #[test]
    fn test_view_looks_at_origin() {
        let ubo = UniformBufferObject::spinning(0.0, 800, 600);
        let origin = ubo.view.transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z.
        assert!(origin.x.abs() < EPSILON);
        assert!(origin.y.abs() < EPSILON);
        assert!((origin.z + 12.0_f32.sqrt()).abs() < EPSILON);
    }

    #[test]
    fn test_projection_flips_y() {
        let ubo = UniformBufferObject::spinning(0.0, 800, 600);
        assert!(ubo.proj.y_axis.y < 0.0);

        // A point above the view axis lands in the upper half of Vulkan clip space.
        let clip = ubo.proj * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_projection_tracks_aspect_ratio() {
        let wide = UniformBufferObject::spinning(0.0, 1600, 800);
        let square = UniformBufferObject::spinning(0.0, 800, 800);
        assert!((square.proj.x_axis.x / wide.proj.x_axis.x - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_zero_height_does_not_produce_nan() {
        let ubo = UniformBufferObject::spinning(0.0, 800, 0);
        assert!(!ubo.proj.is_nan());
    }
}
