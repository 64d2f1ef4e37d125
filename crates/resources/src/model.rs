//! Model loading from Wavefront OBJ files.

use std::collections::HashMap;
use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::{debug, info, warn};
use vkroom_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// An indexed triangle list ready for upload.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Model {
    /// Unique vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl Model {
    /// Loads every mesh of an OBJ file into one indexed vertex list.
    ///
    /// Faces are triangulated. Vertex colour is white and the V texture
    /// coordinate is flipped, since OBJ puts the origin at the bottom left.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or contains no triangles.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let (models, materials) =
            tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| ResourceError::Obj {
                path: path.to_path_buf(),
                source,
            })?;

        if let Err(e) = materials {
            warn!("Ignoring materials of '{}': {}", path.display(), e);
        }

        let mut builder = ModelBuilder::default();
        for model in &models {
            builder.add_mesh(&model.name, &model.mesh)?;
        }

        let model = builder.finish();
        if model.indices.is_empty() {
            return Err(ResourceError::EmptyModel(path.to_path_buf()));
        }

        info!(
            "Loaded model '{}': {} vertices, {} indices",
            path.display(),
            model.vertices.len(),
            model.indices.len()
        );

        Ok(model)
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates meshes, merging vertices with identical bit patterns.
#[derive(Default)]
struct ModelBuilder {
    model: Model,
    unique: HashMap<[u32; 8], u32>,
}

impl ModelBuilder {
    fn add_mesh(&mut self, name: &str, mesh: &tobj::Mesh) -> ResourceResult<()> {
        let vertex_count = mesh.positions.len() / 3;
        let has_tex_coords = mesh.texcoords.len() / 2 >= vertex_count;

        for &index in &mesh.indices {
            let i = index as usize;
            if i >= vertex_count {
                return Err(ResourceError::IndexOutOfRange {
                    mesh: name.to_string(),
                    index,
                });
            }

            let position = Vec3::new(
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            );
            let tex_coord = if has_tex_coords {
                Vec2::new(mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1])
            } else {
                Vec2::ZERO
            };

            self.push(Vertex::new(position, Vec3::ONE, tex_coord));
        }

        debug!(
            "Mesh '{}': {} indices, {} unique vertices so far",
            name,
            mesh.indices.len(),
            self.model.vertices.len()
        );

        Ok(())
    }

    fn push(&mut self, vertex: Vertex) {
        let vertices = &mut self.model.vertices;
        let index = *self.unique.entry(vertex.bit_key()).or_insert_with(|| {
            vertices.push(vertex);
            (vertices.len() - 1) as u32
        });
        self.model.indices.push(index);
    }

    fn finish(self) -> Model {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> tobj::Mesh {
        tobj::Mesh {
            positions: vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 1.0, 0.0, //
                0.0, 1.0, 0.0,
            ],
            texcoords: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            indices: vec![0, 1, 2, 2, 3, 0],
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_vertices_are_merged() {
        let mut builder = ModelBuilder::default();
        builder.add_mesh("quad", &quad_mesh()).unwrap();
        let model = builder.finish();

        assert_eq!(model.vertices.len(), 4);
        assert_eq!(model.indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(model.triangle_count(), 2);
    }

    #[test]
    fn test_tex_coord_v_is_flipped() {
        let mut builder = ModelBuilder::default();
        builder.add_mesh("quad", &quad_mesh()).unwrap();
        let model = builder.finish();

        assert_eq!(model.vertices[0].tex_coord, Vec2::new(0.0, 1.0));
        assert_eq!(model.vertices[2].tex_coord, Vec2::new(1.0, 0.0));
        assert!(model.vertices.iter().all(|v| v.color == Vec3::ONE));
    }

    #[test]
    fn test_duplicates_across_meshes_are_merged() {
        let mut builder = ModelBuilder::default();
        builder.add_mesh("a", &quad_mesh()).unwrap();
        builder.add_mesh("b", &quad_mesh()).unwrap();
        let model = builder.finish();

        assert_eq!(model.vertices.len(), 4);
        assert_eq!(model.indices.len(), 12);
    }

    #[test]
    fn test_missing_tex_coords_default_to_zero() {
        let mesh = tobj::Mesh {
            texcoords: Vec::new(),
            ..quad_mesh()
        };
        let mut builder = ModelBuilder::default();
        builder.add_mesh("plain", &mesh).unwrap();
        let model = builder.finish();

        assert!(model.vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mesh = tobj::Mesh {
            indices: vec![0, 1, 7],
            ..quad_mesh()
        };
        let mut builder = ModelBuilder::default();
        let err = builder.add_mesh("broken", &mesh).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::IndexOutOfRange { index: 7, .. }
        ));
    }
}
