//! Integration tests for model and texture loading.

use std::fs;
use std::path::PathBuf;

use vkroom_resources::{Model, ResourceError, TextureData};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vkroom-{}-{}", std::process::id(), name))
}

const CUBE_FACE_OBJ: &str = "\
# two triangles sharing an edge
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3
f 3/3 4/4 1/1
";

#[test]
fn test_load_obj_deduplicates_vertices() {
    let path = temp_path("face.obj");
    fs::write(&path, CUBE_FACE_OBJ).unwrap();

    let model = Model::load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(model.vertices.len(), 4);
    assert_eq!(model.indices.len(), 6);
    assert_eq!(model.triangle_count(), 2);
    assert!(
        model
            .indices
            .iter()
            .all(|&i| (i as usize) < model.vertices.len())
    );

    // Bottom-left texel maps to the top of the image after the flip.
    let origin = model
        .vertices
        .iter()
        .find(|v| v.position.x == 0.0 && v.position.y == 0.0)
        .unwrap();
    assert_eq!(origin.tex_coord.y, 1.0);
}

#[test]
fn test_load_quad_face_is_triangulated() {
    let path = temp_path("quad.obj");
    fs::write(
        &path,
        "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
    )
    .unwrap();

    let model = Model::load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(model.triangle_count(), 2);
    assert_eq!(model.vertices.len(), 4);
}

#[test]
fn test_load_obj_without_faces_is_empty_model() {
    let path = temp_path("points.obj");
    fs::write(&path, "v 0 0 0\nv 1 0 0\n").unwrap();

    let result = Model::load(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(ResourceError::EmptyModel(_))));
}

#[test]
fn test_load_missing_obj_fails() {
    let result = Model::load(&temp_path("does-not-exist.obj"));
    assert!(matches!(result, Err(ResourceError::Obj { .. })));
}

#[test]
fn test_load_texture_as_rgba8() {
    let path = temp_path("checker.png");
    let img = image::RgbImage::from_fn(4, 2, |x, _| {
        if x % 2 == 0 {
            image::Rgb([255, 0, 0])
        } else {
            image::Rgb([0, 0, 255])
        }
    });
    img.save(&path).unwrap();

    let texture = TextureData::load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!((texture.width, texture.height), (4, 2));
    assert_eq!(texture.byte_len(), 4 * 2 * 4);
    assert_eq!(&texture.pixels[0..4], &[255, 0, 0, 255]);
    assert_eq!(&texture.pixels[4..8], &[0, 0, 255, 255]);
}

#[test]
fn test_load_missing_texture_fails() {
    let result = TextureData::load(&temp_path("does-not-exist.png"));
    assert!(result.is_err());
}
