use orb_ngin::{resources::mesh::load_mesh, Color, DrawMode};

use crate::common::test_utils::write_asset;

mod common;

const CUBE_FACE: &str = "\
mtllib face.mtl
o face
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
usemtl wood
f 1/1 2/2 3/3 4/4
";

const FACE_MTL: &str = "\
newmtl wood
map_Kd textures/wood.png
";

#[test]
fn obj_faces_are_triangulated() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "models/face.obj", CUBE_FACE);
    write_asset(dir.path(), "models/face.mtl", FACE_MTL);

    let file = load_mesh(Some(dir.path()), "models/face.obj").unwrap();
    assert_eq!(file.mesh.draw_mode(), DrawMode::Triangles);
    assert_eq!(file.mesh.vertices().len(), 6);
    assert_eq!(file.texture.as_deref(), Some("models/textures/wood.png"));

    // v is flipped so that the image origin is top left
    let first = file.mesh.vertices()[0];
    assert_eq!(first.position, [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(first.tex_coords, [0.0, 1.0]);
}

#[test]
fn obj_without_materials_still_loads() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "face.obj", CUBE_FACE);

    let file = load_mesh(Some(dir.path()), "face.obj").unwrap();
    assert_eq!(file.texture, None);
    assert_eq!(file.mesh.vertices().len(), 6);
}

#[test]
fn text_meshes_load_from_absolute_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_asset(
        dir.path(),
        "tri.mesh",
        "# red triangle\nmode 4\ncolour 1 0 0\nv 0 0 | 1 1 1 | 0 0\nv 1 0\nv 0 1\n",
    );

    let file = load_mesh(None, path.to_str().unwrap()).unwrap();
    assert_eq!(file.mesh.draw_mode(), DrawMode::Triangles);
    assert_eq!(file.mesh.color(), Color::new(1.0, 0.0, 0.0, 1.0));
    assert_eq!(file.mesh.vertices().len(), 3);
}

#[test]
fn text_mesh_textures_resolve_next_to_the_mesh() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(
        dir.path(),
        "models/quad.mesh",
        "mode triangle_strip\ntexture textures/crate.png\nv 0 0\nv 1 0\nv 0 1\nv 1 1\n",
    );

    let file = load_mesh(Some(dir.path()), "models/quad.mesh").unwrap();
    assert_eq!(file.texture.as_deref(), Some("models/textures/crate.png"));
}
