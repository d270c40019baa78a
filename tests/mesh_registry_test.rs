use orb_ngin::{
    data_structures::{mesh::MeshKind, vertex::Vertex},
    registry::mesh::MeshRegistry,
    resources::mesh::encode_binary,
    Color, DrawMode,
};

use crate::common::test_utils::{registry, write_asset};

mod common;

#[test]
fn end_mesh_while_idle_returns_none() {
    let mut meshes = MeshRegistry::new();
    assert!(!meshes.is_building());
    assert_eq!(meshes.end_mesh(), None);

    // calls without an active mesh are ignored
    meshes.add_vertex(Vertex::new(1.0, 2.0, 3.0));
    meshes.set_color(Color::BLACK);
    assert!(meshes.is_empty());
}

#[test]
fn built_mesh_reads_back_what_was_given() {
    let mut meshes = MeshRegistry::new();
    let vertices = vec![
        Vertex::from(([0.0f32, 0.0], [1.0f32, 0.0, 0.0])),
        Vertex::from(([1.0f32, 0.0, 0.5], [0.0f32, 1.0, 0.0, 0.5], [1.0, 0.0])),
        Vertex::from([1.0f32, 1.0]),
    ];
    let color = Color::new(0.2, 0.4, 0.6, 0.8);

    meshes.begin_mesh(false);
    meshes.set_draw_mode(DrawMode::Triangles);
    meshes.set_color(color);
    for v in &vertices {
        meshes.add_vertex(*v);
    }
    let handle = meshes.end_mesh().unwrap();

    let mesh = meshes.get(handle).unwrap();
    assert_eq!(mesh.draw_mode(), DrawMode::Triangles);
    assert_eq!(mesh.color(), color);
    assert_eq!(mesh.vertices(), vertices.as_slice());
    assert_eq!(mesh.kind(), MeshKind::Plain);
    assert!(!meshes.is_building());
}

#[test]
fn new_mesh_defaults_to_white_fan() {
    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(false);
    let handle = meshes.end_mesh().unwrap();
    let mesh = meshes.get(handle).unwrap();
    assert_eq!(mesh.draw_mode(), DrawMode::TriangleFan);
    assert_eq!(mesh.color(), Color::WHITE);
}

#[test]
fn set_texture_on_plain_mesh_is_ignored() {
    let (mut textures, _) = registry();
    let texture = textures.load_by_path("crate.png").unwrap();

    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(false);
    meshes.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    meshes.add_vertex(Vertex::new(1.0, 0.0, 0.0));
    assert!(!meshes.set_texture(texture));

    let handle = meshes.end_mesh().unwrap();
    let mesh = meshes.get(handle).unwrap();
    assert_eq!(mesh.texture(), None);
    assert_eq!(mesh.vertices().len(), 2);
}

#[test]
fn textured_mesh_takes_a_texture() {
    let (mut textures, _) = registry();
    let texture = textures.load_by_path("crate.png").unwrap();

    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(true);
    assert!(meshes.set_texture(texture));
    let handle = meshes.end_mesh().unwrap();
    assert_eq!(
        meshes.get(handle).unwrap().kind(),
        MeshKind::Textured {
            texture: Some(texture)
        }
    );

    // the mesh outlives its texture and just stops resolving it
    textures.evict(texture);
    let stale = meshes.get(handle).unwrap().texture().unwrap();
    assert!(textures.get(stale).is_none());
}

#[test]
fn begin_discards_the_unfinished_mesh() {
    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(false);
    meshes.add_vertex(Vertex::new(0.0, 0.0, 0.0));
    meshes.begin_mesh(true);
    assert!(meshes.active().unwrap().vertices().is_empty());
    assert!(meshes.active().unwrap().is_textured());

    let handle = meshes.end_mesh().unwrap();
    assert_eq!(meshes.len(), 1);
    assert!(meshes.get(handle).unwrap().vertices().is_empty());
}

#[test]
fn removed_meshes_do_not_resolve() {
    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(false);
    let handle = meshes.end_mesh().unwrap();
    assert!(meshes.remove(handle).is_some());
    assert!(meshes.get(handle).is_none());
    assert!(meshes.remove(handle).is_none());
}

#[test]
fn load_from_file_loads_the_named_texture_when_textured() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(
        dir.path(),
        "quad.mesh",
        "mode triangle_strip\ntexture crate.png\nv 0 0\nv 1 0\nv 0 1\nv 1 1\n",
    );
    let (mut textures, decodes) = registry();
    let mut meshes = MeshRegistry::new();

    let plain = meshes
        .load_from_file(Some(dir.path()), "quad.mesh", false, &mut textures)
        .unwrap();
    assert_eq!(meshes.get(plain).unwrap().kind(), MeshKind::Plain);
    assert_eq!(decodes.get(), 0);

    let textured = meshes
        .load_from_file(Some(dir.path()), "quad.mesh", true, &mut textures)
        .unwrap();
    let mesh = meshes.get(textured).unwrap();
    assert_eq!(mesh.draw_mode(), DrawMode::TriangleStrip);
    assert_eq!(mesh.vertices().len(), 4);
    let texture = mesh.texture().unwrap();
    assert_eq!(textures.get(texture).unwrap().name(), "crate.png");
    assert_eq!(decodes.get(), 1);
    assert!(!meshes.is_building());
}

#[test]
fn load_from_file_reads_binary_streams() {
    let dir = tempfile::tempdir().unwrap();
    let mut meshes = MeshRegistry::new();
    meshes.begin_mesh(false);
    meshes.set_draw_mode(DrawMode::LineLoop);
    meshes.set_color(Color::new(1.0, 0.5, 0.25, 1.0));
    meshes.add_vertex(Vertex::new(1.0, 2.0, 3.0).with_uv(0.5, 0.5));
    let original = meshes.end_mesh().unwrap();
    write_asset(
        dir.path(),
        "line.meshb",
        encode_binary(meshes.get(original).unwrap()),
    );

    let (mut textures, _) = registry();
    let loaded = meshes
        .load_from_file(Some(dir.path()), "line.meshb", false, &mut textures)
        .unwrap();
    assert_eq!(meshes.get(loaded), meshes.get(original));
}

#[test]
fn missing_or_broken_files_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "broken.mesh", "v 0 0\nquad 1 2 3\n");
    let (mut textures, _) = registry();
    let mut meshes = MeshRegistry::new();

    let err = meshes
        .load_from_file(Some(dir.path()), "broken.mesh", false, &mut textures)
        .unwrap_err();
    assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    assert!(meshes
        .load_from_file(Some(dir.path()), "nope.mesh", false, &mut textures)
        .is_err());
    assert!(meshes.is_empty());
}
