#[cfg(feature = "integration-tests")]
use orb_ngin::{
    config::RendererConfig, DrawMode, ErrorState, FillMode, Renderer, Vector2, Vector3,
};

#[cfg(feature = "integration-tests")]
fn renderer(asset_root: &std::path::Path) -> Renderer {
    let mut config = RendererConfig::default();
    config.assets.root = Some(asset_root.to_path_buf());
    config.window.title = "orb-ngin smoke test".to_string();
    config.window.width = 320;
    config.window.height = 240;
    Renderer::new(config).expect("no GPU or window system available")
}

#[cfg(feature = "integration-tests")]
fn write_broken_passes(dir: &std::path::Path) {
    let files = [
        (
            "broken.rpass.meta",
            "shader = \"broken.wgsl\"\n\n[[buffers]]\nname = \"data\"\nbinding = 0\nkind = \"storage\"\n",
        ),
        ("broken.wgsl", "@compute @workgroup_size(1)\nfn main( {\n"),
        (
            "no_entry.rpass.meta",
            "shader = \"valid.wgsl\"\nentry_point = \"missing\"\n",
        ),
        ("valid.wgsl", "@compute @workgroup_size(1)\nfn main() {}\n"),
    ];
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_draw_frames_and_shut_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    write_broken_passes(dir.path());
    let mut renderer = renderer(dir.path());
    assert!(renderer.is_running());
    assert_eq!(renderer.window(0), Some(renderer.default_window()));

    let checker = renderer
        .create_texture_from_memory("checker", 2, 2, 3, &[255; 12])
        .unwrap();
    assert_eq!(renderer.texture_dimensions(checker), Some((2, 2)));

    renderer.begin_mesh();
    renderer.mesh_set_draw_mode(DrawMode::Triangles);
    renderer.mesh_add_vertex(([0.0f32, 0.0], [1.0f32, 0.0, 0.0]));
    renderer.mesh_add_vertex(([50.0f32, 0.0], [0.0f32, 1.0, 0.0]));
    renderer.mesh_add_vertex(([0.0f32, 50.0], [0.0f32, 0.0, 1.0]));
    let triangle = renderer.end_mesh().unwrap();

    for _ in 0..3 {
        renderer.set_draw_color(255, 128, 0, 255);
        renderer.set_active_texture(Some(checker));
        renderer.set_uv_rect(0.0, 0.0, 0.5, 0.5);
        renderer.draw_rect_advanced(Vector2::new(0.0, 0.0), Vector2::new(32.0, 32.0), 45.0, 1);
        renderer.set_fill_mode(FillMode::Line);
        assert!(renderer.draw_mesh(
            triangle,
            Vector3::new(-20.0, -20.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, 0.0),
            0,
        ));
        renderer.set_fill_mode(FillMode::Fill);
        renderer.draw_line([0.0f32, 0.0], [100.0f32, 100.0], 2);
        renderer.update();
    }
    // drawn every frame, so still alive
    assert!(renderer.textures().get(checker).unwrap().uses() >= 0);

    assert!(renderer.destroy_mesh(triangle));
    assert!(!renderer.draw_mesh_with_matrix(triangle, orb_ngin::Matrix4::from_scale(1.0), 0));

    // shader errors fail the load and leave the renderer running
    assert!(renderer.load_compute_pass("broken.rpass.meta").is_none());
    assert!(renderer.load_compute_pass("no_entry.rpass.meta").is_none());
    assert!(renderer.is_running());

    renderer.shutdown();
    assert!(!renderer.is_running());
    assert!(renderer.loaded_textures().is_empty());
    assert_eq!(renderer.error_state(), ErrorState::NoError);
    assert_eq!(renderer.error_state().code(), 0);
}
