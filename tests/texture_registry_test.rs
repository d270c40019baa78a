use orb_ngin::{
    driver::PixelFormat,
    error::RenderError,
    registry::texture::{EvictionPolicy, TextureRegistry},
};

use crate::common::test_utils::{CountingDecoder, RecordingDriver, registry, registry_with};

mod common;

#[test]
fn loading_twice_reuses_the_texture() {
    let (mut textures, decodes) = registry();

    let first = textures.load_by_path("crate.png").unwrap();
    let second = textures.load_by_path("crate.png").unwrap();

    assert_eq!(first, second);
    assert_eq!(decodes.get(), 1);
    assert_eq!(textures.driver().uploads(), 1);
    assert_eq!(textures.get(first).unwrap().uses(), 1);
    assert_eq!(textures.list(), vec![first]);
}

#[test]
fn untouched_texture_is_evicted_after_51_decays() {
    let (mut textures, _) = registry();
    let handle = textures.load_by_path("crate.png").unwrap();

    for _ in 0..50 {
        assert_eq!(textures.decay(), 0);
    }
    assert!(textures.contains(handle));
    assert_eq!(textures.get(handle).unwrap().uses(), -50);

    assert_eq!(textures.decay(), 1);
    assert!(!textures.contains(handle));
    assert_eq!(textures.driver().releases(), 1);
    assert!(textures.list().is_empty());
}

#[test]
fn texture_survives_49_decays() {
    let (mut textures, _) = registry();
    let handle = textures.load_by_path("crate.png").unwrap();
    for _ in 0..49 {
        textures.decay();
    }
    assert!(textures.contains(handle));
}

#[test]
fn touching_postpones_eviction() {
    let (mut textures, _) = registry();
    let handle = textures.load_by_path("crate.png").unwrap();
    for _ in 0..200 {
        assert!(textures.touch(handle).is_some());
        textures.decay();
    }
    assert!(textures.contains(handle));
    assert_eq!(textures.get(handle).unwrap().uses(), 0);
}

#[test]
fn pinned_textures_never_decay() {
    let (mut textures, _) = registry();
    let pinned = textures.load_pinned("ui.png").unwrap();
    let loose = textures.load_by_path("crate.png").unwrap();

    for _ in 0..1000 {
        textures.decay();
    }
    assert!(textures.contains(pinned));
    assert!(!textures.contains(loose));
    assert_eq!(textures.list(), vec![pinned]);

    // unpinning starts the clock again
    textures.set_pinned(pinned, false);
    for _ in 0..51 {
        textures.decay();
    }
    assert!(!textures.contains(pinned));
}

#[test]
fn custom_policy_changes_lifetime() {
    let policy = EvictionPolicy {
        decay_step: 5,
        threshold: -10,
    };
    let mut textures = TextureRegistry::with_policy(
        RecordingDriver::new(),
        Box::new(CountingDecoder::new(4)),
        policy,
    );
    let handle = textures.load_by_path("crate.png").unwrap();
    textures.decay();
    textures.decay();
    assert!(textures.contains(handle));
    textures.decay();
    assert!(!textures.contains(handle));
}

#[test]
fn invalid_memory_textures_register_nothing() {
    let (mut textures, _) = registry();
    let pixels = [0u8; 16];

    for (w, h, depth) in [(0, 2, 4), (2, 0, 4), (2, 2, 0)] {
        let err = textures
            .create_from_memory("bad", w, h, depth, &pixels)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidArgument(_)), "{err}");
    }
    let err = textures.create_from_memory("bad", 2, 2, 4, &[]).unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument(_)));
    let err = textures
        .create_from_memory("short", 4, 4, 4, &pixels)
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument(_)));
    let err = textures
        .create_from_memory("huge", u32::MAX, u32::MAX, 4, &pixels)
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidArgument(_)), "{err}");

    assert!(textures.is_empty());
    assert_eq!(textures.driver().uploads(), 0);
}

#[test]
fn invalid_arguments_do_not_count_as_use() {
    let (mut textures, _) = registry();
    let handle = textures
        .create_from_memory("glyphs", 2, 2, 4, &[255; 16])
        .unwrap();
    assert!(textures.create_from_memory("glyphs", 0, 2, 4, &[255; 16]).is_err());
    assert_eq!(textures.get(handle).unwrap().uses(), 0);

    assert_eq!(
        textures.create_from_memory("glyphs", 2, 2, 4, &[255; 16]).unwrap(),
        handle
    );
    assert_eq!(textures.get(handle).unwrap().uses(), 1);
}

#[test]
fn channel_count_selects_the_pixel_format() {
    let (mut textures, _) = registry();
    let rgb = textures.create_from_memory("rgb", 1, 1, 3, &[1, 2, 3]).unwrap();
    let rgba = textures
        .create_from_memory("rgba", 1, 1, 4, &[1, 2, 3, 4])
        .unwrap();
    assert_eq!(textures.get(rgb).unwrap().format(), PixelFormat::Rgb8);
    assert_eq!(textures.get(rgba).unwrap().format(), PixelFormat::Rgba8);

    let err = textures.create_from_memory("grey", 1, 1, 1, &[1]).unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedFormat { channels: 1, .. }));
}

#[test]
fn decoder_failures_surface_as_errors() {
    let (mut textures, decodes) = registry_with(CountingDecoder::failing());
    let err = textures.load_by_path("missing.png").unwrap_err();
    assert!(matches!(err, RenderError::Decode { .. }));
    assert_eq!(decodes.get(), 1);
    assert!(textures.is_empty());

    let (mut textures, _) = registry_with(CountingDecoder::new(2));
    let err = textures.load_by_path("grey.png").unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedFormat { channels: 2, .. }));
    assert_eq!(textures.driver().uploads(), 0);
}

#[test]
fn evict_releases_once() {
    let (mut textures, _) = registry();
    let handle = textures.load_by_path("crate.png").unwrap();
    let gpu = textures.get(handle).unwrap().gpu();

    assert!(textures.evict(handle));
    assert!(!textures.evict(handle));
    assert!(!textures.driver().is_live(gpu));
    assert_eq!(textures.driver().releases(), 1);
    assert_eq!(textures.find("crate.png"), None);

    // the name can be loaded again and yields a fresh handle
    let again = textures.load_by_path("crate.png").unwrap();
    assert_ne!(again, handle);
    assert!(textures.get(handle).is_none());
}

#[test]
fn evict_all_invalidates_every_handle() {
    let (mut textures, _) = registry();
    let handles: Vec<_> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|name| textures.load_by_path(name).unwrap())
        .collect();
    textures.set_pinned(handles[1], true);
    assert_eq!(textures.list(), handles);

    textures.evict_all();

    assert!(textures.list().is_empty());
    assert_eq!(textures.driver().live(), 0);
    for handle in handles {
        assert!(textures.get(handle).is_none());
        assert!(textures.touch(handle).is_none());
        assert_eq!(textures.dimensions(handle), None);
    }
}

#[test]
fn list_keeps_load_order_across_evictions() {
    let (mut textures, _) = registry();
    let a = textures.load_by_path("a.png").unwrap();
    let b = textures.load_by_path("b.png").unwrap();
    let c = textures.load_by_path("c.png").unwrap();
    textures.evict(b);
    let d = textures.load_by_path("d.png").unwrap();
    assert_eq!(textures.list(), vec![a, c, d]);
    let names: Vec<_> = textures.iter().map(|(_, t)| t.name().to_string()).collect();
    assert_eq!(names, ["a.png", "c.png", "d.png"]);
}
