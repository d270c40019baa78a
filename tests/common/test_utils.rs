use std::{
    cell::Cell,
    collections::HashSet,
    path::{Path, PathBuf},
    rc::Rc,
};

use orb_ngin::{
    driver::{GpuHandle, ImageData, TextureDriver},
    error::{RenderError, Result},
    registry::texture::TextureRegistry,
    resources::texture::{DecodedImage, ImageDecoder},
};

/// Texture driver that only keeps books: what was uploaded, what was released.
#[derive(Debug, Default)]
pub(crate) struct RecordingDriver {
    next_id: u64,
    live: HashSet<GpuHandle>,
    uploads: u32,
    releases: u32,
    pub(crate) labels: Vec<String>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> u32 {
        self.uploads
    }

    pub fn releases(&self) -> u32 {
        self.releases
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: GpuHandle) -> bool {
        self.live.contains(&handle)
    }
}

impl TextureDriver for RecordingDriver {
    fn upload(&mut self, label: &str, image: &ImageData<'_>) -> Result<GpuHandle> {
        assert!(image.check_len(label).is_ok());
        self.next_id += 1;
        let handle = GpuHandle(self.next_id);
        self.live.insert(handle);
        self.uploads += 1;
        self.labels.push(label.to_string());
        Ok(handle)
    }

    fn release(&mut self, handle: GpuHandle) {
        assert!(self.live.remove(&handle), "{handle:?} released twice");
        self.releases += 1;
    }
}

/// Decoder producing a solid image of any name and counting its invocations.
///
/// The counter is shared so that it stays readable after the decoder moved
/// into a registry.
#[derive(Debug, Clone)]
pub(crate) struct CountingDecoder {
    decodes: Rc<Cell<u32>>,
    channels: u32,
    fail: bool,
}

impl CountingDecoder {
    pub fn new(channels: u32) -> Self {
        Self {
            decodes: Rc::new(Cell::new(0)),
            channels,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(4)
        }
    }

    pub fn counter(&self) -> Rc<Cell<u32>> {
        self.decodes.clone()
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode(&mut self, name: &str) -> Result<DecodedImage> {
        self.decodes.set(self.decodes.get() + 1);
        if self.fail {
            return Err(RenderError::Decode {
                name: name.to_string(),
                reason: "broken file".to_string(),
            });
        }
        Ok(DecodedImage {
            width: 2,
            height: 2,
            channels: self.channels,
            pixels: vec![0x7f; 4 * self.channels as usize],
        })
    }
}

/// A registry on a recording driver and an RGBA counting decoder.
pub(crate) fn registry() -> (TextureRegistry<RecordingDriver>, Rc<Cell<u32>>) {
    registry_with(CountingDecoder::new(4))
}

pub(crate) fn registry_with(
    decoder: CountingDecoder,
) -> (TextureRegistry<RecordingDriver>, Rc<Cell<u32>>) {
    let decodes = decoder.counter();
    (
        TextureRegistry::new(RecordingDriver::new(), Box::new(decoder)),
        decodes,
    )
}

/// Writes `content` to `name` inside `dir` and returns the full path.
pub(crate) fn write_asset(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}
