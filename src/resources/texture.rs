//! Image decoding for the texture registry.

use std::path::PathBuf;

use image::{ColorType, DynamicImage};

use crate::{
    driver::{ImageData, PixelFormat},
    error::{RenderError, Result},
    resources,
};

/// Raw, tightly packed pixels of a decoded image.
///
/// `channels` is whatever the file carries. Only 3 and 4 channels can be
/// uploaded; [`DecodedImage::image_data`] reports everything else as
/// `UnsupportedFormat`.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn image_data(&self, name: &str) -> Result<ImageData<'_>> {
        let format = PixelFormat::from_channels(self.channels).ok_or_else(|| {
            RenderError::UnsupportedFormat {
                name: name.to_string(),
                channels: self.channels,
            }
        })?;
        Ok(ImageData {
            width: self.width,
            height: self.height,
            format,
            pixels: &self.pixels,
        })
    }
}

/// Turns an image file name into pixels.
pub trait ImageDecoder {
    fn decode(&mut self, name: &str) -> Result<DecodedImage>;
}

/// [`ImageDecoder`] reading files from disk and decoding them with the `image` crate.
#[derive(Clone, Debug, Default)]
pub struct FileDecoder {
    root: Option<PathBuf>,
}

impl FileDecoder {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl ImageDecoder for FileDecoder {
    fn decode(&mut self, name: &str) -> Result<DecodedImage> {
        let bytes = resources::load_binary(self.root.as_deref(), name).map_err(|e| {
            RenderError::Decode {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        decode_bytes(name, &bytes)
    }
}

/// Decode an in-memory image file, keeping its native channel count.
///
/// Wide colour types are narrowed to 8 bits per channel. Grey images keep 1 or 2
/// channels and are rejected later by the upload path.
pub fn decode_bytes(name: &str, bytes: &[u8]) -> Result<DecodedImage> {
    let img = image::load_from_memory(bytes).map_err(|e| RenderError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(from_dynamic(img))
}

fn from_dynamic(img: DynamicImage) -> DecodedImage {
    let (width, height) = (img.width(), img.height());
    let (channels, pixels) = match img.color() {
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => (3, img.into_rgb8().into_raw()),
        ColorType::L8 | ColorType::L16 => (1, img.into_luma8().into_raw()),
        ColorType::La8 | ColorType::La16 => (2, img.into_luma_alpha8().into_raw()),
        _ => (4, img.into_rgba8().into_raw()),
    };
    DecodedImage {
        width,
        height,
        channels,
        pixels,
    }
}
