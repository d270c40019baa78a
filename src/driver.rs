//! The seam between the texture registry and the graphics driver.
//!
//! [`TextureDriver`] is all the registry needs from a GPU: turn pixels into a
//! resource and release it again. [`WgpuTextures`] is the production driver and
//! additionally keeps the [`Texture`] objects the renderer binds while drawing.

use std::collections::HashMap;

use crate::{
    context::GpuErrors,
    data_structures::texture::{self, Texture},
    error::{RenderError, Result},
};

/// Opaque identifier of an uploaded image resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuHandle(pub u64);

/// Pixel layout of uploaded data, chosen by channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Borrowed, tightly packed pixel rows.
#[derive(Clone, Copy, Debug)]
pub struct ImageData<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

impl ImageData<'_> {
    /// Byte length of the packed image, `None` if it does not fit in memory.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.channels() as usize)
    }

    /// Fails unless `pixels` covers the whole image.
    pub fn check_len(&self, label: &str) -> Result<()> {
        match self.expected_len() {
            Some(len) if self.pixels.len() >= len => Ok(()),
            Some(len) => Err(RenderError::InvalidArgument(format!(
                "{label}: expected {len} bytes of pixel data, got {}",
                self.pixels.len()
            ))),
            None => Err(RenderError::InvalidArgument(format!(
                "{label}: {}x{} image is too large to address",
                self.width, self.height
            ))),
        }
    }
}

pub trait TextureDriver {
    /// Create a GPU resource from `image`. `label` is used for debugging only.
    fn upload(&mut self, label: &str, image: &ImageData<'_>) -> Result<GpuHandle>;

    /// Release a resource. Unknown handles are ignored.
    fn release(&mut self, handle: GpuHandle);
}

/// wgpu backed [`TextureDriver`].
///
/// Device and queue are cheap clones of the renderer's: wgpu keeps them behind
/// internal `Arc`s.
#[derive(Debug)]
pub struct WgpuTextures {
    device: wgpu::Device,
    queue: wgpu::Queue,
    errors: GpuErrors,
    layout: wgpu::BindGroupLayout,
    textures: HashMap<GpuHandle, Texture>,
    white: Texture,
    next_id: u64,
}

impl WgpuTextures {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, errors: GpuErrors) -> Self {
        let layout = texture::bind_group_layout(&device);
        let white = Texture::white(&device, &queue, &layout);
        Self {
            device,
            queue,
            errors,
            layout,
            textures: HashMap::new(),
            white,
            next_id: 1,
        }
    }

    pub fn get(&self, handle: GpuHandle) -> Option<&Texture> {
        self.textures.get(&handle)
    }

    /// The bind group for `handle`, falling back to plain white.
    pub fn bind_group(&self, handle: Option<GpuHandle>) -> &wgpu::BindGroup {
        handle
            .and_then(|h| self.textures.get(&h))
            .map_or(&self.white.bind_group, |t| &t.bind_group)
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureDriver for WgpuTextures {
    fn upload(&mut self, label: &str, image: &ImageData<'_>) -> Result<GpuHandle> {
        image.check_len(label)?;
        let max = self.device.limits().max_texture_dimension_2d;
        if image.width > max || image.height > max {
            return Err(RenderError::ResourceExhausted(format!(
                "{label} is {}x{} but the device allows at most {max}x{max}",
                image.width, image.height
            )));
        }

        let texture = self.errors.capture(label, || {
            Texture::from_pixels(&self.device, &self.queue, &self.layout, label, image)
        })?;
        let handle = GpuHandle(self.next_id);
        self.next_id += 1;
        self.textures.insert(handle, texture);
        log::debug!("uploaded {label} as {handle:?}");
        Ok(handle)
    }

    fn release(&mut self, handle: GpuHandle) {
        if let Some(texture) = self.textures.remove(&handle) {
            texture.texture.destroy();
        }
    }
}
