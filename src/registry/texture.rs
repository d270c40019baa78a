//! Texture lifetime management.
//!
//! The [`TextureRegistry`] is the single authority over which images are GPU
//! resident. Loading deduplicates by name: a second load of the same name bumps
//! the entity's usage counter instead of decoding and uploading again. Call
//! sites never release what they load. Instead [`TextureRegistry::decay`] runs
//! once per tick and lowers every counter, and textures that stay untouched for
//! longer than the eviction threshold are released.
//!
//! Pinned textures are exempt from decay and only leave through
//! [`TextureRegistry::evict`] or [`TextureRegistry::evict_all`].

use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::{
    driver::{GpuHandle, ImageData, PixelFormat, TextureDriver},
    error::{RenderError, Result},
    resources::texture::ImageDecoder,
};

new_key_type! {
    /// Generational handle of a registered texture.
    ///
    /// A handle stops resolving once its texture is evicted, even if the slot
    /// is reused later.
    pub struct TextureHandle;
}

/// Lazy eviction policy applied by [`TextureRegistry::decay`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Subtracted from every unpinned usage counter per decay.
    pub decay_step: i32,
    /// Textures whose counter drops below this value are evicted.
    pub threshold: i32,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            decay_step: 1,
            threshold: -50,
        }
    }
}

/// A GPU resident image and its bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureEntity {
    gpu: GpuHandle,
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    uses: i32,
    pinned: bool,
}

impl TextureEntity {
    pub fn gpu(&self) -> GpuHandle {
        self.gpu
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn uses(&self) -> i32 {
        self.uses
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

pub struct TextureRegistry<D: TextureDriver> {
    driver: D,
    decoder: Box<dyn ImageDecoder>,
    policy: EvictionPolicy,
    entities: SlotMap<TextureHandle, TextureEntity>,
    order: Vec<TextureHandle>,
    by_name: HashMap<String, TextureHandle>,
}

impl<D: TextureDriver> TextureRegistry<D> {
    pub fn new(driver: D, decoder: Box<dyn ImageDecoder>) -> Self {
        Self::with_policy(driver, decoder, EvictionPolicy::default())
    }

    pub fn with_policy(driver: D, decoder: Box<dyn ImageDecoder>, policy: EvictionPolicy) -> Self {
        Self {
            driver,
            decoder,
            policy,
            entities: SlotMap::with_key(),
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Load an image file, or return the already registered texture of that name.
    ///
    /// A repeated load counts as a use and performs no decode or upload.
    pub fn load_by_path(&mut self, path: &str) -> Result<TextureHandle> {
        if let Some(handle) = self.reuse(path) {
            return Ok(handle);
        }

        let decoded = self.decoder.decode(path)?;
        let image = decoded.image_data(path)?;
        self.register(path, &image)
    }

    /// Like [`load_by_path`](Self::load_by_path), additionally exempting the
    /// texture from decay.
    pub fn load_pinned(&mut self, path: &str) -> Result<TextureHandle> {
        let handle = self.load_by_path(path)?;
        self.set_pinned(handle, true);
        Ok(handle)
    }

    /// Upload caller supplied pixels under `name`.
    ///
    /// Arguments are validated before the name lookup, so an invalid call never
    /// counts as a use of an existing texture.
    pub fn create_from_memory(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_depth: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle> {
        if width == 0 || height == 0 || channel_depth == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "{name}: texture of {width}x{height} with {channel_depth} channel(s)"
            )));
        }
        if pixels.is_empty() {
            return Err(RenderError::InvalidArgument(format!(
                "{name}: no pixel data"
            )));
        }
        let format = PixelFormat::from_channels(channel_depth).ok_or_else(|| {
            RenderError::UnsupportedFormat {
                name: name.to_string(),
                channels: channel_depth,
            }
        })?;
        let image = ImageData {
            width,
            height,
            format,
            pixels,
        };
        image.check_len(name)?;

        if let Some(handle) = self.reuse(name) {
            return Ok(handle);
        }
        self.register(name, &image)
    }

    fn reuse(&mut self, name: &str) -> Option<TextureHandle> {
        let handle = *self.by_name.get(name)?;
        let entity = self.entities.get_mut(handle)?;
        entity.uses = entity.uses.saturating_add(1);
        Some(handle)
    }

    fn register(&mut self, name: &str, image: &ImageData<'_>) -> Result<TextureHandle> {
        let gpu = self.driver.upload(name, image)?;
        let handle = self.entities.insert(TextureEntity {
            gpu,
            name: name.to_string(),
            width: image.width,
            height: image.height,
            format: image.format,
            uses: 0,
            pinned: false,
        });
        self.order.push(handle);
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Age every unpinned texture by one tick and evict the ones that fell
    /// below the threshold. Returns the number of evicted textures.
    pub fn decay(&mut self) -> usize {
        let policy = self.policy;
        let expired: Vec<TextureHandle> = self
            .order
            .iter()
            .copied()
            .filter(|handle| {
                let Some(entity) = self.entities.get_mut(*handle) else {
                    return false;
                };
                if entity.pinned {
                    return false;
                }
                entity.uses = entity.uses.saturating_sub(policy.decay_step);
                entity.uses < policy.threshold
            })
            .collect();

        for handle in &expired {
            if let Some(entity) = self.entities.get(*handle) {
                log::info!("Dropped unused texture: {}", entity.name);
            }
            self.evict(*handle);
        }
        expired.len()
    }

    /// Release a texture immediately, whatever its usage counter.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn evict(&mut self, handle: TextureHandle) -> bool {
        let Some(entity) = self.entities.remove(handle) else {
            return false;
        };
        self.driver.release(entity.gpu);
        self.order.retain(|h| *h != handle);
        self.by_name.remove(&entity.name);
        true
    }

    /// Release every texture, pinned or not.
    pub fn evict_all(&mut self) {
        for handle in std::mem::take(&mut self.order) {
            if let Some(entity) = self.entities.remove(handle) {
                self.driver.release(entity.gpu);
            }
        }
        self.entities.clear();
        self.by_name.clear();
    }

    /// Snapshot of all live textures in load order.
    pub fn list(&self) -> Vec<TextureHandle> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &TextureEntity)> {
        self.order
            .iter()
            .filter_map(|h| self.entities.get(*h).map(|e| (*h, e)))
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureEntity> {
        self.entities.get(handle)
    }

    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.entities.contains_key(handle)
    }

    pub fn find(&self, name: &str) -> Option<TextureHandle> {
        self.by_name.get(name).copied()
    }

    pub fn dimensions(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.entities.get(handle).map(|e| (e.width, e.height))
    }

    /// Record a use, e.g. when the texture is bound for drawing.
    ///
    /// Returns the GPU handle of a live texture.
    pub fn touch(&mut self, handle: TextureHandle) -> Option<GpuHandle> {
        let entity = self.entities.get_mut(handle)?;
        entity.uses = entity.uses.saturating_add(1);
        Some(entity.gpu)
    }

    pub fn set_pinned(&mut self, handle: TextureHandle, pinned: bool) -> bool {
        match self.entities.get_mut(handle) {
            Some(entity) => {
                entity.pinned = pinned;
                true
            }
            None => false,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: TextureDriver> Drop for TextureRegistry<D> {
    fn drop(&mut self) {
        self.evict_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::texture::DecodedImage;

    #[derive(Default)]
    struct NullDriver(u64);

    impl TextureDriver for NullDriver {
        fn upload(&mut self, _: &str, _: &ImageData<'_>) -> Result<GpuHandle> {
            self.0 += 1;
            Ok(GpuHandle(self.0))
        }

        fn release(&mut self, _: GpuHandle) {}
    }

    struct NoFiles;

    impl ImageDecoder for NoFiles {
        fn decode(&mut self, name: &str) -> Result<DecodedImage> {
            Err(RenderError::Decode {
                name: name.to_string(),
                reason: "no files".to_string(),
            })
        }
    }

    fn registry(policy: EvictionPolicy) -> TextureRegistry<NullDriver> {
        TextureRegistry::with_policy(NullDriver::default(), Box::new(NoFiles), policy)
    }

    #[test]
    fn heavily_used_texture_stays_resident() {
        let mut textures = registry(EvictionPolicy::default());
        let atlas = textures.create_from_memory("atlas", 1, 1, 4, &[255; 4]).unwrap();
        textures.entities[atlas].uses = i32::MAX - 1;

        for _ in 0..3 {
            assert!(textures.touch(atlas).is_some());
        }
        assert_eq!(textures.get(atlas).unwrap().uses(), i32::MAX);
        assert!(textures.create_from_memory("atlas", 1, 1, 4, &[255; 4]).is_ok());
        assert_eq!(textures.get(atlas).unwrap().uses(), i32::MAX);

        assert_eq!(textures.decay(), 0);
        assert_eq!(textures.get(atlas).unwrap().uses(), i32::MAX - 1);
    }

    #[test]
    fn decay_bottoms_out_at_the_lowest_counter() {
        let mut textures = registry(EvictionPolicy {
            decay_step: i32::MAX,
            threshold: i32::MIN,
        });
        let idle = textures.create_from_memory("idle", 1, 1, 3, &[0; 3]).unwrap();

        for _ in 0..3 {
            assert_eq!(textures.decay(), 0);
        }
        assert_eq!(textures.get(idle).unwrap().uses(), i32::MIN);
    }
}
