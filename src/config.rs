//! Renderer configuration.
//!
//! A single TOML file configures the default window, the texture eviction
//! policy, the asset root and logging. Every key is optional:
//!
//! ```toml
//! [window]
//! title = "demo"
//! width = 1280
//! height = 720
//! clear_color = [0.1, 0.1, 0.1, 1.0]
//! vsync = true
//!
//! [textures]
//! decay_step = 1
//! eviction_threshold = -50
//!
//! [assets]
//! root = "assets"
//!
//! [logging]
//! filter = "orb_ngin=debug"
//! ```

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::vertex::Color, logging::LoggingConfig, registry::texture::EvictionPolicy,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    pub window: WindowConfig,
    pub textures: TextureConfig,
    pub assets: AssetConfig,
    pub logging: LoggingConfig,
}

/// The default window opened by [`Renderer::new`](crate::renderer::Renderer::new).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 4],
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "orb-ngin".to_string(),
            width: 800,
            height: 600,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
        }
    }
}

impl WindowConfig {
    pub fn clear_color(&self) -> Color {
        self.clear_color.into()
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TextureConfig {
    pub decay_step: i32,
    pub eviction_threshold: i32,
}

impl Default for TextureConfig {
    fn default() -> Self {
        let policy = EvictionPolicy::default();
        Self {
            decay_step: policy.decay_step,
            eviction_threshold: policy.threshold,
        }
    }
}

impl From<TextureConfig> for EvictionPolicy {
    fn from(config: TextureConfig) -> Self {
        EvictionPolicy {
            decay_step: config.decay_step,
            threshold: config.eviction_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory relative asset names are resolved against. `None` uses the
    /// working directory.
    pub root: Option<PathBuf>,
}

impl RendererConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        // a relative asset root is relative to the config file
        if let (Some(root), Some(dir)) = (&config.assets.root, path.parent()) {
            if root.is_relative() {
                config.assets.root = Some(dir.join(root));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RendererConfig = toml::from_str(content)?;
        anyhow::ensure!(
            config.textures.decay_step > 0,
            "textures.decay_step must be positive, got {}",
            config.textures.decay_step
        );
        anyhow::ensure!(
            config.textures.eviction_threshold < 0,
            "textures.eviction_threshold must be negative, got {}",
            config.textures.eviction_threshold
        );
        Ok(config)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.textures.into()
    }
}
