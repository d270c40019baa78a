//! orb-ngin
//!
//! An immediate-mode render backend on top of `wgpu` and `winit`. Callers draw
//! rects, lines and meshes every frame; the renderer records the calls and
//! submits them once per frame and window, sorted by layer. Textures are
//! deduplicated by name and evicted lazily once they stop being used.
//!
//! High-level modules
//! - `renderer`: the [`Renderer`] facade owning windows, GPU state and registries
//! - `registry`: texture and mesh lifetime, including usage based eviction
//! - `driver`: the seam between the texture registry and the GPU
//! - `input` / `window`: event translation, the event queue and window geometry
//! - `camera`: orthographic and perspective projection, screen/world mapping
//! - `render` / `pipelines`: deferred draw recording and the mesh pipelines
//! - `resources`: image decoding and mesh file formats
//! - `compute`: user supplied compute passes
//! - `config` / `logging`: renderer configuration and logger setup
//!

pub mod camera;
pub mod compute;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod driver;
pub mod error;
pub mod input;
pub mod logging;
pub mod pipelines;
pub mod registry;
pub mod render;
pub mod renderer;
pub mod resources;
pub mod window;

// Re-exports commonly used types for convenience in downstream code.
pub use camera::ProjectionMode;
pub use compute::ComputeHandle;
pub use config::RendererConfig;
pub use data_structures::vertex::{Color, DrawMode, FillMode, Vertex};
pub use error::{ErrorState, RenderError};
pub use input::{ButtonState, Event};
pub use registry::{mesh::MeshHandle, texture::TextureHandle};
pub use renderer::Renderer;
pub use window::{Viewport, WindowHandle};

pub use cgmath::{Matrix4, Vector2, Vector3};
pub use winit::{event::MouseButton, keyboard::KeyCode};
