//! Engine data structures: vertices, meshes and GPU textures.
//!
//! - `vertex` holds the vertex layout, colours, draw and fill modes
//! - `mesh` contains the mesh entity and its plain/textured variants
//! - `texture` wraps wgpu textures together with their view, sampler and bind group

pub mod mesh;
pub mod texture;
pub mod vertex;
