//! Resource registries owned by the renderer.
//!
//! - `texture` deduplicates, tracks and lazily evicts GPU textures
//! - `mesh` owns finished meshes and the single in-progress mesh build

pub mod mesh;
pub mod texture;
