//! Render pipelines.
//!
//! Every draw of the renderer (rects, lines and meshes) goes through the single
//! mesh shader; `mesh` builds its pipeline per topology, fill mode and target
//! format.

pub mod mesh;
