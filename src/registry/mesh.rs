//! Mesh ownership and the incremental mesh builder.
//!
//! Meshes are either assembled vertex by vertex in the registry's single build
//! slot (`begin_mesh` .. `end_mesh`) or loaded complete from a file. Finished
//! meshes live in the registry and are addressed by [`MeshHandle`].

use std::path::Path;

use slotmap::{SlotMap, new_key_type};

use crate::{
    data_structures::{
        mesh::Mesh,
        vertex::{Color, DrawMode, Vertex},
    },
    driver::TextureDriver,
    registry::texture::{TextureHandle, TextureRegistry},
    resources,
};

new_key_type! {
    /// Handle of a finished mesh.
    pub struct MeshHandle;
}

#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: SlotMap<MeshHandle, Mesh>,
    building: Option<Mesh>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new mesh in the build slot.
    ///
    /// A mesh still under construction is discarded.
    pub fn begin_mesh(&mut self, textured: bool) {
        let mesh = if textured {
            Mesh::textured()
        } else {
            Mesh::plain()
        };
        if let Some(abandoned) = self.building.replace(mesh) {
            log::debug!(
                "discarding unfinished mesh with {} vertices",
                abandoned.vertices().len()
            );
        }
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        if let Some(mesh) = &mut self.building {
            mesh.add_vertex(vertex);
        }
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        if let Some(mesh) = &mut self.building {
            mesh.set_draw_mode(mode);
        }
    }

    pub fn set_color(&mut self, color: Color) {
        if let Some(mesh) = &mut self.building {
            mesh.set_color(color);
        }
    }

    /// Assign a texture to the mesh under construction.
    ///
    /// Ignored unless that mesh is textured. Returns whether it was taken.
    pub fn set_texture(&mut self, texture: TextureHandle) -> bool {
        self.building
            .as_mut()
            .is_some_and(|mesh| mesh.set_texture(texture))
    }

    /// Finish the mesh under construction and take it into the registry.
    pub fn end_mesh(&mut self) -> Option<MeshHandle> {
        let mesh = self.building.take()?;
        Some(self.meshes.insert(mesh))
    }

    pub fn active(&self) -> Option<&Mesh> {
        self.building.as_ref()
    }

    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// Load a finished mesh from a file, bypassing the build slot.
    ///
    /// With `textured` set, a texture named by the file is loaded through
    /// `textures`. A texture that fails to load leaves the slot empty.
    pub fn load_from_file<D: TextureDriver>(
        &mut self,
        root: Option<&Path>,
        path: &str,
        textured: bool,
        textures: &mut TextureRegistry<D>,
    ) -> anyhow::Result<MeshHandle> {
        let file = resources::mesh::load_mesh(root, path)?;
        let mut mesh = file.mesh;
        if textured {
            mesh = mesh.into_textured();
            if let Some(texture_path) = file.texture {
                match textures.load_by_path(&texture_path) {
                    Ok(texture) => {
                        mesh.set_texture(texture);
                    }
                    Err(e) => log::error!("mesh {path}: {e}"),
                }
            }
        }
        Ok(self.meshes.insert(mesh))
    }

    pub fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn get_mut(&mut self, handle: MeshHandle) -> Option<&mut Mesh> {
        self.meshes.get_mut(handle)
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Drop every mesh, including one under construction.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.building = None;
    }
}
