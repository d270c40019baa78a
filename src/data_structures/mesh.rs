//! Mesh entities.

use crate::{
    data_structures::vertex::{Color, DrawMode, Vertex},
    registry::texture::TextureHandle,
};

/// Whether a mesh can carry a texture.
///
/// Only the textured variant owns a texture slot, so assigning a texture to a
/// plain mesh has nowhere to go and is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MeshKind {
    #[default]
    Plain,
    Textured { texture: Option<TextureHandle> },
}

/// An owned list of vertices plus the metadata needed to draw it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Mesh {
    draw_mode: DrawMode,
    vertices: Vec<Vertex>,
    color: Color,
    kind: MeshKind,
}

impl Mesh {
    pub fn new(draw_mode: DrawMode, vertices: Vec<Vertex>, color: Color) -> Self {
        Self {
            draw_mode,
            vertices,
            color,
            kind: MeshKind::Plain,
        }
    }

    pub fn plain() -> Self {
        Self::default()
    }

    pub fn textured() -> Self {
        Self {
            kind: MeshKind::Textured { texture: None },
            ..Self::default()
        }
    }

    /// Turns a plain mesh into a textured one with an empty slot; keeps an
    /// already textured mesh as it is.
    pub fn into_textured(mut self) -> Self {
        if let MeshKind::Plain = self.kind {
            self.kind = MeshKind::Textured { texture: None };
        }
        self
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn is_textured(&self) -> bool {
        matches!(self.kind, MeshKind::Textured { .. })
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        match self.kind {
            MeshKind::Textured { texture } => texture,
            MeshKind::Plain => None,
        }
    }

    /// Assigns `texture` if this mesh has a texture slot.
    ///
    /// Returns whether the texture was taken.
    pub fn set_texture(&mut self, texture: TextureHandle) -> bool {
        match &mut self.kind {
            MeshKind::Textured { texture: slot } => {
                *slot = Some(texture);
                true
            }
            MeshKind::Plain => false,
        }
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.draw_mode = mode;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}
