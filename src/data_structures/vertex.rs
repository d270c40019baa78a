//! Vertex layout, colours and primitive topology.
//!
//! Every draw call of the backend (rects, lines and meshes) ends up as a slice of
//! [`Vertex`] plus a [`DrawMode`]. Draw modes that wgpu cannot express directly
//! (line loops and triangle fans) are expanded on the CPU by
//! [`DrawMode::expand`].

use std::borrow::Cow;

/// A single vertex: homogeneous position, RGBA colour and texture coordinates.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x2];

    /// A white vertex at `(x, y, z)` with uv `(0, 0)`.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z, 1.0],
            color: Color::WHITE.into(),
            tex_coords: [0.0, 0.0],
        }
    }

    pub fn with_color(mut self, color: impl Into<Color>) -> Self {
        self.color = color.into().into();
        self
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.tex_coords = [u, v];
        self
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl From<[f32; 2]> for Vertex {
    fn from([x, y]: [f32; 2]) -> Self {
        Vertex::new(x, y, 0.0)
    }
}

impl From<[f32; 3]> for Vertex {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vertex::new(x, y, z)
    }
}

impl From<cgmath::Vector2<f32>> for Vertex {
    fn from(v: cgmath::Vector2<f32>) -> Self {
        Vertex::new(v.x, v.y, 0.0)
    }
}

impl From<cgmath::Vector3<f32>> for Vertex {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        Vertex::new(v.x, v.y, v.z)
    }
}

impl<P, C> From<(P, C)> for Vertex
where
    P: Into<Vertex>,
    C: Into<Color>,
{
    fn from((position, color): (P, C)) -> Self {
        position.into().with_color(color)
    }
}

impl<P, C> From<(P, C, [f32; 2])> for Vertex
where
    P: Into<Vertex>,
    C: Into<Color>,
{
    fn from((position, color, [u, v]): (P, C, [f32; 2])) -> Self {
        position.into().with_color(color).with_uv(u, v)
    }
}

/// Linear RGBA colour with components in `0.0..=1.0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let f = |c: u8| f32::from(c) / 255.0;
        Self::new(f(r), f(g), f(b), f(a))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl From<[f32; 3]> for Color {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Color::new(r, g, b, 1.0)
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Color::new(r, g, b, a)
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: f64::from(c.r),
            g: f64::from(c.g),
            b: f64::from(c.b),
            a: f64::from(c.a),
        }
    }
}

/// Primitive topology of a mesh.
///
/// The numeric values match the OpenGL primitive enums so that mesh files
/// written for GL based tools load unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    #[default]
    TriangleFan,
}

impl DrawMode {
    pub fn from_gl(mode: u32) -> Option<Self> {
        Some(match mode {
            0 => DrawMode::Points,
            1 => DrawMode::Lines,
            2 => DrawMode::LineLoop,
            3 => DrawMode::LineStrip,
            4 => DrawMode::Triangles,
            5 => DrawMode::TriangleStrip,
            6 => DrawMode::TriangleFan,
            _ => return None,
        })
    }

    pub fn to_gl(self) -> u32 {
        match self {
            DrawMode::Points => 0,
            DrawMode::Lines => 1,
            DrawMode::LineLoop => 2,
            DrawMode::LineStrip => 3,
            DrawMode::Triangles => 4,
            DrawMode::TriangleStrip => 5,
            DrawMode::TriangleFan => 6,
        }
    }

    /// Parses either a mode name (`"triangle_fan"`, `"lines"`, ...) or its GL number.
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(n) = s.parse::<u32>() {
            return Self::from_gl(n);
        }
        Some(match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "points" => DrawMode::Points,
            "lines" => DrawMode::Lines,
            "line_loop" => DrawMode::LineLoop,
            "line_strip" => DrawMode::LineStrip,
            "triangles" => DrawMode::Triangles,
            "triangle_strip" => DrawMode::TriangleStrip,
            "triangle_fan" => DrawMode::TriangleFan,
            _ => return None,
        })
    }

    /// Converts the vertices to a topology wgpu can draw.
    ///
    /// Line loops are closed into a strip and fans are split into a triangle
    /// list; every other mode borrows the input unchanged.
    pub fn expand(self, vertices: &[Vertex]) -> (wgpu::PrimitiveTopology, Cow<'_, [Vertex]>) {
        use wgpu::PrimitiveTopology as T;
        match self {
            DrawMode::Points => (T::PointList, Cow::Borrowed(vertices)),
            DrawMode::Lines => (T::LineList, Cow::Borrowed(vertices)),
            DrawMode::LineStrip => (T::LineStrip, Cow::Borrowed(vertices)),
            DrawMode::Triangles => (T::TriangleList, Cow::Borrowed(vertices)),
            DrawMode::TriangleStrip => (T::TriangleStrip, Cow::Borrowed(vertices)),
            DrawMode::LineLoop => {
                let mut closed = vertices.to_vec();
                if let Some(first) = vertices.first().filter(|_| vertices.len() > 2) {
                    closed.push(*first);
                }
                (T::LineStrip, Cow::Owned(closed))
            }
            DrawMode::TriangleFan => {
                let list = match vertices.split_first() {
                    Some((hub, rim)) => rim
                        .windows(2)
                        .flat_map(|edge| [*hub, edge[0], edge[1]])
                        .collect(),
                    None => Vec::new(),
                };
                (T::TriangleList, Cow::Owned(list))
            }
        }
    }
}

/// Polygon rasterisation mode, numbered like `glPolygonMode` offsets from `GL_POINT`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    Point,
    Line,
    #[default]
    Fill,
}

impl FillMode {
    pub fn from_index(i: i32) -> Option<Self> {
        match i {
            0 => Some(FillMode::Point),
            1 => Some(FillMode::Line),
            2 => Some(FillMode::Fill),
            _ => None,
        }
    }

    pub fn polygon_mode(self) -> wgpu::PolygonMode {
        match self {
            FillMode::Point => wgpu::PolygonMode::Point,
            FillMode::Line => wgpu::PolygonMode::Line,
            FillMode::Fill => wgpu::PolygonMode::Fill,
        }
    }

    /// Device feature required to rasterise in this mode, if any.
    pub fn required_feature(self) -> Option<wgpu::Features> {
        match self {
            FillMode::Point => Some(wgpu::Features::POLYGON_MODE_POINT),
            FillMode::Line => Some(wgpu::Features::POLYGON_MODE_LINE),
            FillMode::Fill => None,
        }
    }
}
