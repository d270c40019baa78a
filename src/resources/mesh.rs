//! Mesh description files.
//!
//! Three formats are understood, picked by file extension:
//!
//! - `.mesh`, a line based text description:
//!
//!   ```text
//!   # a textured quad
//!   mode triangle_strip
//!   color 1 1 1 1
//!   texture crate.png
//!   v -0.5 -0.5 | 1 1 1 | 0 1
//!   v  0.5 -0.5 | 1 1 1 | 1 1
//!   v -0.5  0.5 0 | 1 1 1 1 | 0 0
//!   v  0.5  0.5
//!   ```
//!
//!   A vertex is up to three `|` separated groups: position (2 or 3 values),
//!   colour (RGB or RGBA, default white) and uv (default `0 0`). `mode` accepts a
//!   name or an OpenGL primitive number.
//! - `.meshb`, the binary stream written by [`encode_binary`].
//! - `.obj`, Wavefront files read with `tobj`; the first material's diffuse
//!   texture becomes the mesh texture.
//!
//! Texture paths inside a mesh file, `.mesh` and `.mtl` alike, are relative to
//! the directory of the file that names them. [`load_mesh`] returns them joined
//! onto that directory, ready to be loaded from the same asset root.

use std::{
    io::{BufReader, Cursor},
    path::Path,
};

use anyhow::{Context, anyhow, bail, ensure};

use crate::{
    data_structures::{
        mesh::Mesh,
        vertex::{Color, DrawMode, Vertex},
    },
    resources::{load_binary, load_string},
};

const MAGIC: &[u8; 4] = b"ORBM";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 16 + 4;
const VERTEX_LEN: usize = 10 * 4;

/// A parsed mesh file. `texture` is the image the file refers to, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshFile {
    pub mesh: Mesh,
    pub texture: Option<String>,
}

pub fn load_mesh(root: Option<&Path>, file_name: &str) -> anyhow::Result<MeshFile> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("meshb") => {
            let bytes = load_binary(root, file_name)?;
            let mesh = decode_binary(&bytes).with_context(|| format!("in {file_name}"))?;
            Ok(MeshFile {
                mesh,
                texture: None,
            })
        }
        Some("obj") => load_obj(root, file_name),
        _ => {
            let text = load_string(root, file_name)?;
            let mut file = parse_text(&text).with_context(|| format!("in {file_name}"))?;
            file.texture = file.texture.map(|t| relative_to(file_name, &t));
            Ok(file)
        }
    }
}

/// `path` as seen from the directory holding `file_name`.
fn relative_to(file_name: &str, path: &str) -> String {
    match Path::new(file_name).parent() {
        Some(dir) => dir.join(path).to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

pub fn parse_text(src: &str) -> anyhow::Result<MeshFile> {
    let mut mesh = Mesh::plain();
    let mut texture = None;

    for (idx, raw) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match directive {
            "mode" => {
                let mode = DrawMode::parse(rest)
                    .ok_or_else(|| anyhow!("line {line_no}: unknown draw mode {rest:?}"))?;
                mesh.set_draw_mode(mode);
            }
            "color" | "colour" => {
                let values = parse_floats(rest).with_context(|| format!("line {line_no}"))?;
                mesh.set_color(to_color(&values).with_context(|| format!("line {line_no}"))?);
            }
            "texture" => {
                ensure!(!rest.is_empty(), "line {line_no}: texture without a path");
                texture = Some(rest.to_string());
            }
            "v" => {
                let vertex = parse_vertex(rest).with_context(|| format!("line {line_no}"))?;
                mesh.add_vertex(vertex);
            }
            other => bail!("line {line_no}: unknown directive {other:?}"),
        }
    }

    Ok(MeshFile { mesh, texture })
}

fn parse_floats(s: &str) -> anyhow::Result<Vec<f32>> {
    s.split_whitespace()
        .map(|t| t.parse::<f32>().map_err(|e| anyhow!("{t:?}: {e}")))
        .collect()
}

fn to_color(values: &[f32]) -> anyhow::Result<Color> {
    match *values {
        [r, g, b] => Ok(Color::new(r, g, b, 1.0)),
        [r, g, b, a] => Ok(Color::new(r, g, b, a)),
        _ => bail!("a colour needs 3 or 4 components, got {}", values.len()),
    }
}

fn parse_vertex(s: &str) -> anyhow::Result<Vertex> {
    let mut groups = s.split('|');
    let position = parse_floats(groups.next().unwrap_or_default())?;
    let mut vertex = match *position {
        [x, y] => Vertex::new(x, y, 0.0),
        [x, y, z] => Vertex::new(x, y, z),
        _ => bail!("a position needs 2 or 3 components, got {}", position.len()),
    };
    if let Some(color) = groups.next() {
        vertex = vertex.with_color(to_color(&parse_floats(color)?)?);
    }
    if let Some(uv) = groups.next() {
        let uv = parse_floats(uv)?;
        match *uv {
            [u, v] => vertex = vertex.with_uv(u, v),
            _ => bail!("a uv needs 2 components, got {}", uv.len()),
        }
    }
    ensure!(groups.next().is_none(), "too many vertex groups");
    Ok(vertex)
}

/// Serialise a mesh into the `.meshb` stream format (little-endian).
pub fn encode_binary(mesh: &Mesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + mesh.vertices().len() * VERTEX_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&mesh.draw_mode().to_gl().to_le_bytes());
    let color: [f32; 4] = mesh.color().into();
    color
        .iter()
        .for_each(|c| out.extend_from_slice(&c.to_le_bytes()));
    out.extend_from_slice(&(mesh.vertices().len() as u32).to_le_bytes());
    for v in mesh.vertices() {
        v.position
            .iter()
            .chain(&v.color)
            .chain(&v.tex_coords)
            .for_each(|f| out.extend_from_slice(&f.to_le_bytes()));
    }
    out
}

pub fn decode_binary(bytes: &[u8]) -> anyhow::Result<Mesh> {
    ensure!(bytes.len() >= HEADER_LEN, "truncated mesh header");
    ensure!(&bytes[..4] == MAGIC, "not a mesh stream");

    let mut words = bytes[4..HEADER_LEN]
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]]);
    let mut next = || words.next().unwrap_or_default();

    let version = u32::from_le_bytes(next());
    ensure!(version == VERSION, "unsupported mesh stream version {version}");
    let gl_mode = u32::from_le_bytes(next());
    let mode = DrawMode::from_gl(gl_mode).ok_or_else(|| anyhow!("unknown draw mode {gl_mode}"))?;
    let color = Color::new(
        f32::from_le_bytes(next()),
        f32::from_le_bytes(next()),
        f32::from_le_bytes(next()),
        f32::from_le_bytes(next()),
    );
    let count = u32::from_le_bytes(next()) as usize;

    let body = &bytes[HEADER_LEN..];
    ensure!(
        body.len() == count * VERTEX_LEN,
        "expected {count} vertices ({} bytes), found {} bytes",
        count * VERTEX_LEN,
        body.len()
    );

    let vertices = body
        .chunks_exact(VERTEX_LEN)
        .map(|chunk| {
            let mut f = chunk
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
            let mut take = || f.next().unwrap_or_default();
            Vertex {
                position: [take(), take(), take(), take()],
                color: [take(), take(), take(), take()],
                tex_coords: [take(), take()],
            }
        })
        .collect();

    Ok(Mesh::new(mode, vertices, color))
}

fn load_obj(root: Option<&Path>, file_name: &str) -> anyhow::Result<MeshFile> {
    let obj_text = load_string(root, file_name)?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let base = Path::new(file_name).parent().unwrap_or(Path::new(""));

    let (models, materials) = tobj::load_obj_buf(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_name = base.join(p);
            let mtl_text = load_string(root, &mtl_name.to_string_lossy())
                .map_err(|_| tobj::LoadError::OpenFileFailed)?;
            tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text)))
        },
    )
    .with_context(|| format!("could not parse {file_name}"))?;

    let texture = match materials {
        Ok(materials) => materials
            .into_iter()
            .find_map(|m| m.diffuse_texture)
            .map(|t| relative_to(file_name, &t)),
        Err(e) => {
            log::warn!("{file_name}: materials not loaded ({e})");
            None
        }
    };

    let mut vertices = Vec::new();
    for model in &models {
        let m = &model.mesh;
        for &i in &m.indices {
            let i = i as usize;
            let mut vertex = Vertex::new(
                m.positions[i * 3],
                m.positions[i * 3 + 1],
                m.positions[i * 3 + 2],
            );
            if m.vertex_color.len() >= (i + 1) * 3 {
                vertex = vertex.with_color([
                    m.vertex_color[i * 3],
                    m.vertex_color[i * 3 + 1],
                    m.vertex_color[i * 3 + 2],
                ]);
            }
            if m.texcoords.len() >= (i + 1) * 2 {
                // obj uvs grow upwards, texture rows grow downwards
                vertex = vertex.with_uv(m.texcoords[i * 2], 1.0 - m.texcoords[i * 2 + 1]);
            }
            vertices.push(vertex);
        }
    }

    Ok(MeshFile {
        mesh: Mesh::new(DrawMode::Triangles, vertices, Color::WHITE),
        texture,
    })
}
