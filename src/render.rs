//! Deferred draw recording and per-window submission.
//!
//! Draw calls made during a frame only append a [`DrawCommand`] to the
//! [`DrawList`]. At the end of the frame the renderer encodes the commands of
//! each window into one render pass, lowest layer first, and submits them.
//!
//! # Key types
//!
//! - [`DrawCommand`] is a self-contained draw: vertices, uniform and texture
//! - [`DrawList`] collects the commands of a frame
//! - [`FrameResources`] owns the vertex and uniform buffers reused between frames

use std::iter;

use crate::{
    data_structures::vertex::{DrawMode, FillMode, Vertex},
    driver::{GpuHandle, WgpuTextures},
    pipelines::mesh::{DrawUniform, MeshPipelines, PipelineKey},
    window::{WindowHandle, WindowSurface},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub window: WindowHandle,
    pub layer: i32,
    pub mode: DrawMode,
    pub fill: FillMode,
    pub vertices: Vec<Vertex>,
    pub uniform: DrawUniform,
    pub texture: Option<GpuHandle>,
}

#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a command. Commands without vertices are dropped.
    pub fn push(&mut self, command: DrawCommand) {
        if command.vertices.is_empty() {
            log::debug!("skipping draw without vertices");
            return;
        }
        self.commands.push(command);
    }

    /// The commands recorded for `window` in submission order: ascending layer,
    /// recording order within a layer.
    pub fn for_window(&self, window: WindowHandle) -> Vec<&DrawCommand> {
        let mut commands: Vec<&DrawCommand> =
            self.commands.iter().filter(|c| c.window == window).collect();
        // stable, keeps recording order per layer
        commands.sort_by_key(|c| c.layer);
        commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Packs uniforms at the device's dynamic offset alignment.
fn uniform_stride(alignment: u32) -> wgpu::BufferAddress {
    let size = std::mem::size_of::<DrawUniform>() as wgpu::BufferAddress;
    let alignment = wgpu::BufferAddress::from(alignment.max(1));
    size.div_ceil(alignment) * alignment
}

/// GPU buffers of the frame, grown on demand and reused afterwards.
#[derive(Debug)]
pub struct FrameResources {
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_stride: wgpu::BufferAddress,
}

impl FrameResources {
    pub fn new(device: &wgpu::Device, pipelines: &MeshPipelines) -> Self {
        let uniform_stride = uniform_stride(device.limits().min_uniform_buffer_offset_alignment);
        let vertex_buffer = Self::vertex_buffer(device, 1024);
        let uniform_buffer = Self::uniform_buffer(device, 64 * uniform_stride);
        let uniform_bind_group = Self::uniform_bind_group(device, pipelines, &uniform_buffer);
        Self {
            vertex_buffer,
            uniform_buffer,
            uniform_bind_group,
            uniform_stride,
        }
    }

    fn vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Vertex Buffer"),
            size: (vertices * std::mem::size_of::<Vertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn uniform_buffer(device: &wgpu::Device, size: wgpu::BufferAddress) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn uniform_bind_group(
        device: &wgpu::Device,
        pipelines: &MeshPipelines,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: pipelines.uniform_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as wgpu::BufferAddress
                    ),
                }),
            }],
            label: Some("draw_uniform_bind_group"),
        })
    }

    fn reserve(
        &mut self,
        device: &wgpu::Device,
        pipelines: &MeshPipelines,
        vertex_bytes: wgpu::BufferAddress,
        uniform_bytes: wgpu::BufferAddress,
    ) {
        if vertex_bytes > self.vertex_buffer.size() {
            let vertices = (vertex_bytes as usize / std::mem::size_of::<Vertex>()).next_power_of_two();
            self.vertex_buffer = Self::vertex_buffer(device, vertices);
        }
        if uniform_bytes > self.uniform_buffer.size() {
            let size = uniform_bytes.div_ceil(self.uniform_stride).next_power_of_two() * self.uniform_stride;
            self.uniform_buffer = Self::uniform_buffer(device, size);
            self.uniform_bind_group = Self::uniform_bind_group(device, pipelines, &self.uniform_buffer);
        }
    }
}

/// Everything needed to encode the commands of one window.
pub struct FrameTarget<'a> {
    pub surface: &'a WindowSurface,
    pub view: &'a wgpu::TextureView,
}

/// Encodes and submits the commands of one window.
///
/// Vertices and uniforms of all commands are uploaded in one write each, then
/// drawn in a single pass that clears to the window colour.
pub fn submit_window(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipelines: &mut MeshPipelines,
    frame: &mut FrameResources,
    textures: &WgpuTextures,
    target: FrameTarget<'_>,
    commands: &[&DrawCommand],
) {
    let format = target.surface.format();

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut uniforms: Vec<u8> = Vec::new();
    let mut draws = Vec::with_capacity(commands.len());
    for (i, command) in commands.iter().enumerate() {
        let (topology, expanded) = command.mode.expand(&command.vertices);
        let key = PipelineKey {
            topology,
            polygon_mode: command.fill.polygon_mode(),
            format,
        };
        pipelines.prepare(device, key);

        let first = vertices.len() as u32;
        vertices.extend_from_slice(&expanded);
        let range = first..vertices.len() as u32;

        uniforms.resize(i * frame.uniform_stride as usize, 0);
        uniforms.extend_from_slice(bytemuck::bytes_of(&command.uniform));
        draws.push((key, range, command.texture));
    }

    let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
    frame.reserve(
        device,
        pipelines,
        vertex_bytes.len() as wgpu::BufferAddress,
        uniforms.len() as wgpu::BufferAddress,
    );
    if !vertex_bytes.is_empty() {
        queue.write_buffer(&frame.vertex_buffer, 0, vertex_bytes);
        queue.write_buffer(&frame.uniform_buffer, 0, &uniforms);
    }

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Render Encoder"),
    });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(target.surface.clear_color.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        let (width, height) = (target.surface.config.width, target.surface.config.height);
        match target.surface.geometry.viewport.clamped(width, height) {
            Some(v) => render_pass.set_viewport(
                v.x as f32,
                v.y as f32,
                v.width as f32,
                v.height as f32,
                0.0,
                1.0,
            ),
            None => log::warn!("window viewport lies outside the window, drawing nothing"),
        }

        render_pass.set_vertex_buffer(0, frame.vertex_buffer.slice(..));
        for (i, (key, range, texture)) in draws.into_iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let Some(pipeline) = pipelines.get(&key) else {
                continue;
            };
            let offset = (i as wgpu::BufferAddress * frame.uniform_stride) as wgpu::DynamicOffset;
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &frame.uniform_bind_group, &[offset]);
            render_pass.set_bind_group(1, textures.bind_group(texture), &[]);
            render_pass.draw(range, 0..1);
        }
    }

    queue.submit(iter::once(encoder.finish()));
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn command(window: WindowHandle, layer: i32, x: f32) -> DrawCommand {
        DrawCommand {
            window,
            layer,
            mode: DrawMode::Points,
            fill: FillMode::Fill,
            vertices: vec![Vertex::new(x, 0.0, 0.0)],
            uniform: DrawUniform::default(),
            texture: None,
        }
    }

    #[test]
    fn commands_sort_by_layer_and_keep_recording_order() {
        let mut windows: SlotMap<WindowHandle, ()> = SlotMap::with_key();
        let (a, b) = (windows.insert(()), windows.insert(()));

        let mut list = DrawList::new();
        list.push(command(a, 2, 0.0));
        list.push(command(a, 1, 1.0));
        list.push(command(b, 0, 2.0));
        list.push(command(a, 1, 3.0));

        let xs: Vec<f32> = list
            .for_window(a)
            .iter()
            .map(|c| c.vertices[0].position[0])
            .collect();
        assert_eq!(xs, vec![1.0, 3.0, 0.0]);
        assert_eq!(list.for_window(b).len(), 1);
    }

    #[test]
    fn empty_draws_are_not_recorded() {
        let mut windows: SlotMap<WindowHandle, ()> = SlotMap::with_key();
        let mut empty = command(windows.insert(()), 0, 0.0);
        empty.vertices.clear();

        let mut list = DrawList::new();
        list.push(empty);
        assert!(list.is_empty());
    }

    #[test]
    fn uniform_stride_respects_alignment() {
        assert_eq!(uniform_stride(256), 256);
        assert_eq!(uniform_stride(64), 256);
        assert_eq!(uniform_stride(32), 224);
    }
}
