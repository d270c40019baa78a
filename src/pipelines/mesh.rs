use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};

use crate::data_structures::vertex::Vertex;

/// Per draw uniform, bound at group 0 with a dynamic offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub uv: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl DrawUniform {
    pub fn new(model: Matrix4<f32>, view_proj: Matrix4<f32>, uv: Matrix4<f32>, color: [f32; 4]) -> Self {
        Self {
            model: model.into(),
            view_proj: view_proj.into(),
            uv: uv.into(),
            color,
        }
    }
}

impl Default for DrawUniform {
    fn default() -> Self {
        let identity = Matrix4::<f32>::identity();
        Self::new(identity, identity, identity, [1.0; 4])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub topology: wgpu::PrimitiveTopology,
    pub polygon_mode: wgpu::PolygonMode,
    pub format: wgpu::TextureFormat,
}

/// The mesh pipeline in every topology, fill mode and target format in use.
///
/// Pipelines are built on first request and kept for the renderer's lifetime.
#[derive(Debug)]
pub struct MeshPipelines {
    uniform_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl MeshPipelines {
    pub fn new(device: &wgpu::Device, texture_layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as wgpu::BufferAddress,
                    ),
                },
                count: None,
            }],
            label: Some("draw_uniform_bind_group_layout"),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[Some(&uniform_layout), Some(texture_layout)],
            immediate_size: 0,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("mesh.wgsl").into()),
        });

        Self {
            uniform_layout,
            layout,
            shader,
            cache: HashMap::new(),
        }
    }

    pub fn uniform_layout(&self) -> &wgpu::BindGroupLayout {
        &self.uniform_layout
    }

    /// Builds the pipeline for `key` unless it exists already.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if !self.cache.contains_key(&key) {
            log::debug!("building mesh pipeline {key:?}");
            let pipeline = mk_render_pipeline(
                device,
                &self.layout,
                key,
                Some(wgpu::BlendState::ALPHA_BLENDING),
                &[Vertex::desc()],
                &self.shader,
            );
            self.cache.insert(key, pipeline);
        }
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.cache.get(key)
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
    blend: Option<wgpu::BlendState>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Mesh Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // 2D content is wound either way
            cull_mode: None,
            polygon_mode: key.polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        // draw order is the layer order, there is no depth buffer
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

