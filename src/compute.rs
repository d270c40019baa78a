//! Custom compute passes.
//!
//! A pass is described by a `.rpass.meta` TOML file next to its WGSL shader:
//!
//! ```toml
//! shader = "particles.wgsl"
//! entry_point = "main"
//!
//! [[buffers]]
//! name = "particles"
//! binding = 0
//! kind = "storage"
//!
//! [[buffers]]
//! name = "params"
//! binding = 1
//! kind = "uniform"
//! ```
//!
//! All buffers live in bind group 0. A buffer is allocated by its first
//! [`ComputePass::write_buffer`] and grows when larger data is written.

use std::{
    collections::{BTreeMap, HashSet},
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow, bail, ensure};
use serde::Deserialize;
use slotmap::new_key_type;

use crate::{context::GpuErrors, resources};

new_key_type! {
    /// Handle of a loaded compute pass.
    pub struct ComputeHandle;
}

pub const META_SUFFIX: &str = ".rpass.meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    Storage,
    Uniform,
}

impl BufferKind {
    fn usage(self) -> wgpu::BufferUsages {
        match self {
            BufferKind::Storage => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC
            }
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }
    }

    fn binding_type(self) -> wgpu::BindingType {
        let ty = match self {
            BufferKind::Storage => wgpu::BufferBindingType::Storage { read_only: false },
            BufferKind::Uniform => wgpu::BufferBindingType::Uniform,
        };
        wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BufferMeta {
    pub name: String,
    pub binding: u32,
    pub kind: BufferKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComputeMeta {
    /// Shader path, relative to the meta file.
    pub shader: PathBuf,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub buffers: Vec<BufferMeta>,
}

fn default_entry_point() -> String {
    "main".to_string()
}

impl ComputeMeta {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let meta: ComputeMeta = toml::from_str(content)?;
        let mut names = HashSet::new();
        let mut bindings = HashSet::new();
        for buffer in &meta.buffers {
            ensure!(
                names.insert(buffer.name.as_str()),
                "buffer {:?} declared twice",
                buffer.name
            );
            ensure!(
                bindings.insert(buffer.binding),
                "binding {} used twice",
                buffer.binding
            );
        }
        Ok(meta)
    }

    /// Reads a meta file. The name must end in `.rpass.meta`.
    pub fn load(root: Option<&Path>, file_name: &str) -> anyhow::Result<Self> {
        if !file_name.ends_with(META_SUFFIX) {
            bail!("{file_name} is not a {META_SUFFIX} file");
        }
        let content = resources::load_string(root, file_name)?;
        let mut meta =
            Self::parse(&content).with_context(|| format!("Failed to parse {file_name}"))?;
        if let Some(dir) = Path::new(file_name).parent() {
            meta.shader = dir.join(&meta.shader);
        }
        Ok(meta)
    }
}

/// Byte range written by a sub-buffer write of element `index`.
fn element_range(index: u64, struct_size: u64, len: u64) -> Option<Range<u64>> {
    let start = index.checked_mul(struct_size)?;
    let end = start.checked_add(len)?;
    Some(start..end)
}

/// Buffer writes must be a multiple of `COPY_BUFFER_ALIGNMENT`.
fn padded(bytes: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if bytes.len() % align == 0 {
        std::borrow::Cow::Borrowed(bytes)
    } else {
        let mut v = bytes.to_vec();
        v.resize(bytes.len().next_multiple_of(align), 0);
        std::borrow::Cow::Owned(v)
    }
}

#[derive(Debug)]
struct BufferSlot {
    meta: BufferMeta,
    buffer: Option<wgpu::Buffer>,
}

#[derive(Debug)]
pub struct ComputePass {
    name: String,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    // ordered by binding
    buffers: BTreeMap<u32, BufferSlot>,
    bind_group: Option<wgpu::BindGroup>,
}

impl ComputePass {
    /// Compiles the pass described by `file_name`. Shader and layout errors
    /// reported by the device fail the load.
    pub fn load(
        device: &wgpu::Device,
        errors: &GpuErrors,
        root: Option<&Path>,
        file_name: &str,
    ) -> anyhow::Result<Self> {
        let meta = ComputeMeta::load(root, file_name)?;
        let source = resources::load_string(root, &meta.shader.to_string_lossy())?;
        let (layout, pipeline) = errors.capture(file_name, || {
            Self::build_pipeline(device, &meta, file_name, source)
        })?;

        let buffers = meta
            .buffers
            .into_iter()
            .map(|meta| (meta.binding, BufferSlot { meta, buffer: None }))
            .collect();

        log::info!("loaded compute pass {file_name}");
        Ok(Self {
            name: file_name.to_string(),
            pipeline,
            layout,
            buffers,
            bind_group: None,
        })
    }

    fn build_pipeline(
        device: &wgpu::Device,
        meta: &ComputeMeta,
        file_name: &str,
        source: String,
    ) -> (wgpu::BindGroupLayout, wgpu::ComputePipeline) {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = meta
            .buffers
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: b.kind.binding_type(),
                count: None,
            })
            .collect();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &entries,
            label: Some("compute_bind_group_layout"),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Compute Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(file_name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(file_name),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(&meta.entry_point),
            compilation_options: Default::default(),
            cache: None,
        });
        (layout, pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn slot(&mut self, name: &str) -> anyhow::Result<&mut BufferSlot> {
        self.buffers
            .values_mut()
            .find(|s| s.meta.name == name)
            .ok_or_else(|| anyhow!("{} has no buffer named {name:?}", self.name))
    }

    /// Replaces the contents of a buffer, growing it when `bytes` does not fit.
    pub fn write_buffer(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        ensure!(!bytes.is_empty(), "no data for buffer {name:?}");
        let data = padded(bytes);
        let slot = self.slot(name)?;
        let fits = slot
            .buffer
            .as_ref()
            .is_some_and(|b| b.size() >= data.len() as wgpu::BufferAddress);
        if !fits {
            slot.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(name),
                size: data.len() as wgpu::BufferAddress,
                usage: slot.meta.kind.usage(),
                mapped_at_creation: false,
            }));
            self.bind_group = None;
        }
        let slot = self.slot(name)?;
        if let Some(buffer) = &slot.buffer {
            queue.write_buffer(buffer, 0, &data);
        }
        Ok(())
    }

    /// Writes element `index` of an array of `struct_size` byte structs.
    pub fn write_sub_buffer(
        &mut self,
        queue: &wgpu::Queue,
        name: &str,
        index: usize,
        struct_size: usize,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        let slot = self.slot(name)?;
        let buffer = slot
            .buffer
            .as_ref()
            .ok_or_else(|| anyhow!("buffer {name:?} was never written"))?;
        let data = padded(bytes);
        let range = element_range(index as u64, struct_size as u64, data.len() as u64)
            .ok_or_else(|| anyhow!("element {index} of buffer {name:?} is out of range"))?;
        ensure!(
            range.end <= buffer.size(),
            "element {index} of buffer {name:?} ends at byte {} but the buffer holds {}",
            range.end,
            buffer.size()
        );
        ensure!(
            range.start % wgpu::COPY_BUFFER_ALIGNMENT == 0,
            "element {index} of buffer {name:?} starts at unaligned byte {}",
            range.start
        );
        queue.write_buffer(buffer, range.start, &data);
        Ok(())
    }

    pub fn write_uniform(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        let kind = self.slot(name)?.meta.kind;
        ensure!(kind == BufferKind::Uniform, "buffer {name:?} is not a uniform");
        self.write_buffer(device, queue, name, bytes)
    }

    pub fn dispatch(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        z: u32,
    ) -> anyhow::Result<()> {
        if self.bind_group.is_none() {
            let mut entries = Vec::with_capacity(self.buffers.len());
            for (binding, slot) in &self.buffers {
                let buffer = slot
                    .buffer
                    .as_ref()
                    .ok_or_else(|| anyhow!("buffer {:?} was never written", slot.meta.name))?;
                entries.push(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: buffer.as_entire_binding(),
                });
            }
            self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.layout,
                entries: &entries,
                label: Some("compute_bind_group"),
            }));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Compute Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Compute Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, self.bind_group.as_ref(), &[]);
            pass.dispatch_workgroups(x, y, z);
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Copies a storage buffer back to the CPU, blocking until the GPU is done.
    pub fn read_buffer(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        runtime: &tokio::runtime::Runtime,
        name: &str,
    ) -> anyhow::Result<Vec<u8>> {
        let slot = self.slot(name)?;
        ensure!(
            slot.meta.kind == BufferKind::Storage,
            "only storage buffers can be read back"
        );
        let buffer = slot
            .buffer
            .as_ref()
            .ok_or_else(|| anyhow!("buffer {name:?} was never written"))?;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compute Readback Buffer"),
            size: buffer.size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
        queue.submit(std::iter::once(encoder.finish()));

        let read = async {
            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            let slice = staging.slice(..);
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: Some(std::time::Duration::from_secs(3)),
                })
                .map_err(|e| anyhow!("waiting for the device failed: {e:?}"))?;
            rx.receive()
                .await
                .ok_or_else(|| anyhow!("buffer mapping was cancelled"))?
                .map_err(|e| anyhow!("could not map {name:?}: {e:?}"))?;
            let data = slice.get_mapped_range().to_vec();
            Ok::<_, anyhow::Error>(data)
        };
        let data = runtime.block_on(read)?;
        staging.unmap();
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_defaults_entry_point() {
        let meta = ComputeMeta::parse(
            r#"
            shader = "blur.wgsl"

            [[buffers]]
            name = "pixels"
            binding = 0
            kind = "storage"
            "#,
        )
        .unwrap();
        assert_eq!(meta.entry_point, "main");
        assert_eq!(meta.buffers[0].kind, BufferKind::Storage);
    }

    #[test]
    fn meta_rejects_shared_bindings() {
        let err = ComputeMeta::parse(
            r#"
            shader = "blur.wgsl"
            buffers = [
                { name = "a", binding = 0, kind = "storage" },
                { name = "b", binding = 0, kind = "uniform" },
            ]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("binding 0"), "{err}");
    }

    #[test]
    fn meta_files_need_their_suffix() {
        assert!(ComputeMeta::load(None, "pass.toml").is_err());
    }

    #[test]
    fn element_ranges() {
        assert_eq!(element_range(3, 16, 16), Some(48..64));
        assert_eq!(element_range(u64::MAX, 2, 1), None);
        assert_eq!(padded(&[1, 2, 3]).len(), 4);
    }
}
