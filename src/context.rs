use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;
use winit::window::Window;

use crate::error::RenderError;

/// Collects wgpu errors the device reports outside of any call that checks
/// them.
///
/// Every error is logged. While [`GpuErrors::capture`] runs a closure the
/// errors raised by it are kept and returned, otherwise they are dropped after
/// logging and the process keeps going.
#[derive(Clone, Debug, Default)]
pub struct GpuErrors {
    captured: Arc<Mutex<Option<Vec<wgpu::Error>>>>,
}

impl GpuErrors {
    /// Routes the uncaptured errors of `device` into a new collector.
    pub fn install(device: &wgpu::Device) -> Self {
        let errors = Self::default();
        let sink = errors.clone();
        device.on_uncaptured_error(Arc::new(move |e| sink.report(e)));
        errors
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<wgpu::Error>>> {
        // a poisoned lock only means a panic elsewhere, the list is still usable
        self.captured.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn report(&self, error: wgpu::Error) {
        log::error!("wgpu error: {error}");
        if let Some(captured) = self.lock().as_mut() {
            captured.push(error);
        }
    }

    /// Runs `f` and fails with the first device error it raised.
    ///
    /// Running out of memory becomes [`RenderError::ResourceExhausted`], every
    /// other error [`RenderError::InvalidArgument`].
    pub fn capture<T>(&self, what: &str, f: impl FnOnce() -> T) -> Result<T, RenderError> {
        *self.lock() = Some(Vec::new());
        let value = f();
        let captured = self.lock().take().unwrap_or_default();
        match captured.into_iter().next() {
            None => Ok(value),
            Some(wgpu::Error::OutOfMemory { .. }) => Err(RenderError::ResourceExhausted(
                format!("{what}: out of GPU memory"),
            )),
            Some(e) => Err(RenderError::InvalidArgument(format!("{what}: {e}"))),
        }
    }
}

/// Device level GPU state shared by every window.
#[derive(Debug)]
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub errors: GpuErrors,
}

impl GpuContext {
    /// Picks an adapter able to present to `window` and opens a device on it.
    ///
    /// Returns the surface created for the adapter query so the first window
    /// does not need a second one.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<(Self, wgpu::Surface<'static>)> {
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window)
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter can present to the window")?;
        log::info!("using adapter {}", adapter.get_info().name);

        // point and wireframe fill modes are optional
        let wanted = wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::POLYGON_MODE_POINT;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orb device"),
                required_features: adapter.features() & wanted,
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .context("could not open the graphics device")?;
        let errors = GpuErrors::install(&device);

        Ok((
            Self {
                instance,
                adapter,
                device,
                queue,
                errors,
            },
            surface,
        ))
    }

    pub fn supports(&self, feature: wgpu::Features) -> bool {
        self.device.features().contains(feature)
    }
}
