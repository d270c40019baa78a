//! Windows and their surfaces.

use std::sync::Arc;

use anyhow::Context as _;
use slotmap::new_key_type;
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    window::{Fullscreen, Window},
};

use crate::{context::GpuContext, data_structures::vertex::Color};

new_key_type! {
    /// Handle of a renderer window.
    pub struct WindowHandle;
}

/// Region of the window the renderer draws into, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The viewport clipped to a `width` x `height` target, `None` if nothing
    /// of it is left.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Viewport> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let w = self.width.min(width - x);
        let h = self.height.min(height - y);
        (w > 0 && h > 0).then_some(Viewport {
            x,
            y,
            width: w,
            height: h,
        })
    }
}

/// Position and size of a window as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub viewport: Viewport,
}

impl WindowGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            viewport: Viewport {
                x: 0,
                y: 0,
                width,
                height,
            },
        }
    }

    /// Applies a reported resize and returns the factor the camera zoom is
    /// scaled by (new height over old height).
    ///
    /// A report of height 0, as sent while minimised, keeps the previous size
    /// and returns 1. The viewport is reset to the whole window.
    pub fn resize(&mut self, width: u32, height: u32) -> f32 {
        if height == 0 || width == 0 {
            return 1.0;
        }
        let ratio = if self.height == 0 {
            1.0
        } else {
            height as f32 / self.height as f32
        };
        self.width = width;
        self.height = height;
        self.viewport = Viewport {
            x: 0,
            y: 0,
            width,
            height,
        };
        ratio
    }
}

/// A window together with the surface the renderer presents into.
pub struct WindowSurface {
    pub(crate) window: Arc<Window>,
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) config: wgpu::SurfaceConfiguration,
    pub(crate) geometry: WindowGeometry,
    pub(crate) clear_color: Color,
    is_surface_configured: bool,
}

impl WindowSurface {
    pub fn new(
        gpu: &GpuContext,
        window: Arc<Window>,
        clear_color: Color,
        present_mode: wgpu::PresentMode,
    ) -> anyhow::Result<Self> {
        let surface = gpu
            .instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;
        Self::with_surface(gpu, window, surface, clear_color, present_mode)
    }

    /// Wraps a surface already created for `window`.
    pub fn with_surface(
        gpu: &GpuContext,
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        clear_color: Color,
        present_mode: wgpu::PresentMode,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the adapter cannot present to this window")?;
        let present_mode = if surface_caps.present_modes.contains(&present_mode) {
            present_mode
        } else {
            wgpu::PresentMode::Fifo
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let mut geometry = WindowGeometry::new(size.width, size.height);
        if let Ok(position) = window.outer_position() {
            geometry.x = position.x;
            geometry.y = position.y;
        }

        let mut this = Self {
            window,
            surface,
            config,
            geometry,
            clear_color,
            is_surface_configured: false,
        };
        this.configure(&gpu.device, size.width, size.height);
        Ok(this)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    pub fn is_surface_configured(&self) -> bool {
        self.is_surface_configured
    }

    pub(crate) fn configure(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(device, &self.config);
            self.is_surface_configured = true;
        }
    }

    /// Re-reads the window geometry after winit reported a change and
    /// reconfigures the surface. Returns the camera zoom factor of the resize.
    pub(crate) fn resized(&mut self, device: &wgpu::Device, size: PhysicalSize<u32>) -> f32 {
        if let Ok(position) = self.window.outer_position() {
            self.geometry.x = position.x;
            self.geometry.y = position.y;
        }
        let ratio = self.geometry.resize(size.width, size.height);
        self.configure(device, self.geometry.width, self.geometry.height);
        ratio
    }

    pub(crate) fn moved(&mut self, position: PhysicalPosition<i32>) {
        self.geometry.x = position.x;
        self.geometry.y = position.y;
    }

    pub fn set_position(&self, x: i32, y: i32) {
        self.window.set_outer_position(PhysicalPosition::new(x, y));
    }

    /// Asks the window system for a new inner size; the actual size arrives
    /// later as a resize event.
    pub fn set_scale(&self, width: u32, height: u32) {
        if let Some(size) = self.window.request_inner_size(PhysicalSize::new(width, height)) {
            log::debug!("window resized immediately to {}x{}", size.width, size.height);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.geometry.viewport = viewport;
    }

    pub fn set_maximized(&self) {
        self.window.set_maximized(true);
    }

    /// `0` leaves fullscreen, any other value enters borderless fullscreen on
    /// the current monitor.
    pub fn set_fullscreen(&self, mode: i32) {
        let fullscreen = (mode != 0).then_some(Fullscreen::Borderless(None));
        self.window.set_fullscreen(fullscreen);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.geometry.width, self.geometry.height)
    }

    pub fn id(&self) -> winit::window::WindowId {
        self.window.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_reports_height_ratio() {
        let mut geometry = WindowGeometry::new(800, 600);
        assert_eq!(geometry.resize(1600, 1200), 2.0);
        assert_eq!((geometry.width, geometry.height), (1600, 1200));
        assert_eq!(geometry.viewport.width, 1600);
    }

    #[test]
    fn minimise_keeps_previous_size() {
        let mut geometry = WindowGeometry::new(800, 600);
        assert_eq!(geometry.resize(0, 0), 1.0);
        assert_eq!((geometry.width, geometry.height), (800, 600));
    }

    #[test]
    fn viewport_is_clipped_to_target() {
        let viewport = Viewport {
            x: 700,
            y: 10,
            width: 200,
            height: 100,
        };
        assert_eq!(
            viewport.clamped(800, 600),
            Some(Viewport {
                x: 700,
                y: 10,
                width: 100,
                height: 100
            })
        );
        assert_eq!(viewport.clamped(600, 600), None);
    }
}
