//! The renderer facade.
//!
//! [`Renderer`] owns everything: the event loop, the GPU context, all windows,
//! the texture and mesh registries, the camera and the input state. A typical
//! frame looks like
//!
//! ```no_run
//! # use orb_ngin::{Renderer, RendererConfig, Vector2};
//! let mut renderer = Renderer::new(RendererConfig::default())?;
//! while renderer.is_running() {
//!     renderer.draw_rect(Vector2::new(0.0, 0.0), Vector2::new(64.0, 64.0), 0);
//!     renderer.update();
//!     for event in renderer.drain_events() {
//!         println!("{event:?}");
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Draw calls are only recorded. [`Renderer::update`] encodes and submits them,
//! once per window, presents, ages the textures and then polls the window
//! system for new events. Failures of single assets are logged and reported as
//! `None`/`false`; they never stop the frame.

use std::{collections::HashMap, panic::AssertUnwindSafe, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use cgmath::{Deg, Matrix4, SquareMatrix, Vector2, Vector3};
use instant::{Duration, Instant};
use slotmap::SlotMap;
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::KeyCode,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

use crate::{
    camera::{Camera, ProjectionMode},
    compute::{ComputeHandle, ComputePass},
    config::RendererConfig,
    context::GpuContext,
    data_structures::vertex::{Color, DrawMode, FillMode, Vertex},
    driver::{GpuHandle, WgpuTextures},
    error::ErrorState,
    input::{self, ButtonState, Event, EventQueue, InputState},
    logging,
    pipelines::mesh::{DrawUniform, MeshPipelines},
    registry::{
        mesh::{MeshHandle, MeshRegistry},
        texture::{TextureHandle, TextureRegistry},
    },
    render::{self, DrawCommand, DrawList, FrameResources, FrameTarget},
    resources::texture::FileDecoder,
    window::{Viewport, WindowHandle, WindowSurface},
};

/// Pen state applied to the next draw calls.
#[derive(Debug, Clone, Copy)]
struct DrawState {
    color: Color,
    fill: FillMode,
    uv: Matrix4<f32>,
    texture: Option<TextureHandle>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            fill: FillMode::Fill,
            uv: Matrix4::identity(),
            texture: None,
        }
    }
}

/// Unit quad centred on the origin, wound counter clockwise, uv origin top left.
fn unit_quad() -> Vec<Vertex> {
    vec![
        Vertex::new(-0.5, -0.5, 0.0).with_uv(0.0, 1.0),
        Vertex::new(0.5, -0.5, 0.0).with_uv(1.0, 1.0),
        Vertex::new(0.5, 0.5, 0.0).with_uv(1.0, 0.0),
        Vertex::new(-0.5, 0.5, 0.0).with_uv(0.0, 0.0),
    ]
}

fn rect_model(position: Vector2<f32>, size: Vector2<f32>, rotation: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(position.x, position.y, 0.0))
        * Matrix4::from_angle_z(Deg(rotation))
        * Matrix4::from_nonuniform_scale(size.x, size.y, 1.0)
}

fn mesh_model(position: Vector3<f32>, scale: Vector3<f32>, rotation: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(position)
        * Matrix4::from_angle_x(Deg(rotation.x))
        * Matrix4::from_angle_y(Deg(rotation.y))
        * Matrix4::from_angle_z(Deg(rotation.z))
        * Matrix4::from_nonuniform_scale(scale.x, scale.y, scale.z)
}

/// Texture transform showing the `width` x `height` region at `(u, v)`.
pub fn uv_rect(u: f32, v: f32, width: f32, height: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(u, v, 0.0))
        * Matrix4::from_nonuniform_scale(width, height, 1.0)
}

/// `mode` if the device can rasterise it, plain fill otherwise.
fn supported_fill(mode: FillMode, features: wgpu::Features) -> FillMode {
    match mode.required_feature() {
        Some(feature) if !features.contains(feature) => FillMode::Fill,
        _ => mode,
    }
}

pub struct Renderer {
    event_loop: Option<EventLoop<()>>,
    async_runtime: Runtime,
    gpu: GpuContext,
    present_mode: wgpu::PresentMode,
    clear_color: Color,
    asset_root: Option<PathBuf>,

    windows: SlotMap<WindowHandle, WindowSurface>,
    window_order: Vec<WindowHandle>,
    by_id: HashMap<WindowId, WindowHandle>,
    default_window: WindowHandle,
    active_window: WindowHandle,

    textures: TextureRegistry<WgpuTextures>,
    meshes: MeshRegistry,
    compute: SlotMap<ComputeHandle, ComputePass>,
    pipelines: MeshPipelines,
    frame: FrameResources,
    draws: DrawList,
    draw: DrawState,

    camera: Camera,
    input: InputState,
    events: EventQueue,

    last_frame: Instant,
    frame_time: Duration,
    running: bool,
    shut_down: bool,
    error_state: ErrorState,
}

impl Renderer {
    /// Opens the default window described by `config` and sets up the GPU.
    pub fn new(config: RendererConfig) -> anyhow::Result<Self> {
        logging::init_logging(&config.logging);

        #[cfg(all(feature = "integration-tests", target_os = "linux"))]
        let event_loop: EventLoop<()> = {
            use winit::platform::wayland::EventLoopBuilderExtWayland;

            EventLoop::builder().with_any_thread(true).build()?
        };

        #[cfg(all(feature = "integration-tests", target_os = "windows"))]
        let event_loop: EventLoop<()> = {
            use winit::platform::windows::EventLoopBuilderExtWindows;

            EventLoop::builder().with_any_thread(true).build()?
        };

        #[cfg(not(feature = "integration-tests"))]
        let event_loop: EventLoop<()> = EventLoop::new()?;

        let window = Arc::new(open_window(
            &event_loop,
            &config.window.title,
            config.window.width,
            config.window.height,
        )?);

        let async_runtime = Runtime::new().context("could not start the async runtime")?;
        let (gpu, surface) = async_runtime.block_on(GpuContext::new(window.clone()))?;

        let clear_color = config.window.clear_color();
        let present_mode = config.window.present_mode();
        let surface =
            WindowSurface::with_surface(&gpu, window.clone(), surface, clear_color, present_mode)?;
        let (width, height) = surface.size();

        let mut windows = SlotMap::with_key();
        let default_window = windows.insert(surface);
        let mut by_id = HashMap::new();
        by_id.insert(window.id(), default_window);

        let asset_root = config.assets.root.clone();
        let driver = WgpuTextures::new(gpu.device.clone(), gpu.queue.clone(), gpu.errors.clone());
        let pipelines = MeshPipelines::new(&gpu.device, driver.layout());
        let frame = FrameResources::new(&gpu.device, &pipelines);
        let textures = TextureRegistry::with_policy(
            driver,
            Box::new(FileDecoder::new(asset_root.clone())),
            config.eviction_policy(),
        );

        log::info!("renderer ready, default window {width}x{height}");
        Ok(Self {
            event_loop: Some(event_loop),
            async_runtime,
            gpu,
            present_mode,
            clear_color,
            asset_root,
            windows,
            window_order: vec![default_window],
            by_id,
            default_window,
            active_window: default_window,
            textures,
            meshes: MeshRegistry::new(),
            compute: SlotMap::with_key(),
            pipelines,
            frame,
            draws: DrawList::new(),
            draw: DrawState::default(),
            camera: Camera::new(width, height),
            input: InputState::new(),
            events: EventQueue::new(),
            last_frame: Instant::now(),
            frame_time: Duration::ZERO,
            running: true,
            shut_down: false,
            error_state: ErrorState::NoError,
        })
    }

    /// Ends the frame: submits and presents what was drawn, ages the textures
    /// and collects new window events.
    pub fn update(&mut self) {
        if !self.running {
            return;
        }
        let now = Instant::now();
        self.frame_time = now - self.last_frame;
        self.last_frame = now;

        for handle in self.window_order.clone() {
            let Some(surface) = self.windows.get_mut(handle) else {
                continue;
            };
            if !surface.is_surface_configured() {
                continue;
            }
            let output = match surface.surface.get_current_texture() {
                wgpu::CurrentSurfaceTexture::Success(output)
                | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
                // Reconfigure the surface if it's lost or outdated
                wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                    let size = surface.window.inner_size();
                    surface.configure(&self.gpu.device, size.width, size.height);
                    continue;
                }
                e => {
                    log::error!("Unable to render {:?}", e);
                    continue;
                }
            };
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let commands = self.draws.for_window(handle);
            render::submit_window(
                &self.gpu.device,
                &self.gpu.queue,
                &mut self.pipelines,
                &mut self.frame,
                self.textures.driver(),
                FrameTarget {
                    surface: &*surface,
                    view: &view,
                },
                &commands,
            );
            surface.window.pre_present_notify();
            output.present();
        }
        self.draws.clear();
        self.textures.decay();

        self.pump_events();
    }

    fn pump_events(&mut self) {
        let Some(mut event_loop) = self.event_loop.take() else {
            return;
        };
        let status = event_loop.pump_app_events(Some(Duration::ZERO), self);
        self.event_loop = Some(event_loop);
        if let PumpStatus::Exit(code) = status {
            log::info!("event loop exited with {code}");
            self.stop();
        }
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.events.push(Event::Quit);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn error_state(&self) -> ErrorState {
        self.error_state
    }

    /// Time between the last two calls of [`update`](Self::update).
    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }

    /// Releases every window, mesh, compute pass and texture.
    ///
    /// A failure while tearing down is logged and kept in
    /// [`error_state`](Self::error_state). Calling this twice is harmless.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.running = false;

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.draws.clear();
            self.meshes.clear();
            self.compute.clear();
            self.textures.evict_all();
            self.by_id.clear();
            self.window_order.clear();
            self.windows.clear();
        }));
        if result.is_err() {
            log::error!("Shutdown Failure");
            self.error_state = ErrorState::ShutdownFailed;
        }
    }

    // --- windows ---

    pub fn create_window(&mut self, title: &str) -> Option<WindowHandle> {
        let result = (|| {
            let event_loop = self
                .event_loop
                .as_ref()
                .context("windows cannot be created while events are processed")?;
            let size = self.windows.get(self.default_window).map(|w| w.size());
            let (width, height) = size.unwrap_or((800, 600));
            let window = Arc::new(open_window(event_loop, title, width, height)?);
            WindowSurface::new(&self.gpu, window, self.clear_color, self.present_mode)
        })();

        match result {
            Ok(surface) => {
                let id = surface.id();
                let handle = self.windows.insert(surface);
                self.by_id.insert(id, handle);
                self.window_order.push(handle);
                Some(handle)
            }
            Err(e) => {
                log::error!("could not create window {title:?}: {e:#}");
                None
            }
        }
    }

    /// Window `index` in creation order, the default window being `0`.
    pub fn window(&self, index: usize) -> Option<WindowHandle> {
        self.window_order.get(index).copied()
    }

    pub fn default_window(&self) -> WindowHandle {
        self.default_window
    }

    /// Directs the following draw calls to `window`.
    pub fn set_active_window(&mut self, window: WindowHandle) -> bool {
        let Some(surface) = self.windows.get(window) else {
            log::error!("set_active_window: unknown window {window:?}");
            return false;
        };
        let (width, height) = surface.size();
        self.active_window = window;
        self.camera.set_viewport(width, height);
        true
    }

    pub fn active_window(&self) -> Option<WindowHandle> {
        self.windows
            .contains_key(self.active_window)
            .then_some(self.active_window)
    }

    fn window_mut(&mut self, window: WindowHandle) -> Option<&mut WindowSurface> {
        let surface = self.windows.get_mut(window);
        if surface.is_none() {
            log::error!("unknown window {window:?}");
        }
        surface
    }

    pub fn set_window_clear_color(&mut self, window: WindowHandle, color: impl Into<Color>) -> bool {
        let color = color.into();
        self.window_mut(window)
            .map(|surface| surface.clear_color = color)
            .is_some()
    }

    pub fn set_window_position(&mut self, window: WindowHandle, x: i32, y: i32) -> bool {
        self.window_mut(window)
            .map(|surface| surface.set_position(x, y))
            .is_some()
    }

    /// Requests a new inner size; the change shows up as a
    /// [`Event::Window`] once the window system applied it.
    pub fn set_window_scale(&mut self, window: WindowHandle, width: u32, height: u32) -> bool {
        self.window_mut(window)
            .map(|surface| surface.set_scale(width, height))
            .is_some()
    }

    pub fn set_window_viewport(&mut self, window: WindowHandle, viewport: Viewport) -> bool {
        self.window_mut(window)
            .map(|surface| surface.set_viewport(viewport))
            .is_some()
    }

    pub fn set_window_maximized(&mut self, window: WindowHandle) -> bool {
        self.window_mut(window)
            .map(|surface| surface.set_maximized())
            .is_some()
    }

    /// `0` returns to windowed mode, anything else is borderless fullscreen.
    pub fn set_window_fullscreen(&mut self, window: WindowHandle, mode: i32) -> bool {
        self.window_mut(window)
            .map(|surface| surface.set_fullscreen(mode))
            .is_some()
    }

    pub fn window_size(&self, window: WindowHandle) -> Option<(u32, u32)> {
        self.windows.get(window).map(|w| w.size())
    }

    fn close_window(&mut self, window: WindowHandle) {
        let Some(surface) = self.windows.remove(window) else {
            return;
        };
        self.by_id.remove(&surface.id());
        self.window_order.retain(|w| *w != window);
        drop(surface);
        self.events.push(Event::WindowClosed(window));
        log::info!("window {window:?} closed");

        if window == self.default_window || self.windows.is_empty() {
            self.stop();
        } else if window == self.active_window {
            self.set_active_window(self.default_window);
        }
    }

    fn window_resized(&mut self, window: WindowHandle, size: PhysicalSize<u32>) {
        let Some(surface) = self.windows.get_mut(window) else {
            return;
        };
        let ratio = surface.resized(&self.gpu.device, size);
        let geometry = *surface.geometry();
        let focused = surface_focus(surface);
        if window == self.active_window {
            self.camera.set_zoom(self.camera.zoom() * ratio);
            self.camera.set_viewport(geometry.width, geometry.height);
        }
        self.push_geometry(window, focused);
    }

    fn push_geometry(&mut self, window: WindowHandle, focused: bool) {
        if let Some(surface) = self.windows.get(window) {
            let g = surface.geometry();
            self.events.push(Event::Window {
                window,
                x: g.x,
                y: g.y,
                width: g.width,
                height: g.height,
                focused,
            });
        }
    }

    // --- input ---

    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// All events gathered so far, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain()
    }

    pub fn key_state(&self, key: KeyCode) -> ButtonState {
        self.input.key_state(key)
    }

    pub fn mouse_button_state(&self, button: MouseButton) -> ButtonState {
        self.input.mouse_button_state(button)
    }

    // --- camera ---

    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        self.camera.mode = mode;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.camera.set_zoom(zoom);
    }

    pub fn zoom(&self) -> f32 {
        self.camera.zoom()
    }

    pub fn camera_position(&self) -> Vector2<f32> {
        self.camera.position
    }

    pub fn set_camera_position(&mut self, position: Vector2<f32>) {
        self.camera.position = position;
    }

    /// Euler angles in degrees.
    pub fn set_camera_rotation(&mut self, rotation: Vector3<f32>) {
        self.camera.rotation = rotation;
    }

    pub fn to_screen_space(&self, world: Vector2<f32>) -> Vector2<f32> {
        self.camera.to_screen_space(world)
    }

    pub fn to_world_space(&self, screen: Vector2<f32>) -> Option<Vector2<f32>> {
        self.camera.to_world_space(screen)
    }

    // --- drawing ---

    pub fn set_draw_color(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.draw.color = Color::from_rgba8(r, g, b, a);
    }

    /// Point and line fill need optional device features; without them the
    /// renderer keeps filling polygons.
    pub fn set_fill_mode(&mut self, mode: FillMode) {
        let fill = supported_fill(mode, self.gpu.device.features());
        if fill != mode {
            log::warn!("{mode:?} fill is not supported by this device, using Fill");
        }
        self.draw.fill = fill;
    }

    /// Texture coordinate transform for the next rect or mesh.
    pub fn set_uv(&mut self, uv: Matrix4<f32>) {
        self.draw.uv = uv;
    }

    pub fn set_uv_rect(&mut self, u: f32, v: f32, width: f32, height: f32) {
        self.draw.uv = uv_rect(u, v, width, height);
    }

    fn record(
        &mut self,
        mode: DrawMode,
        fill: FillMode,
        vertices: Vec<Vertex>,
        model: Matrix4<f32>,
        color: Color,
        texture: Option<GpuHandle>,
        layer: i32,
    ) {
        let Some(window) = self.active_window() else {
            log::warn!("no window to draw into");
            return;
        };
        let uniform = DrawUniform::new(model, self.camera.view_proj(), self.draw.uv, color.into());
        self.draws.push(DrawCommand {
            window,
            layer,
            mode,
            fill,
            vertices,
            uniform,
            texture,
        });
    }

    /// Axis aligned rect of `size` centred on `position`, filled with the
    /// active texture and draw colour.
    pub fn draw_rect(&mut self, position: Vector2<f32>, size: Vector2<f32>, layer: i32) {
        self.draw_rect_advanced(position, size, 0.0, layer);
    }

    /// Like [`draw_rect`](Self::draw_rect), rotated by `rotation` degrees
    /// around its centre.
    pub fn draw_rect_advanced(
        &mut self,
        position: Vector2<f32>,
        size: Vector2<f32>,
        rotation: f32,
        layer: i32,
    ) {
        let texture = self.draw.texture.and_then(|t| self.textures.touch(t));
        self.record(
            DrawMode::TriangleFan,
            self.draw.fill,
            unit_quad(),
            rect_model(position, size, rotation),
            self.draw.color,
            texture,
            layer,
        );
        self.draw.uv = Matrix4::identity();
    }

    /// A line in world space, 2D or 3D, in the draw colour.
    pub fn draw_line(&mut self, start: impl Into<Vertex>, end: impl Into<Vertex>, layer: i32) {
        self.record(
            DrawMode::Lines,
            FillMode::Fill,
            vec![start.into(), end.into()],
            Matrix4::identity(),
            self.draw.color,
            None,
            layer,
        );
    }

    // --- textures ---

    pub fn load_texture(&mut self, path: &str) -> Option<TextureHandle> {
        self.textures
            .load_by_path(path)
            .map_err(|e| log::error!("{e}"))
            .ok()
    }

    /// Loads a texture that is never evicted by decay.
    pub fn load_texture_pinned(&mut self, path: &str) -> Option<TextureHandle> {
        self.textures
            .load_pinned(path)
            .map_err(|e| log::error!("{e}"))
            .ok()
    }

    pub fn create_texture_from_memory(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        channel_depth: u32,
        pixels: &[u8],
    ) -> Option<TextureHandle> {
        self.textures
            .create_from_memory(name, width, height, channel_depth, pixels)
            .map_err(|e| log::error!("{e}"))
            .ok()
    }

    /// Texture of the following rects; `None` draws them untextured.
    pub fn set_active_texture(&mut self, texture: Option<TextureHandle>) {
        self.draw.texture = texture;
    }

    pub fn delete_texture(&mut self, texture: TextureHandle) -> bool {
        if self.draw.texture == Some(texture) {
            self.draw.texture = None;
        }
        self.textures.evict(texture)
    }

    pub fn loaded_textures(&self) -> Vec<TextureHandle> {
        self.textures.list()
    }

    pub fn texture_dimensions(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.dimensions(texture)
    }

    pub fn textures(&self) -> &TextureRegistry<WgpuTextures> {
        &self.textures
    }

    // --- meshes ---

    pub fn begin_mesh(&mut self) {
        self.meshes.begin_mesh(false);
    }

    pub fn begin_textured_mesh(&mut self) {
        self.meshes.begin_mesh(true);
    }

    pub fn mesh_set_draw_mode(&mut self, mode: DrawMode) {
        self.meshes.set_draw_mode(mode);
    }

    /// Accepts 2D or 3D positions, optionally paired with an RGB or RGBA
    /// colour and a uv coordinate.
    pub fn mesh_add_vertex(&mut self, vertex: impl Into<Vertex>) {
        self.meshes.add_vertex(vertex.into());
    }

    pub fn mesh_set_color(&mut self, color: impl Into<Color>) {
        self.meshes.set_color(color.into());
    }

    pub fn mesh_set_texture(&mut self, texture: TextureHandle) -> bool {
        self.meshes.set_texture(texture)
    }

    /// Loads `path` and assigns it, if the mesh under construction is textured.
    pub fn mesh_set_texture_path(&mut self, path: &str) -> bool {
        if !self.meshes.active().is_some_and(|m| m.is_textured()) {
            return false;
        }
        match self.load_texture(path) {
            Some(texture) => self.meshes.set_texture(texture),
            None => false,
        }
    }

    pub fn end_mesh(&mut self) -> Option<MeshHandle> {
        self.meshes.end_mesh()
    }

    pub fn load_mesh(&mut self, path: &str) -> Option<MeshHandle> {
        self.load_mesh_file(path, false)
    }

    pub fn load_textured_mesh(&mut self, path: &str) -> Option<MeshHandle> {
        self.load_mesh_file(path, true)
    }

    fn load_mesh_file(&mut self, path: &str, textured: bool) -> Option<MeshHandle> {
        self.meshes
            .load_from_file(self.asset_root.as_deref(), path, textured, &mut self.textures)
            .map_err(|e| log::error!("could not load mesh {path}: {e:#}"))
            .ok()
    }

    /// Draws a mesh translated to `position`, scaled and rotated (degrees,
    /// x then y then z) around its origin.
    pub fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: Vector3<f32>,
        layer: i32,
    ) -> bool {
        self.draw_mesh_with_matrix(mesh, mesh_model(position, scale, rotation), layer)
    }

    pub fn draw_mesh_with_matrix(&mut self, mesh: MeshHandle, model: Matrix4<f32>, layer: i32) -> bool {
        let Some(m) = self.meshes.get(mesh) else {
            log::error!("draw_mesh: unknown mesh {mesh:?}");
            return false;
        };
        let (mode, color, vertices, texture) =
            (m.draw_mode(), m.color(), m.vertices().to_vec(), m.texture());
        let texture = texture.and_then(|t| self.textures.touch(t));
        self.record(mode, self.draw.fill, vertices, model, color, texture, layer);
        self.draw.uv = Matrix4::identity();
        true
    }

    pub fn destroy_mesh(&mut self, mesh: MeshHandle) -> bool {
        self.meshes.remove(mesh).is_some()
    }

    pub fn meshes(&self) -> &MeshRegistry {
        &self.meshes
    }

    // --- compute ---

    /// Loads a `.rpass.meta` compute pass description and its shader.
    pub fn load_compute_pass(&mut self, path: &str) -> Option<ComputeHandle> {
        match ComputePass::load(
            &self.gpu.device,
            &self.gpu.errors,
            self.asset_root.as_deref(),
            path,
        ) {
            Ok(pass) => Some(self.compute.insert(pass)),
            Err(e) => {
                log::error!("could not load compute pass {path}: {e:#}");
                None
            }
        }
    }

    pub fn write_buffer(&mut self, pass: ComputeHandle, name: &str, bytes: &[u8]) -> bool {
        let Some(p) = self.compute.get_mut(pass) else {
            log::error!("unknown compute pass {pass:?}");
            return false;
        };
        report(p.write_buffer(&self.gpu.device, &self.gpu.queue, name, bytes))
    }

    pub fn write_sub_buffer(
        &mut self,
        pass: ComputeHandle,
        name: &str,
        index: usize,
        struct_size: usize,
        bytes: &[u8],
    ) -> bool {
        let Some(p) = self.compute.get_mut(pass) else {
            log::error!("unknown compute pass {pass:?}");
            return false;
        };
        report(p.write_sub_buffer(&self.gpu.queue, name, index, struct_size, bytes))
    }

    pub fn write_uniform(&mut self, pass: ComputeHandle, name: &str, bytes: &[u8]) -> bool {
        let Some(p) = self.compute.get_mut(pass) else {
            log::error!("unknown compute pass {pass:?}");
            return false;
        };
        report(p.write_uniform(&self.gpu.device, &self.gpu.queue, name, bytes))
    }

    pub fn dispatch_compute(&mut self, pass: ComputeHandle, x: u32, y: u32, z: u32) -> bool {
        let Some(p) = self.compute.get_mut(pass) else {
            log::error!("unknown compute pass {pass:?}");
            return false;
        };
        report(p.dispatch(&self.gpu.device, &self.gpu.queue, x, y, z))
    }

    /// Blocks until the GPU finished and returns the contents of a storage buffer.
    pub fn read_buffer(&mut self, pass: ComputeHandle, name: &str) -> Option<Vec<u8>> {
        let Some(p) = self.compute.get_mut(pass) else {
            log::error!("unknown compute pass {pass:?}");
            return None;
        };
        p.read_buffer(&self.gpu.device, &self.gpu.queue, &self.async_runtime, name)
            .map_err(|e| log::error!("{} read {name}: {e:#}", p.name()))
            .ok()
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }
}

fn report(result: anyhow::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("{e:#}");
            false
        }
    }
}

fn surface_focus(surface: &WindowSurface) -> bool {
    surface.window.has_focus()
}

fn open_window(
    event_loop: &EventLoop<()>,
    title: &str,
    width: u32,
    height: u32,
) -> anyhow::Result<Window> {
    let attributes = Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height));
    #[allow(deprecated)]
    let window = event_loop
        .create_window(attributes)
        .with_context(|| format!("could not open window {title:?}"))?;
    Ok(window)
}

impl ApplicationHandler for Renderer {
    // windows are opened eagerly in `new` and `create_window`
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(handle) = self.by_id.get(&window_id).copied() else {
            return;
        };

        if let Some(input_event) = input::translate_window_event(&mut self.input, handle, &event) {
            self.events.push(input_event);
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.close_window(handle),
            WindowEvent::Resized(size) => self.window_resized(handle, size),
            WindowEvent::Moved(position) => {
                let focused = match self.windows.get_mut(handle) {
                    Some(surface) => {
                        surface.moved(position);
                        surface_focus(surface)
                    }
                    None => return,
                };
                self.push_geometry(handle, focused);
            }
            WindowEvent::Focused(focused) => self.push_geometry(handle, focused),
            _ => {}
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector4};

    use super::*;

    fn assert_close(actual: Vector4<f32>, expected: Vector4<f32>) {
        assert!(
            (actual - expected).magnitude() < 1e-5,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn rect_model_places_corners() {
        let model = rect_model(Vector2::new(10.0, 20.0), Vector2::new(4.0, 2.0), 0.0);
        let corner = model * Vector4::new(0.5, 0.5, 0.0, 1.0);
        assert_close(corner, Vector4::new(12.0, 21.0, 0.0, 1.0));
    }

    #[test]
    fn rect_rotation_is_in_degrees() {
        let model = rect_model(Vector2::new(0.0, 0.0), Vector2::new(2.0, 2.0), 90.0);
        let corner = model * Vector4::new(0.5, 0.0, 0.0, 1.0);
        assert_close(corner, Vector4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn uv_rect_maps_unit_square() {
        let uv = uv_rect(0.5, 0.25, 0.5, 0.25);
        assert_close(uv * Vector4::new(1.0, 1.0, 0.0, 1.0), Vector4::new(1.0, 0.5, 0.0, 1.0));
        assert_close(uv * Vector4::new(0.0, 0.0, 0.0, 1.0), Vector4::new(0.5, 0.25, 0.0, 1.0));
    }

    #[test]
    fn quad_is_a_fan_around_the_origin() {
        let quad = unit_quad();
        assert_eq!(quad.len(), 4);
        let (_, triangles) = DrawMode::TriangleFan.expand(&quad);
        assert_eq!(triangles.len(), 6);
        assert_eq!(quad[3].tex_coords, [0.0, 0.0]);
    }

    #[test]
    fn fill_modes_fall_back_without_features() {
        assert_eq!(
            supported_fill(FillMode::Line, wgpu::Features::empty()),
            FillMode::Fill
        );
        assert_eq!(
            supported_fill(FillMode::Line, wgpu::Features::POLYGON_MODE_LINE),
            FillMode::Line
        );
        assert_eq!(
            supported_fill(FillMode::Point, wgpu::Features::POLYGON_MODE_LINE),
            FillMode::Fill
        );
    }

    #[test]
    fn mesh_model_scales_before_translating() {
        let model = mesh_model(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::new(0.0, 0.0, 0.0),
        );
        assert_close(model * Vector4::new(1.0, 1.0, 1.0, 1.0), Vector4::new(3.0, 4.0, 5.0, 1.0));
    }
}
