//! The renderer camera.
//!
//! World units are pixels at zoom 1. The camera looks down the negative z axis
//! at the plane `z = 0`; `position` is the world point shown in the centre of
//! the viewport. Both projection modes map that plane identically at any zoom,
//! so switching modes only changes how depth is treated.

use cgmath::{Deg, EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector2, Vector3, Vector4};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const FOVY: Deg<f32> = Deg(45.0);
const DEPTH: f32 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Orthographic,
    Perspective,
}

impl ProjectionMode {
    /// `0` is orthographic, `1` perspective.
    pub fn from_index(i: i32) -> Option<Self> {
        match i {
            0 => Some(ProjectionMode::Orthographic),
            1 => Some(ProjectionMode::Perspective),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub mode: ProjectionMode,
    pub position: Vector2<f32>,
    /// Euler angles in degrees, applied x, then y, then z.
    pub rotation: Vector3<f32>,
    zoom: f32,
    viewport: Vector2<f32>,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mode: ProjectionMode::default(),
            position: Vector2::new(0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            zoom: 1.0,
            viewport: Vector2::new(width.max(1) as f32, height.max(1) as f32),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Non-positive and non-finite zoom factors are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        } else {
            log::warn!("ignoring invalid zoom {zoom}");
        }
    }

    pub fn viewport(&self) -> Vector2<f32> {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = Vector2::new(width as f32, height as f32);
        }
    }

    fn view(&self) -> Matrix4<f32> {
        let distance = match self.mode {
            ProjectionMode::Orthographic => DEPTH / 2.0,
            ProjectionMode::Perspective => self.focal_distance(),
        };
        let eye = Point3::new(self.position.x, self.position.y, distance);
        let rotation = Matrix4::from_angle_x(Deg(self.rotation.x))
            * Matrix4::from_angle_y(Deg(self.rotation.y))
            * Matrix4::from_angle_z(Deg(self.rotation.z));
        // rotating the camera rotates the world the other way
        let inverse_rotation = rotation.invert().unwrap_or(Matrix4::identity());
        inverse_rotation * Matrix4::from_translation(-eye.to_vec())
    }

    /// Distance at which the perspective frustum shows `viewport / zoom` pixels.
    fn focal_distance(&self) -> f32 {
        let half_fov: cgmath::Rad<f32> = (FOVY / 2.0).into();
        (self.viewport.y / 2.0) / half_fov.0.tan() / self.zoom
    }

    fn projection(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Orthographic => {
                let half = self.viewport / (2.0 * self.zoom);
                cgmath::ortho(-half.x, half.x, -half.y, half.y, 0.0, DEPTH)
            }
            ProjectionMode::Perspective => {
                let far = self.focal_distance() + DEPTH / 2.0;
                cgmath::perspective(FOVY, self.viewport.x / self.viewport.y, 1.0, far)
            }
        }
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection() * self.view()
    }

    /// World point on `z = 0` to window pixels (origin top left, y down).
    pub fn to_screen_space(&self, world: Vector2<f32>) -> Vector2<f32> {
        let clip = self.view_proj() * Vector4::new(world.x, world.y, 0.0, 1.0);
        let ndc = Vector2::new(clip.x / clip.w, clip.y / clip.w);
        Vector2::new(
            (ndc.x + 1.0) / 2.0 * self.viewport.x,
            (1.0 - ndc.y) / 2.0 * self.viewport.y,
        )
    }

    /// Window pixels to the world point on `z = 0` under them.
    ///
    /// `None` when the view ray runs parallel to that plane.
    pub fn to_world_space(&self, screen: Vector2<f32>) -> Option<Vector2<f32>> {
        let inverse = self.view_proj().invert()?;
        let ndc = Vector2::new(
            screen.x / self.viewport.x * 2.0 - 1.0,
            1.0 - screen.y / self.viewport.y * 2.0,
        );
        let unproject = |depth: f32| {
            let p = inverse * Vector4::new(ndc.x, ndc.y, depth, 1.0);
            Vector3::new(p.x / p.w, p.y / p.w, p.z / p.w)
        };
        let near = unproject(0.0);
        let far = unproject(0.99);
        let dir = far - near;
        if dir.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -near.z / dir.z;
        let hit = near + dir * t;
        Some(Vector2::new(hit.x, hit.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector2<f32>, b: Vector2<f32>) -> bool {
        (a.x - b.x).abs() < 0.1 && (a.y - b.y).abs() < 0.1
    }

    #[test]
    fn camera_position_is_viewport_centre() {
        let mut camera = Camera::new(800, 600);
        camera.position = Vector2::new(100.0, -40.0);
        for mode in [ProjectionMode::Orthographic, ProjectionMode::Perspective] {
            camera.mode = mode;
            let centre = camera.to_screen_space(camera.position);
            assert!(close(centre, Vector2::new(400.0, 300.0)), "{mode:?}: {centre:?}");
        }
    }

    #[test]
    fn zoom_scales_world_distances() {
        let mut camera = Camera::new(800, 600);
        let right = camera.to_screen_space(Vector2::new(100.0, 0.0));
        assert!(close(right, Vector2::new(500.0, 300.0)), "{right:?}");

        camera.set_zoom(2.0);
        let right = camera.to_screen_space(Vector2::new(100.0, 0.0));
        assert!(close(right, Vector2::new(600.0, 300.0)), "{right:?}");

        camera.set_zoom(0.0);
        assert_eq!(camera.zoom(), 2.0);
    }

    #[test]
    fn screen_and_world_space_invert_each_other() {
        let mut camera = Camera::new(640, 480);
        camera.position = Vector2::new(12.0, 7.0);
        camera.set_zoom(1.5);
        for mode in [ProjectionMode::Orthographic, ProjectionMode::Perspective] {
            camera.mode = mode;
            let screen = Vector2::new(50.0, 420.0);
            let world = camera.to_world_space(screen).unwrap();
            assert!(close(camera.to_screen_space(world), screen), "{mode:?}");
        }
    }
}
