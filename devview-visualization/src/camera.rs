//! Camera state and the model/view/projection pipeline

use devview_core::Transform3D;
use nalgebra::{Matrix3, Matrix4, Perspective3, Point3, Rotation3, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Smallest allowed zoom
pub const MIN_ZOOM: f32 = 0.01;
/// Largest allowed zoom
pub const MAX_ZOOM: f32 = 100.0;

/// Radius of the virtual trackball sphere
const TRACKBALL_SIZE: f32 = 0.8;
/// Trackball speed multiplier
const TRACKBALL_SPEED: f32 = 2.0;

/// Projection used for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionType {
    Orthographic,
    #[default]
    Frustum,
}

/// A camera orbiting the mesh
///
/// Rotation, translation and zoom act on the model; `eye`, `center` and `up`
/// only feed the view matrix.
#[derive(Debug, Clone)]
pub struct Camera {
    pub rotation: UnitQuaternion<f32>,
    pub translation: Vector3<f32>,
    zoom: f32,
    pub eye: Point3<f32>,
    pub center: Point3<f32>,
    pub up: Vector3<f32>,
    /// Half of the vertical field of view, in radians
    pub half_angle: f32,
    pub near: f32,
    pub far: f32,
    pub projection: ProjectionType,
    width: u32,
    height: u32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            rotation: UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -0.1 * std::f32::consts::PI),
            translation: Vector3::zeros(),
            zoom: 1.0,
            eye: Point3::new(0.0, 0.0, 5.0),
            center: Point3::origin(),
            up: Vector3::y(),
            half_angle: std::f32::consts::FRAC_PI_8,
            near: 1.0,
            far: 100.0,
            projection: ProjectionType::default(),
            width: 1,
            height: 1,
        }
    }
}

impl Camera {
    /// Create a camera for a viewport of the given size
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self::default();
        camera.set_viewport(width, height);
        camera
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Apply one scroll step; `fine` divides the step by ten
    pub fn scroll_zoom(&mut self, dy: f32, fine: bool) {
        let factor = if fine { 0.001 } else { 0.01 };
        self.set_zoom(self.zoom * (1.0 + dy * factor));
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Projection matrix in OpenGL clip conventions
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let ratio = self.aspect_ratio();
        match self.projection {
            ProjectionType::Orthographic => {
                let h = self.half_angle.tan() * (self.eye - self.center).norm();
                let w = h * ratio;
                Matrix4::new_orthographic(-w, w, -h, h, self.near, self.far)
            }
            ProjectionType::Frustum => {
                Perspective3::new(ratio, 2.0 * self.half_angle, self.near, self.far).into_inner()
            }
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye, &self.center, &self.up)
    }

    /// `Scale(zoom) · Rotate · initial_shift · Translate(translation)`
    pub fn model_matrix(&self, initial_shift: &Transform3D) -> Matrix4<f32> {
        Matrix4::new_scaling(self.zoom)
            * self.rotation.to_homogeneous()
            * initial_shift.matrix
            * Matrix4::new_translation(&self.translation)
    }

    /// Map a model-space point to window coordinates
    ///
    /// Origin is the bottom-left corner; depth is in `[0, 1]`.
    pub fn project(&self, point: &Point3<f32>, model: &Matrix4<f32>) -> Vector3<f32> {
        let clip = self.projection_matrix() * self.view_matrix() * model * point.to_homogeneous();
        let ndc = clip.xyz() / clip.w;
        let unit = ndc * 0.5 + Vector3::repeat(0.5);
        Vector3::new(unit.x * self.width as f32, unit.y * self.height as f32, unit.z)
    }

    /// Inverse of [`Camera::project`]; `None` when the transform is singular
    pub fn unproject(&self, window: &Vector3<f32>, model: &Matrix4<f32>) -> Option<Point3<f32>> {
        let inverse = (self.projection_matrix() * self.view_matrix() * model).try_inverse()?;
        let ndc = Vector4::new(
            window.x / self.width as f32 * 2.0 - 1.0,
            window.y / self.height as f32 * 2.0 - 1.0,
            window.z * 2.0 - 1.0,
            1.0,
        );
        let p = inverse * ndc;
        if p.w.abs() <= f32::EPSILON {
            return None;
        }
        Some(Point3::from(p.xyz() / p.w))
    }

    /// Virtual-trackball rotation relative to the press-time rotation
    ///
    /// Cursor positions are window coordinates with a top-left origin.
    pub fn trackball(&mut self, down_rotation: UnitQuaternion<f32>, down: [f32; 2], current: [f32; 2]) {
        if down == current {
            self.rotation = down_rotation;
            return;
        }
        let (w, h) = (self.width as f32, self.height as f32);
        let to_unit = |[x, y]: [f32; 2]| {
            let ux = TRACKBALL_SPEED * (2.0 * x - w - 1.0) / w;
            let uy = TRACKBALL_SPEED * (h - 2.0 * y - 1.0) / h;
            Vector3::new(ux, uy, project_to_sphere(ux, uy))
        };
        let p1 = to_unit(down);
        let p2 = to_unit(current);

        let Some(axis) = nalgebra::Unit::try_new(p1.cross(&p2), f32::EPSILON) else {
            self.rotation = down_rotation;
            return;
        };
        let t = ((p2 - p1).norm() / (2.0 * TRACKBALL_SIZE)).clamp(-1.0, 1.0);
        let drag = UnitQuaternion::from_axis_angle(&axis, 2.0 * t.asin());
        self.rotation = drag * down_rotation;
    }

    /// Snap the rotation to the nearest axis-aligned orientation
    ///
    /// Distance is the chord between unit quaternions (sign-insensitive).
    /// Returns `false` and leaves the rotation alone when nothing lies within
    /// `tolerance`.
    pub fn snap_to_canonical(&mut self, tolerance: f32) -> bool {
        let current = self.rotation;
        let nearest = canonical_rotations()
            .into_iter()
            .map(|c| (quaternion_distance(&current, &c), c))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((distance, canonical)) if distance <= tolerance => {
                self.rotation = canonical;
                log::debug!("Snapped to canonical view (distance {:.3})", distance);
                true
            }
            _ => false,
        }
    }
}

/// Point on the trackball sphere, blending into a hyperbolic sheet away from the center
fn project_to_sphere(x: f32, y: f32) -> f32 {
    let d = (x * x + y * y).sqrt();
    if d < TRACKBALL_SIZE * std::f32::consts::FRAC_1_SQRT_2 {
        (TRACKBALL_SIZE * TRACKBALL_SIZE - d * d).sqrt()
    } else {
        let t = TRACKBALL_SIZE / std::f32::consts::SQRT_2;
        t * t / d
    }
}

/// Chord distance between two rotations, accounting for `q ≡ -q`
pub fn quaternion_distance(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>) -> f32 {
    let dot = a.coords.dot(&b.coords).abs().min(1.0);
    (2.0 - 2.0 * dot).sqrt()
}

/// The 24 rotations of the cube group
pub fn canonical_rotations() -> Vec<UnitQuaternion<f32>> {
    const PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut out = Vec::with_capacity(24);
    for perm in PERMUTATIONS {
        for signs in 0..8u32 {
            let mut m = Matrix3::zeros();
            for (row, &col) in perm.iter().enumerate() {
                m[(row, col)] = if signs & (1 << row) != 0 { -1.0 } else { 1.0 };
            }
            if m.determinant() > 0.0 {
                out.push(UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m)));
            }
        }
    }
    out
}
