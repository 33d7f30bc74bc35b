//! Affine transforms used by the model matrix pipeline

use crate::point::{Point3f, Vector3f};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// A 3D affine transformation stored as a homogeneous matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3f) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Create a uniform scaling transformation
    pub fn uniform_scaling(scale: f32) -> Self {
        Self {
            matrix: Matrix4::new_scaling(scale),
        }
    }

    /// Scale after translating: `p ↦ scale · (p + translation)`
    pub fn scale_translate(scale: f32, translation: Vector3f) -> Self {
        Self::uniform_scaling(scale) * Self::translation(translation)
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3f) -> Point3f {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3f::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Compose this transformation with another (`other` is applied first)
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4<f32>> for Transform3D {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_scale_translate_order() {
        let t = Transform3D::scale_translate(2.0, Vector3f::new(1.0, 0.0, -1.0));
        let p = t.transform_point(&Point3f::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p, Point3f::new(4.0, 2.0, 0.0));
    }

    #[test]
    fn test_compose_applies_right_first() {
        let rot = Transform3D::from(
            UnitQuaternion::from_axis_angle(&Vector3f::z_axis(), std::f32::consts::FRAC_PI_2).to_homogeneous(),
        );
        let shift = Transform3D::translation(Vector3f::new(1.0, 0.0, 0.0));
        let p = (rot * shift).transform_point(&Point3f::origin());
        assert_relative_eq!(p, Point3f::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }
}
