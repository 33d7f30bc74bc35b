//! Point, vector and color types

use nalgebra::{Point3, Vector3};

/// A 3D point with single precision coordinates (the viewer's working precision)
pub type Point3f = Point3<f32>;

/// A 3D vector with single precision components
pub type Vector3f = Vector3<f32>;

/// Linear RGB color triple with components in `[0, 1]`
pub type Color3 = [f32; 3];

/// Convert an RGB triple given in `0..=255` steps to a linear color
pub fn rgb8(r: u8, g: u8, b: u8) -> Color3 {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}
