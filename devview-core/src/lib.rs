//! Core state for the devview mesh viewer
//!
//! This crate holds everything the viewer knows about the scene without
//! touching the GPU:
//! - the mesh store (vertices, faces, edges, normals, centering transform)
//! - coloring and line-transparency state
//! - marked points, click resolution and drag gestures

pub mod coloring;
pub mod error;
pub mod mesh;
pub mod point;
pub mod selection;
pub mod transform;

pub use coloring::*;
pub use error::*;
pub use mesh::*;
pub use point::*;
pub use selection::*;
pub use transform::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{DMatrix, Matrix4, Point2, Point3, UnitQuaternion, Vector2, Vector3, Vector4};
