//! # devview GPU
//!
//! Graphics side of the devview mesh viewer: the [`GraphicsBackend`] command
//! surface, the buffer synchronization layer that mirrors mesh state into
//! GPU buffers, and two backends.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use devview_core::{ColoringState, LineTransparency, MeshStore, Selection};
//! use devview_gpu::{HeadlessBackend, MeshBuffers, SceneSource};
//!
//! fn example(mesh: &MeshStore) -> devview_core::Result<()> {
//!     let mut backend = HeadlessBackend::new(640, 480);
//!     let mut buffers = MeshBuffers::new();
//!     let mut coloring = ColoringState::default();
//!     coloring.apply_default(mesh.vertex_count(), mesh.face_count());
//!
//!     buffers.sync(&mut backend, SceneSource {
//!         mesh,
//!         coloring: &coloring,
//!         line_transparency: &LineTransparency::Disabled,
//!         selection: &Selection::new(),
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod device;
pub mod headless;
pub mod layout;
pub mod shaders;
pub mod sync;
pub mod wgpu_backend;

// Re-export commonly used items
pub use backend::*;
pub use device::GpuContext;
pub use headless::HeadlessBackend;
pub use layout::{EdgeLayout, VertexLayout};
pub use sync::{Attribute, BufferMirror, DirtyFlags, MeshBuffers, MeshPasses, SceneSource};
pub use wgpu_backend::{opengl_to_wgpu_matrix, WgpuBackend, TARGET_FORMAT};
