//! Interactive viewing for developability-flow meshes
//!
//! This crate puts the scene state of `devview-core` and the buffer layer of
//! `devview-gpu` behind one [`Viewer`]:
//! - Camera and projection pipeline
//! - Point picking and dragging
//! - Overlay convergence plots
//! - Render loop with pre-draw, keyboard and mouse hooks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use devview_core::DMatrix;
//! use devview_gpu::HeadlessBackend;
//! use devview_visualization::{run, ScriptedEvents, Viewer, ViewerCallbacks, ViewerConfig};
//!
//! fn example() -> devview_core::Result<()> {
//!     let v = DMatrix::from_row_slice(3, 3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
//!     let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
//!
//!     let mut viewer = Viewer::new(HeadlessBackend::new(640, 480), ViewerConfig::default())?;
//!     viewer.set_mesh(&v, &f, None)?;
//!     viewer.set_marked_points(&[0])?;
//!
//!     let mut callbacks = ViewerCallbacks::new().pre_draw(|_viewer, interacted| {
//!         if interacted {
//!             // advance the solver here
//!         }
//!         Ok(())
//!     });
//!     run(&mut viewer, &mut ScriptedEvents::new().idle(10), &mut callbacks)?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod config;
pub mod input;
pub mod plot;
pub mod render_loop;
pub mod viewer;
pub mod winit_source;

pub use camera::*;
pub use config::{DisplayMode, LightingParams, PlotConfig, ViewerConfig};
pub use input::*;
pub use plot::*;
pub use render_loop::*;
pub use viewer::*;
pub use winit_source::WinitEventSource;
