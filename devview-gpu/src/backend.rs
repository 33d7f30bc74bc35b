//! Graphics command surface driven by the viewer
//!
//! The viewer only ever talks to a [`GraphicsBackend`]: it creates buffers,
//! uploads their contents, writes one uniform block per frame, submits an
//! ordered list of draw calls and reads single pixels back for picking.

use bytemuck::{Pod, Zeroable};
use devview_core::{Color3, PixelSource, Result};
use nalgebra::Matrix4;
use std::ops::Range;

/// Opaque handle to a backend buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// How a buffer is bound when drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Shader program used by a draw call
///
/// Vertex buffer slots per program:
/// - `Fill`, `Texture`: positions, normals, ambient, specular, diffuse (`vec3` each), indexed
/// - `Lines`: positions (`vec3`), transparency (`f32`), indexed
/// - `Points`: per-instance positions (`vec3`) and flags (`u32`), 6 vertices per instance
/// - `PlotBackground`, `PlotLines`: positions (`vec2`), per-instance colors (`vec3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Fill,
    Texture,
    Lines,
    Points,
    PlotBackground,
    PlotLines,
}

/// Vertices drawn per point marker (two triangles)
pub const POINT_QUAD_VERTICES: u32 = 6;

/// One draw submission
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: Program,
    pub vertex_buffers: Vec<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    /// Index range when indexed, vertex range otherwise
    pub elements: Range<u32>,
    pub instances: Range<u32>,
}

impl DrawCall {
    pub fn indexed(program: Program, vertex_buffers: Vec<BufferHandle>, indices: BufferHandle, count: u32) -> Self {
        Self {
            program,
            vertex_buffers,
            index_buffer: Some(indices),
            elements: 0..count,
            instances: 0..1,
        }
    }

    pub fn arrays(program: Program, vertex_buffers: Vec<BufferHandle>, elements: Range<u32>, instances: Range<u32>) -> Self {
        Self {
            program,
            vertex_buffers,
            index_buffer: None,
            elements,
            instances,
        }
    }
}

/// Everything drawn in one frame, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub clear_color: Color3,
    pub draws: Vec<DrawCall>,
}

/// Per-frame shader constants
///
/// Layout matches the `Scene` struct in the WGSL sources (16-byte aligned
/// `vec3<f32>` followed by a scalar).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub lighting_factor: f32,
    pub wire_color: [f32; 3],
    pub shininess: f32,
    pub fill_color: [f32; 3],
    pub cel_shading: u32,
    pub important_color: [f32; 3],
    pub point_size: f32,
    pub selected_color: [f32; 3],
    pub important_size: f32,
    pub outline_color: [f32; 3],
    pub selected_size: f32,
    pub viewport: [f32; 2],
    pub _padding: [f32; 2],
}

impl Default for SceneUniforms {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        Self {
            model: identity,
            view: identity,
            proj: identity,
            light_position: [0.0, 0.3, 5.0],
            lighting_factor: 1.0,
            wire_color: [0.0, 0.0, 0.0],
            shininess: 35.0,
            fill_color: [1.0, 1.0, 1.0],
            cel_shading: 0,
            important_color: [1.0, 1.0, 1.0],
            point_size: 6.0,
            selected_color: [1.0, 1.0, 1.0],
            important_size: 6.0,
            outline_color: [0.0, 0.0, 0.0],
            selected_size: 8.0,
            viewport: [1.0, 1.0],
            _padding: [0.0; 2],
        }
    }
}

/// Graphics API the viewer drives
///
/// Implementations must keep buffer handles valid for their whole lifetime;
/// `allocate_buffer` may replace the storage behind a handle but never the
/// handle itself. Pixel reads (through [`PixelSource`]) observe the most
/// recently submitted frame.
pub trait GraphicsBackend: PixelSource {
    /// Create an empty buffer
    fn create_buffer(&mut self, label: &str, usage: BufferUsage) -> Result<BufferHandle>;

    /// Make sure the buffer can hold at least `size` bytes
    fn allocate_buffer(&mut self, buffer: BufferHandle, size: u64) -> Result<()>;

    /// Write bytes starting at `offset`; the range must lie inside the allocation
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    fn write_uniforms(&mut self, uniforms: &SceneUniforms) -> Result<()>;

    fn submit_frame(&mut self, frame: &Frame) -> Result<()>;

    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Allocate and overwrite the whole buffer
    fn upload(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        self.allocate_buffer(buffer, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        self.write_buffer(buffer, 0, data)
    }
}
