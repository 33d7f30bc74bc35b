//! Keeps GPU buffers in step with the CPU-side mesh, coloring and selection
//!
//! Every logical attribute has one [`BufferMirror`]. Handles are created on
//! first use and reused afterwards; contents are re-uploaded in full whenever
//! the matching dirty flag is set. Layout switches (smooth ↔ flat shading,
//! shared ↔ per-edge lines) are detected here and promoted to a topology
//! resync, so callers only report what they changed.

use crate::backend::{BufferHandle, BufferUsage, DrawCall, GraphicsBackend, Program, POINT_QUAD_VERTICES};
use crate::layout::{
    edge_indices, expand_colors, expand_per_corner, expand_per_edge, face_indices, gather,
    repeat_per_face, EdgeLayout, VertexLayout,
};
use bytemuck::Pod;
use devview_core::{ColoringState, Error, LineTransparency, MeshStore, Result, Selection};

/// Which parts of the GPU state are stale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub positions: bool,
    pub topology: bool,
    pub colors: bool,
    pub line_transparency: bool,
    pub points: bool,
}

impl DirtyFlags {
    pub fn all() -> Self {
        Self {
            positions: true,
            topology: true,
            colors: true,
            line_transparency: true,
            points: true,
        }
    }

    pub fn any(&self) -> bool {
        self.positions || self.topology || self.colors || self.line_transparency || self.points
    }
}

/// Logical attributes mirrored on the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Positions,
    Normals,
    Ambient,
    Specular,
    Diffuse,
    EdgePositions,
    LineTransparency,
    FaceIndices,
    EdgeIndices,
    PointPositions,
    PointFlags,
}

/// One GPU buffer and the row count of its last upload
#[derive(Debug, Clone)]
pub struct BufferMirror {
    label: &'static str,
    usage: BufferUsage,
    handle: Option<BufferHandle>,
    rows: u32,
    uploads: u32,
}

impl BufferMirror {
    fn new(label: &'static str, usage: BufferUsage) -> Self {
        Self {
            label,
            usage,
            handle: None,
            rows: 0,
            uploads: 0,
        }
    }

    fn handle<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> Result<BufferHandle> {
        match self.handle {
            Some(h) => Ok(h),
            None => {
                let h = backend.create_buffer(self.label, self.usage)?;
                log::debug!("Created buffer {:?} ({})", h, self.label);
                self.handle = Some(h);
                Ok(h)
            }
        }
    }

    fn upload<B: GraphicsBackend + ?Sized, T: Pod>(&mut self, backend: &mut B, data: &[T]) -> Result<()> {
        let handle = self.handle(backend)?;
        backend.upload(handle, bytemuck::cast_slice(data))?;
        self.rows = u32::try_from(data.len())
            .map_err(|_| Error::Gpu(format!("Buffer {} exceeds u32 rows", self.label)))?;
        self.uploads += 1;
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        self.handle.is_some()
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.handle
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of full uploads so far
    pub fn uploads(&self) -> u32 {
        self.uploads
    }
}

/// Borrowed view of the state the buffers mirror
#[derive(Clone, Copy)]
pub struct SceneSource<'a> {
    pub mesh: &'a MeshStore,
    pub coloring: &'a ColoringState,
    pub line_transparency: &'a LineTransparency,
    pub selection: &'a Selection,
}

/// Passes requested for the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPasses {
    /// Program for the fill pass, if any
    pub fill: Option<Program>,
    pub lines: bool,
    pub points: bool,
}

/// GPU mirrors of all mesh attributes
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    positions: BufferMirror,
    normals: BufferMirror,
    ambient: BufferMirror,
    specular: BufferMirror,
    diffuse: BufferMirror,
    edge_positions: BufferMirror,
    line_transparency: BufferMirror,
    face_indices: BufferMirror,
    edge_indices: BufferMirror,
    point_positions: BufferMirror,
    point_flags: BufferMirror,
    vertex_layout: Option<VertexLayout>,
    edge_layout: Option<EdgeLayout>,
    dirty: DirtyFlags,
}

impl Default for MeshBuffers {
    fn default() -> Self {
        Self::new()
    }
}

fn rows3<P: Copy + Into<[f32; 3]>>(values: &[P]) -> Vec<[f32; 3]> {
    values.iter().map(|&v| v.into()).collect()
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self {
            positions: BufferMirror::new("positions", BufferUsage::Vertex),
            normals: BufferMirror::new("normals", BufferUsage::Vertex),
            ambient: BufferMirror::new("ambient colors", BufferUsage::Vertex),
            specular: BufferMirror::new("specular colors", BufferUsage::Vertex),
            diffuse: BufferMirror::new("diffuse colors", BufferUsage::Vertex),
            edge_positions: BufferMirror::new("edge positions", BufferUsage::Vertex),
            line_transparency: BufferMirror::new("line transparency", BufferUsage::Vertex),
            face_indices: BufferMirror::new("face indices", BufferUsage::Index),
            edge_indices: BufferMirror::new("edge indices", BufferUsage::Index),
            point_positions: BufferMirror::new("point positions", BufferUsage::Vertex),
            point_flags: BufferMirror::new("point flags", BufferUsage::Vertex),
            vertex_layout: None,
            edge_layout: None,
            dirty: DirtyFlags::all(),
        }
    }

    pub fn mark_positions_dirty(&mut self) {
        self.dirty.positions = true;
        self.dirty.points = true;
    }

    pub fn mark_topology_dirty(&mut self) {
        self.dirty = DirtyFlags::all();
    }

    pub fn mark_colors_dirty(&mut self) {
        self.dirty.colors = true;
    }

    pub fn mark_line_transparency_dirty(&mut self) {
        self.dirty.line_transparency = true;
    }

    pub fn mark_points_dirty(&mut self) {
        self.dirty.points = true;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn vertex_layout(&self) -> Option<VertexLayout> {
        self.vertex_layout
    }

    pub fn edge_layout(&self) -> Option<EdgeLayout> {
        self.edge_layout
    }

    pub fn mirror(&self, attribute: Attribute) -> &BufferMirror {
        match attribute {
            Attribute::Positions => &self.positions,
            Attribute::Normals => &self.normals,
            Attribute::Ambient => &self.ambient,
            Attribute::Specular => &self.specular,
            Attribute::Diffuse => &self.diffuse,
            Attribute::EdgePositions => &self.edge_positions,
            Attribute::LineTransparency => &self.line_transparency,
            Attribute::FaceIndices => &self.face_indices,
            Attribute::EdgeIndices => &self.edge_indices,
            Attribute::PointPositions => &self.point_positions,
            Attribute::PointFlags => &self.point_flags,
        }
    }

    /// Upload whatever is stale; returns the flags that were processed
    pub fn sync<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: SceneSource<'_>,
    ) -> Result<DirtyFlags> {
        let face_based = scene.coloring.face_based();
        let vertex_layout = if face_based {
            VertexLayout::PerCorner
        } else {
            VertexLayout::Shared
        };
        let edge_layout = if face_based || scene.line_transparency.is_enabled() {
            EdgeLayout::PerEdge
        } else {
            EdgeLayout::Shared
        };

        let mut dirty = self.dirty;
        if self.vertex_layout != Some(vertex_layout) || self.edge_layout != Some(edge_layout) {
            log::debug!("Layout changed to {:?}/{:?}", vertex_layout, edge_layout);
            dirty = DirtyFlags::all();
        }
        if dirty.topology {
            dirty = DirtyFlags::all();
        }
        if !dirty.any() {
            return Ok(dirty);
        }

        let mesh = scene.mesh;
        let faces = mesh.faces();
        let edges = mesh.edges();

        if dirty.topology {
            self.face_indices
                .upload(backend, &face_indices(faces, vertex_layout))?;
            self.edge_indices
                .upload(backend, &edge_indices(edges, edge_layout))?;
        }

        if dirty.positions {
            let (positions, normals) = match vertex_layout {
                VertexLayout::Shared => (rows3(mesh.vertices()), rows3(mesh.vertex_normals())),
                VertexLayout::PerCorner => (
                    expand_per_corner(&rows3(mesh.vertices()), faces),
                    repeat_per_face(&rows3(mesh.face_normals())),
                ),
            };
            self.positions.upload(backend, &positions)?;
            self.normals.upload(backend, &normals)?;
            if edge_layout == EdgeLayout::PerEdge {
                self.edge_positions
                    .upload(backend, &expand_per_edge(&rows3(mesh.vertices()), edges))?;
            }
        }

        if dirty.colors {
            let source = scene
                .coloring
                .layout(mesh.vertex_count(), mesh.face_count())
                .ok_or_else(|| Error::InvalidInput("Color rows do not match the mesh".to_string()))?;
            let colors = scene.coloring.colors();
            self.ambient
                .upload(backend, &expand_colors(&colors.ambient, source, faces, vertex_layout)?)?;
            self.specular
                .upload(backend, &expand_colors(&colors.specular, source, faces, vertex_layout)?)?;
            self.diffuse
                .upload(backend, &expand_colors(&colors.diffuse, source, faces, vertex_layout)?)?;
        }

        if dirty.line_transparency {
            let values = scene.line_transparency.buffer_values(
                face_based,
                mesh.vertex_count(),
                mesh.edge_count(),
            );
            self.line_transparency.upload(backend, &values)?;
        }

        if dirty.points {
            let marked = scene.selection.marked_points();
            let positions = gather(&rows3(mesh.vertices()), marked);
            self.point_positions.upload(backend, &positions)?;
            self.point_flags
                .upload(backend, &scene.selection.point_flags())?;
        }

        self.vertex_layout = Some(vertex_layout);
        self.edge_layout = Some(edge_layout);
        self.dirty = DirtyFlags::default();
        log::debug!("Synced buffers: {:?}", dirty);
        Ok(dirty)
    }

    /// Draw calls for the mesh passes, skipping anything not yet uploaded or empty
    pub fn draw_calls(&self, passes: MeshPasses) -> Vec<DrawCall> {
        let mut draws = Vec::new();

        if let Some(program) = passes.fill {
            let buffers = [
                &self.positions,
                &self.normals,
                &self.ambient,
                &self.specular,
                &self.diffuse,
            ];
            if let (Some(vbs), Some(ib)) = (handles(&buffers), self.face_indices.buffer()) {
                if self.face_indices.rows() > 0 {
                    draws.push(DrawCall::indexed(program, vbs, ib, self.face_indices.rows()));
                }
            }
        }

        if passes.lines {
            let positions = match self.edge_layout {
                Some(EdgeLayout::PerEdge) => &self.edge_positions,
                _ => &self.positions,
            };
            if let (Some(vbs), Some(ib)) = (
                handles(&[positions, &self.line_transparency]),
                self.edge_indices.buffer(),
            ) {
                if self.edge_indices.rows() > 0 {
                    draws.push(DrawCall::indexed(Program::Lines, vbs, ib, self.edge_indices.rows()));
                }
            }
        }

        if passes.points {
            if let Some(vbs) = handles(&[&self.point_positions, &self.point_flags]) {
                let n = self.point_positions.rows();
                if n > 0 {
                    draws.push(DrawCall::arrays(Program::Points, vbs, 0..POINT_QUAD_VERTICES, 0..n));
                }
            }
        }

        draws
    }
}

fn handles(mirrors: &[&BufferMirror]) -> Option<Vec<BufferHandle>> {
    mirrors.iter().map(|m| m.buffer()).collect()
}
