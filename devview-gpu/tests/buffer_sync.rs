//! Buffer synchronization against the headless backend

use devview_core::{ColoringState, DMatrix, LineTransparency, MeshStore, Selection};
use devview_gpu::{
    Attribute, DirtyFlags, EdgeLayout, HeadlessBackend, MeshBuffers, MeshPasses, Program, SceneSource,
    VertexLayout,
};

struct Scene {
    mesh: MeshStore,
    coloring: ColoringState,
    line_transparency: LineTransparency,
    selection: Selection,
}

impl Scene {
    /// Unit square split into two triangles
    fn square() -> Self {
        let v = DMatrix::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        );
        let f = DMatrix::from_row_slice(2, 3, &[0usize, 1, 2, 0, 2, 3]);
        Self::from_mesh(&v, &f)
    }

    /// Four vertices and four faces
    fn tetrahedron() -> Self {
        let v = DMatrix::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        );
        let f = DMatrix::from_row_slice(4, 3, &[0usize, 1, 2, 0, 1, 3, 0, 2, 3, 1, 2, 3]);
        Self::from_mesh(&v, &f)
    }

    /// Three vertices and one face, so the vertex count equals the corner count
    fn triangle() -> Self {
        let v = DMatrix::from_row_slice(3, 3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        Self::from_mesh(&v, &f)
    }

    fn from_mesh(v: &DMatrix<f64>, f: &DMatrix<usize>) -> Self {
        let mut mesh = MeshStore::new();
        mesh.set_mesh(v, f, None).unwrap();
        let mut coloring = ColoringState::new(false);
        coloring.apply_default(mesh.vertex_count(), mesh.face_count());
        Self {
            mesh,
            coloring,
            line_transparency: LineTransparency::Disabled,
            selection: Selection::new(),
        }
    }

    fn set_face_based(&mut self, enabled: bool) {
        let faces = self.mesh.faces().to_vec();
        self.coloring
            .set_face_based(enabled, self.mesh.vertex_count(), &faces);
    }

    fn source(&self) -> SceneSource<'_> {
        SceneSource {
            mesh: &self.mesh,
            coloring: &self.coloring,
            line_transparency: &self.line_transparency,
            selection: &self.selection,
        }
    }
}

fn handle(buffers: &MeshBuffers, attribute: Attribute) -> devview_gpu::BufferHandle {
    buffers.mirror(attribute).buffer().expect("buffer allocated")
}

#[test]
fn test_face_based_toggle_duplicates_corners() {
    let mut scene = Scene::square();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::Positions).rows(), 4);
    let faces: Vec<u32> = backend.buffer_as(handle(&buffers, Attribute::FaceIndices));
    assert_eq!(faces, vec![0, 1, 2, 0, 2, 3]);

    let faces = scene.mesh.faces().to_vec();
    scene
        .coloring
        .set_face_based(true, scene.mesh.vertex_count(), &faces);
    let applied = buffers.sync(&mut backend, scene.source()).unwrap();
    assert!(applied.topology);

    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::PerCorner));
    for attribute in [
        Attribute::Positions,
        Attribute::Normals,
        Attribute::Ambient,
        Attribute::Specular,
        Attribute::Diffuse,
    ] {
        assert_eq!(buffers.mirror(attribute).rows(), 6, "{:?}", attribute);
    }
    let faces: Vec<u32> = backend.buffer_as(handle(&buffers, Attribute::FaceIndices));
    assert_eq!(faces, vec![0, 1, 2, 3, 4, 5]);

    let positions: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Positions));
    assert_eq!(positions[3], [0.0, 0.0, 0.0]);
    assert_eq!(positions[4], [1.0, 1.0, 0.0]);
    assert_eq!(positions[5], [0.0, 1.0, 0.0]);
}

#[test]
fn test_position_update_keeps_topology_buffers() {
    let mut scene = Scene::square();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();
    buffers.sync(&mut backend, scene.source()).unwrap();

    let created = backend.buffer_count();
    let face_writes = backend.buffer_writes(handle(&buffers, Attribute::FaceIndices));
    let position_writes = backend.buffer_writes(handle(&buffers, Attribute::Positions));

    let moved = DMatrix::from_row_slice(
        4,
        3,
        &[0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0],
    );
    scene.mesh.modify_vertices(&moved).unwrap();
    buffers.mark_positions_dirty();
    let applied = buffers.sync(&mut backend, scene.source()).unwrap();

    assert!(applied.positions);
    assert!(!applied.topology);
    assert_eq!(backend.buffer_count(), created);
    assert_eq!(
        backend.buffer_writes(handle(&buffers, Attribute::FaceIndices)),
        face_writes
    );
    assert_eq!(
        backend.buffer_writes(handle(&buffers, Attribute::Positions)),
        position_writes + 1
    );
    let positions: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Positions));
    assert_eq!(positions[2], [1.0, 1.0, 1.0]);

    // Nothing dirty: nothing uploaded
    let applied = buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(applied, DirtyFlags::default());
}

#[test]
fn test_face_colors_expand_per_corner() {
    let mut scene = Scene::square();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    let colors = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    scene.coloring.set_colors(&colors, 4, 2).unwrap();
    buffers.sync(&mut backend, scene.source()).unwrap();

    let diffuse: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Diffuse));
    assert_eq!(diffuse.len(), 6);
    for corner in 0..3 {
        assert_eq!(diffuse[corner], [1.0, 0.0, 0.0]);
        assert_eq!(diffuse[3 + corner], [0.0, 0.0, 1.0]);
    }
}

#[test]
fn test_line_transparency_switches_edge_layout() {
    let mut scene = Scene::square();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();
    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.edge_layout(), Some(EdgeLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::LineTransparency).rows(), 4);

    let edges = scene.mesh.edge_count();
    let values: Vec<f32> = (0..edges).map(|i| i as f32 / edges as f32).collect();
    scene.line_transparency = LineTransparency::enable(&values, edges).unwrap();
    buffers.mark_line_transparency_dirty();
    buffers.sync(&mut backend, scene.source()).unwrap();

    assert_eq!(buffers.edge_layout(), Some(EdgeLayout::PerEdge));
    let alpha: Vec<f32> = backend.buffer_as(handle(&buffers, Attribute::LineTransparency));
    assert_eq!(alpha.len(), 2 * edges);
    assert_eq!(alpha[2], values[1]);
    assert_eq!(alpha[3], values[1]);
    let indices: Vec<u32> = backend.buffer_as(handle(&buffers, Attribute::EdgeIndices));
    assert_eq!(indices, (0..2 * edges as u32).collect::<Vec<_>>());
    assert_eq!(buffers.mirror(Attribute::EdgePositions).rows(), 2 * edges as u32);
}

#[test]
fn test_draw_calls_follow_passes() {
    let mut scene = Scene::square();
    scene.selection.set_marked_points(&[0, 2], 4).unwrap();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    // Nothing uploaded yet
    let all = MeshPasses {
        fill: Some(Program::Fill),
        lines: true,
        points: true,
    };
    assert!(buffers.draw_calls(all).is_empty());

    buffers.sync(&mut backend, scene.source()).unwrap();
    let draws = buffers.draw_calls(all);
    let programs: Vec<Program> = draws.iter().map(|d| d.program).collect();
    assert_eq!(programs, vec![Program::Fill, Program::Lines, Program::Points]);
    assert_eq!(draws[0].elements, 0..6);
    assert_eq!(draws[1].elements, 0..10);
    assert_eq!(draws[2].instances, 0..2);

    let wire_only = MeshPasses {
        fill: None,
        lines: true,
        points: false,
    };
    assert_eq!(buffers.draw_calls(wire_only).len(), 1);
}

#[test]
fn test_vertex_mode_with_equal_vertex_and_face_counts() {
    let mut scene = Scene::tetrahedron();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::Diffuse).rows(), 4);

    // uniform colors in vertex mode stay per-vertex
    scene
        .coloring
        .set_uniform([1.0, 0.0, 0.0], scene.mesh.vertex_count(), scene.mesh.face_count());
    buffers.mark_colors_dirty();
    buffers.sync(&mut backend, scene.source()).unwrap();
    let diffuse: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Diffuse));
    assert_eq!(diffuse, vec![[1.0, 0.0, 0.0]; 4]);
}

#[test]
fn test_face_mode_with_equal_vertex_and_face_counts() {
    let mut scene = Scene::tetrahedron();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    // four rows read as one color per face
    let colors = DMatrix::from_row_slice(
        4,
        3,
        &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0],
    );
    scene
        .coloring
        .set_colors(&colors, scene.mesh.vertex_count(), scene.mesh.face_count())
        .unwrap();
    assert!(scene.coloring.face_based());

    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::PerCorner));
    let diffuse: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Diffuse));
    assert_eq!(diffuse.len(), 12);
    assert_eq!(diffuse[3..6], [[0.0, 1.0, 0.0]; 3]);

    // leaving face mode averages back onto the vertices
    scene.set_face_based(false);
    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::Diffuse).rows(), 4);
}

#[test]
fn test_vertex_count_equal_to_corner_count() {
    let mut scene = Scene::triangle();
    let mut backend = HeadlessBackend::new(64, 64);
    let mut buffers = MeshBuffers::new();

    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::Diffuse).rows(), 3);

    // default color in face mode is one row for the single face
    scene.set_face_based(true);
    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::PerCorner));
    assert_eq!(buffers.mirror(Attribute::Diffuse).rows(), 3);

    // three rows read as corner colors
    let colors = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    scene
        .coloring
        .set_colors(&colors, scene.mesh.vertex_count(), scene.mesh.face_count())
        .unwrap();
    assert!(scene.coloring.face_based());
    buffers.mark_colors_dirty();
    buffers.sync(&mut backend, scene.source()).unwrap();
    let diffuse: Vec<[f32; 3]> = backend.buffer_as(handle(&buffers, Attribute::Diffuse));
    assert_eq!(diffuse, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    scene.set_face_based(false);
    buffers.sync(&mut backend, scene.source()).unwrap();
    assert_eq!(buffers.vertex_layout(), Some(VertexLayout::Shared));
    assert_eq!(buffers.mirror(Attribute::Diffuse).rows(), 3);
}
