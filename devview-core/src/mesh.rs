//! Mesh state store: vertices, faces, edges and normals

use crate::error::{Error, Result};
use crate::point::{Point3f, Vector3f};
use crate::transform::Transform3D;
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// What kind of buffer resync a mesh mutation requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshChange {
    /// Only vertex positions (and therefore normals) moved
    Positions,
    /// Faces and edges were replaced; index buffers must be rebuilt
    Topology,
}

/// CPU-side triangle mesh the viewer renders
///
/// Vertex positions are kept in single precision. Faces and edges are
/// validated against the vertex count on every mutation so downstream buffer
/// code can index without checks.
#[derive(Debug, Clone, Default)]
pub struct MeshStore {
    vertices: Vec<Point3f>,
    faces: Vec<[u32; 3]>,
    edges: Vec<[u32; 2]>,
    face_normals: Vec<Vector3f>,
    vertex_normals: Vec<Vector3f>,
    initial_shift: Transform3D,
    loaded: bool,
}

impl MeshStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole mesh
    ///
    /// `vertices` must have 3 columns, `faces` 3 columns and `edges` (when
    /// given) 2 columns, with all indices in range. Missing edges are derived
    /// from the faces. Also recomputes the centering transform.
    pub fn set_mesh(
        &mut self,
        vertices: &DMatrix<f64>,
        faces: &DMatrix<usize>,
        edges: Option<&DMatrix<usize>>,
    ) -> Result<MeshChange> {
        let new_vertices = points_from_rows(vertices)?;
        let new_faces = faces_from_rows(faces, new_vertices.len())?;
        let new_edges = match edges {
            Some(e) => edges_from_rows(e, new_vertices.len())?,
            None => unique_edges(&new_faces),
        };

        self.initial_shift = centering_transform(&new_vertices, &new_faces);
        self.vertices = new_vertices;
        self.faces = new_faces;
        self.edges = new_edges;
        self.recompute_normals();
        self.loaded = true;

        log::debug!(
            "Mesh set: {} vertices, {} faces, {} edges",
            self.vertices.len(),
            self.faces.len(),
            self.edges.len()
        );
        Ok(MeshChange::Topology)
    }

    /// Move the vertices, keeping faces and edges
    pub fn modify_vertices(&mut self, vertices: &DMatrix<f64>) -> Result<MeshChange> {
        let new_vertices = points_from_rows(vertices)?;
        if new_vertices.len() != self.vertices.len() {
            return Err(Error::invalid(format!(
                "Expected {} vertices, got {}",
                self.vertices.len(),
                new_vertices.len()
            )));
        }
        self.vertices = new_vertices;
        self.recompute_normals();
        Ok(MeshChange::Positions)
    }

    /// Replace faces (and edges, derived from the faces when `None`)
    pub fn modify_faces(
        &mut self,
        faces: &DMatrix<usize>,
        edges: Option<&DMatrix<usize>>,
    ) -> Result<MeshChange> {
        let new_faces = faces_from_rows(faces, self.vertices.len())?;
        let new_edges = match edges {
            Some(e) if e.nrows() > 0 => edges_from_rows(e, self.vertices.len())?,
            _ => unique_edges(&new_faces),
        };
        self.faces = new_faces;
        self.edges = new_edges;
        self.recompute_normals();
        Ok(MeshChange::Topology)
    }

    fn recompute_normals(&mut self) {
        self.face_normals = face_normals(&self.vertices, &self.faces);
        self.vertex_normals = vertex_normals(&self.vertices, &self.faces);
    }

    /// Whether `set_mesh` has been called
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn vertices(&self) -> &[Point3f] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    pub fn face_normals(&self) -> &[Vector3f] {
        &self.face_normals
    }

    pub fn vertex_normals(&self) -> &[Vector3f] {
        &self.vertex_normals
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Vertices as an `n × 3` matrix in working precision, rows in input order
    pub fn vertices_matrix(&self) -> DMatrix<f32> {
        DMatrix::from_fn(self.vertices.len(), 3, |r, c| self.vertices[r][c])
    }

    /// One-time centering/scaling transform computed by the last `set_mesh`
    pub fn initial_shift(&self) -> Transform3D {
        self.initial_shift
    }

    /// Mean of all vertex positions (origin for an empty mesh)
    pub fn centroid(&self) -> Point3f {
        if self.vertices.is_empty() {
            return Point3f::origin();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3f::zeros(), |acc, v| acc + v.coords);
        Point3f::from(sum / self.vertices.len() as f32)
    }
}

fn points_from_rows(m: &DMatrix<f64>) -> Result<Vec<Point3f>> {
    if m.ncols() != 3 {
        return Err(Error::invalid(format!(
            "Every vertex must have 3 coordinates, got {} columns",
            m.ncols()
        )));
    }
    Ok(m.row_iter()
        .map(|r| Point3f::new(r[0] as f32, r[1] as f32, r[2] as f32))
        .collect())
}

fn index_rows<const N: usize>(
    m: &DMatrix<usize>,
    vertex_count: usize,
    what: &str,
) -> Result<Vec<[u32; N]>> {
    if m.ncols() != N {
        return Err(Error::invalid(format!(
            "Every {what} must have {N} vertices, got {} columns",
            m.ncols()
        )));
    }
    m.row_iter()
        .enumerate()
        .map(|(row, r)| {
            let mut out = [0u32; N];
            for (slot, &index) in out.iter_mut().zip(r.iter()) {
                if index >= vertex_count {
                    return Err(Error::invalid(format!(
                        "{what} {row} references vertex {index}, but the mesh has {vertex_count}"
                    )));
                }
                *slot = u32::try_from(index)
                    .map_err(|_| Error::invalid(format!("Vertex index {index} overflows u32")))?;
            }
            Ok(out)
        })
        .collect()
}

fn faces_from_rows(m: &DMatrix<usize>, vertex_count: usize) -> Result<Vec<[u32; 3]>> {
    index_rows::<3>(m, vertex_count, "face")
}

fn edges_from_rows(m: &DMatrix<usize>, vertex_count: usize) -> Result<Vec<[u32; 2]>> {
    index_rows::<2>(m, vertex_count, "edge")
}

/// Unique undirected edges of a triangle list, sorted by `(min, max)`
pub fn unique_edges(faces: &[[u32; 3]]) -> Vec<[u32; 2]> {
    let mut set = BTreeSet::new();
    for f in faces {
        for k in 0..3 {
            let (a, b) = (f[k], f[(k + 1) % 3]);
            set.insert([a.min(b), a.max(b)]);
        }
    }
    set.into_iter().collect()
}

/// Barycenter of every face
pub fn face_barycenters(vertices: &[Point3f], faces: &[[u32; 3]]) -> Vec<Point3f> {
    faces
        .iter()
        .map(|f| {
            let sum = vertices[f[0] as usize].coords
                + vertices[f[1] as usize].coords
                + vertices[f[2] as usize].coords;
            Point3f::from(sum / 3.0)
        })
        .collect()
}

/// Transform that maps the bounding box of the face barycenters into `[-1, 1]`
///
/// `translation = -midpoint(min, max)` and `scale = 2 / max extent`. Falls
/// back to the vertices when there are no faces and to unit scale when the
/// extent is degenerate.
pub fn centering_transform(vertices: &[Point3f], faces: &[[u32; 3]]) -> Transform3D {
    let samples = if faces.is_empty() {
        vertices.to_vec()
    } else {
        face_barycenters(vertices, faces)
    };
    let Some(first) = samples.first() else {
        return Transform3D::identity();
    };

    let (min, max) = samples
        .iter()
        .fold((first.coords, first.coords), |(lo, hi), p| {
            (lo.inf(&p.coords), hi.sup(&p.coords))
        });
    let center = (min + max) * 0.5;
    let extent = (max - min).abs().max();
    let scale = if extent > f32::EPSILON { 2.0 / extent } else { 1.0 };

    Transform3D::scale_translate(scale, -center)
}

fn degenerate_normal() -> Vector3f {
    Vector3f::new(1.0, 1.0, 1.0).normalize()
}

/// Unit normal of every face
pub fn face_normals(vertices: &[Point3f], faces: &[[u32; 3]]) -> Vec<Vector3f> {
    faces
        .iter()
        .map(|f| {
            let v0 = vertices[f[0] as usize];
            let n = (vertices[f[1] as usize] - v0).cross(&(vertices[f[2] as usize] - v0));
            n.try_normalize(f32::EPSILON).unwrap_or_else(degenerate_normal)
        })
        .collect()
}

/// Area-weighted per-vertex normals
pub fn vertex_normals(vertices: &[Point3f], faces: &[[u32; 3]]) -> Vec<Vector3f> {
    let mut normals = vec![Vector3f::zeros(); vertices.len()];
    for f in faces {
        let v0 = vertices[f[0] as usize];
        let weighted = (vertices[f[1] as usize] - v0).cross(&(vertices[f[2] as usize] - v0));
        for &i in f {
            normals[i as usize] += weighted;
        }
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(degenerate_normal))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> (DMatrix<f64>, DMatrix<usize>) {
        let v = DMatrix::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        );
        let f = DMatrix::from_row_slice(4, 3, &[0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3]);
        (v, f)
    }

    #[test]
    fn test_set_mesh_keeps_vertex_order() {
        let (v, f) = tetrahedron();
        let mut store = MeshStore::new();
        assert_eq!(store.set_mesh(&v, &f, None).unwrap(), MeshChange::Topology);

        let back = store.vertices_matrix();
        assert_eq!(back.shape(), (4, 3));
        for r in 0..4 {
            for c in 0..3 {
                assert_eq!(back[(r, c)], v[(r, c)] as f32);
            }
        }
    }

    #[test]
    fn test_edges_derived_from_faces() {
        let (v, f) = tetrahedron();
        let mut store = MeshStore::new();
        store.set_mesh(&v, &f, None).unwrap();
        assert_eq!(store.edge_count(), 6);
        assert!(store.edges().iter().all(|e| e[0] < e[1]));
    }

    #[test]
    fn test_rejects_wrong_columns() {
        let mut store = MeshStore::new();
        let v = DMatrix::<f64>::zeros(3, 2);
        let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        assert!(matches!(store.set_mesh(&v, &f, None), Err(Error::InvalidInput(_))));

        let v = DMatrix::<f64>::zeros(3, 3);
        let quad = DMatrix::from_row_slice(1, 4, &[0usize, 1, 2, 0]);
        assert!(matches!(store.set_mesh(&v, &quad, None), Err(Error::InvalidInput(_))));

        let bad_edges = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        assert!(matches!(
            store.set_mesh(&v, &f, Some(&bad_edges)),
            Err(Error::InvalidInput(_))
        ));
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let mut store = MeshStore::new();
        let v = DMatrix::<f64>::zeros(3, 3);
        let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 3]);
        assert!(matches!(store.set_mesh(&v, &f, None), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_centering_invariant() {
        let v = DMatrix::from_row_slice(
            4,
            3,
            &[10.0, 4.0, -2.0, 14.0, 4.0, -2.0, 10.0, 9.0, -2.0, 10.0, 4.0, 5.0],
        );
        let f = DMatrix::from_row_slice(4, 3, &[0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3]);
        let mut store = MeshStore::new();
        store.set_mesh(&v, &f, None).unwrap();

        let shift = store.initial_shift();
        let moved: Vec<Point3f> = face_barycenters(store.vertices(), store.faces())
            .iter()
            .map(|p| shift.transform_point(p))
            .collect();

        let mut lo = moved[0].coords;
        let mut hi = moved[0].coords;
        for p in &moved {
            lo = lo.inf(&p.coords);
            hi = hi.sup(&p.coords);
            assert!(p.coords.abs().max() <= 1.0 + 1e-5);
        }
        assert_relative_eq!((lo + hi) * 0.5, Vector3f::zeros(), epsilon = 1e-5);
        assert_relative_eq!((hi - lo).abs().max(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_extent_uses_unit_scale() {
        let t = centering_transform(&[Point3f::new(3.0, 3.0, 3.0)], &[]);
        assert_relative_eq!(
            t.transform_point(&Point3f::new(4.0, 3.0, 3.0)),
            Point3f::new(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_modify_vertices_recomputes_normals() {
        let v = DMatrix::from_row_slice(3, 3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let f = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        let mut store = MeshStore::new();
        store.set_mesh(&v, &f, None).unwrap();
        assert_relative_eq!(store.face_normals()[0], Vector3f::z());

        let flipped =
            DMatrix::from_row_slice(3, 3, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(store.modify_vertices(&flipped).unwrap(), MeshChange::Positions);
        assert_relative_eq!(store.face_normals()[0], -Vector3f::z());
        assert_relative_eq!(store.vertex_normals()[1], -Vector3f::z());
    }

    #[test]
    fn test_modify_vertices_rejects_row_change() {
        let (v, f) = tetrahedron();
        let mut store = MeshStore::new();
        store.set_mesh(&v, &f, None).unwrap();
        let fewer = DMatrix::<f64>::zeros(3, 3);
        assert!(matches!(store.modify_vertices(&fewer), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_modify_faces_rederives_edges() {
        let (v, f) = tetrahedron();
        let mut store = MeshStore::new();
        store.set_mesh(&v, &f, None).unwrap();

        let one = DMatrix::from_row_slice(1, 3, &[0usize, 1, 2]);
        let empty = DMatrix::<usize>::zeros(0, 2);
        assert_eq!(store.modify_faces(&one, Some(&empty)).unwrap(), MeshChange::Topology);
        assert_eq!(store.face_count(), 1);
        assert_eq!(store.edges(), &[[0, 1], [0, 2], [1, 2]]);
    }
}
