//! Vertex and edge layouts for GPU upload
//!
//! Smooth shading shares one attribute row per vertex. Flat (face-based)
//! shading needs every triangle corner to carry its own normal and color, so
//! all attributes are duplicated to `3 × faces` rows and the face indices
//! become `[0, 1, 2], [3, 4, 5], ...`. Edges are duplicated the same way when
//! each edge needs its own transparency samples.

use devview_core::{ColorLayout, Color3, Error, Result};

/// Row layout of the fill-pass attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// One row per vertex, original face indices
    Shared,
    /// One row per face corner, sequential face indices
    PerCorner,
}

/// Row layout of the line-pass attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLayout {
    /// Lines index the shared vertex rows
    Shared,
    /// Two rows per edge, sequential edge indices
    PerEdge,
}

/// Duplicate per-vertex values onto face corners
pub fn expand_per_corner<T: Copy>(values: &[T], faces: &[[u32; 3]]) -> Vec<T> {
    faces
        .iter()
        .flat_map(|f| f.iter().map(|&v| values[v as usize]))
        .collect()
}

/// Repeat every per-face value for its three corners
pub fn repeat_per_face<T: Copy>(values: &[T]) -> Vec<T> {
    values.iter().flat_map(|&v| [v, v, v]).collect()
}

/// Duplicate per-vertex values onto edge endpoints
pub fn expand_per_edge<T: Copy>(values: &[T], edges: &[[u32; 2]]) -> Vec<T> {
    edges
        .iter()
        .flat_map(|e| [values[e[0] as usize], values[e[1] as usize]])
        .collect()
}

/// Pick the rows named by `indices`
pub fn gather<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}

/// Face index buffer for the given layout
pub fn face_indices(faces: &[[u32; 3]], layout: VertexLayout) -> Vec<u32> {
    match layout {
        VertexLayout::Shared => faces.iter().flatten().copied().collect(),
        VertexLayout::PerCorner => (0..3 * faces.len() as u32).collect(),
    }
}

/// Edge index buffer for the given layout
pub fn edge_indices(edges: &[[u32; 2]], layout: EdgeLayout) -> Vec<u32> {
    match layout {
        EdgeLayout::Shared => edges.iter().flatten().copied().collect(),
        EdgeLayout::PerEdge => (0..2 * edges.len() as u32).collect(),
    }
}

/// Color rows matching the vertex layout
///
/// Vertex-sized colors are broadcast by vertex index, face-sized colors by
/// face index, corner-sized colors are used verbatim.
pub fn expand_colors(
    colors: &[Color3],
    source: ColorLayout,
    faces: &[[u32; 3]],
    target: VertexLayout,
) -> Result<Vec<Color3>> {
    match (target, source) {
        (VertexLayout::Shared, ColorLayout::PerVertex) => Ok(colors.to_vec()),
        (VertexLayout::Shared, _) => Err(Error::InvalidInput(
            "Face-sized colors need the per-corner layout".to_string(),
        )),
        (VertexLayout::PerCorner, ColorLayout::PerVertex) => Ok(expand_per_corner(colors, faces)),
        (VertexLayout::PerCorner, ColorLayout::PerFace) => Ok(repeat_per_face(colors)),
        (VertexLayout::PerCorner, ColorLayout::PerCorner) => Ok(colors.to_vec()),
    }
}
