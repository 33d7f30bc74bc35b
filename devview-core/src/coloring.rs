//! Coloring state: shading color arrays, face/vertex mode and line transparency

use crate::error::{Error, Result};
use crate::point::{rgb8, Color3};
use nalgebra::DMatrix;

/// Color applied until the user sets colors explicitly
pub fn default_color() -> Color3 {
    rgb8(0, 118, 189)
}

/// How the rows of a color array map onto the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLayout {
    /// One row per vertex
    PerVertex,
    /// One row per face, broadcast to its three corners
    PerFace,
    /// One row per face corner (`3 × faces`)
    PerCorner,
}

impl ColorLayout {
    /// Classify a row count against the current topology
    ///
    /// Face sizes take precedence when the vertex and face counts coincide.
    pub fn classify(rows: usize, vertex_count: usize, face_count: usize) -> Option<Self> {
        if rows == 0 {
            None
        } else if rows == face_count {
            Some(ColorLayout::PerFace)
        } else if rows == 3 * face_count {
            Some(ColorLayout::PerCorner)
        } else if rows == vertex_count {
            Some(ColorLayout::PerVertex)
        } else {
            None
        }
    }

    /// Row count this layout needs for the given topology
    pub fn expected_rows(self, vertex_count: usize, face_count: usize) -> usize {
        match self {
            ColorLayout::PerVertex => vertex_count,
            ColorLayout::PerFace => face_count,
            ColorLayout::PerCorner => 3 * face_count,
        }
    }

    pub fn is_face_sized(self) -> bool {
        !matches!(self, ColorLayout::PerVertex)
    }
}

/// Ambient, specular and diffuse arrays of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadingColors {
    pub ambient: Vec<Color3>,
    pub specular: Vec<Color3>,
    pub diffuse: Vec<Color3>,
}

impl ShadingColors {
    /// Derive the three shading arrays from base colors
    pub fn from_base(base: &[Color3]) -> Self {
        let map = |f: fn(f32) -> f32| -> Vec<Color3> {
            base.iter().map(|c| [f(c[0]), f(c[1]), f(c[2])]).collect()
        };
        Self {
            ambient: map(|c| 0.4 * c),
            specular: map(|c| 0.3 + 0.2 * (c - 0.3)),
            diffuse: base.to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.diffuse.len()
    }
}

/// Current coloring of the mesh
#[derive(Debug, Clone)]
pub struct ColoringState {
    face_based: bool,
    colors: ShadingColors,
    source: ColorLayout,
    default_color_used: bool,
}

impl Default for ColoringState {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ColoringState {
    pub fn new(face_based: bool) -> Self {
        Self {
            face_based,
            colors: ShadingColors::default(),
            source: ColorLayout::PerVertex,
            default_color_used: true,
        }
    }

    pub fn face_based(&self) -> bool {
        self.face_based
    }

    pub fn default_color_used(&self) -> bool {
        self.default_color_used
    }

    pub fn colors(&self) -> &ShadingColors {
        &self.colors
    }

    /// Layout of the stored arrays, or `None` once their rows no longer fit the topology
    ///
    /// The layout is fixed when the colors are stored, so vertex-sized colors
    /// stay per-vertex even when the vertex and face counts coincide.
    pub fn layout(&self, vertex_count: usize, face_count: usize) -> Option<ColorLayout> {
        let rows = self.colors.rows();
        (rows > 0 && rows == self.source.expected_rows(vertex_count, face_count)).then_some(self.source)
    }

    fn uniform_layout(&self) -> ColorLayout {
        if self.face_based {
            ColorLayout::PerFace
        } else {
            ColorLayout::PerVertex
        }
    }

    /// Fill the arrays with the default color, sized for the current mode
    pub fn apply_default(&mut self, vertex_count: usize, face_count: usize) {
        self.source = self.uniform_layout();
        let rows = self.source.expected_rows(vertex_count, face_count);
        self.colors = ShadingColors::from_base(&vec![default_color(); rows]);
        self.default_color_used = true;
    }

    /// One color for the whole mesh
    pub fn set_uniform(&mut self, color: Color3, vertex_count: usize, face_count: usize) {
        self.source = self.uniform_layout();
        let rows = self.source.expected_rows(vertex_count, face_count);
        self.colors = ShadingColors::from_base(&vec![color; rows]);
        self.default_color_used = false;
    }

    /// Base colors, one row per vertex, face or corner
    pub fn set_colors(
        &mut self,
        colors: &DMatrix<f64>,
        vertex_count: usize,
        face_count: usize,
    ) -> Result<ColorLayout> {
        let base = colors_from_rows(colors)?;
        let layout = ColorLayout::classify(base.len(), vertex_count, face_count)
            .ok_or_else(|| row_count_error(base.len(), vertex_count, face_count))?;
        self.store(ShadingColors::from_base(&base), layout);
        Ok(layout)
    }

    /// Explicit ambient, specular and diffuse arrays
    pub fn set_colors_full(
        &mut self,
        ambient: &DMatrix<f64>,
        specular: &DMatrix<f64>,
        diffuse: &DMatrix<f64>,
        vertex_count: usize,
        face_count: usize,
    ) -> Result<ColorLayout> {
        let colors = ShadingColors {
            ambient: colors_from_rows(ambient)?,
            specular: colors_from_rows(specular)?,
            diffuse: colors_from_rows(diffuse)?,
        };
        if colors.ambient.len() != colors.diffuse.len()
            || colors.specular.len() != colors.diffuse.len()
        {
            return Err(Error::invalid(format!(
                "Ambient, specular and diffuse must have the same row count ({}, {}, {})",
                colors.ambient.len(),
                colors.specular.len(),
                colors.diffuse.len()
            )));
        }
        let layout = ColorLayout::classify(colors.rows(), vertex_count, face_count)
            .ok_or_else(|| row_count_error(colors.rows(), vertex_count, face_count))?;
        self.store(colors, layout);
        Ok(layout)
    }

    fn store(&mut self, colors: ShadingColors, layout: ColorLayout) {
        self.colors = colors;
        self.source = layout;
        self.face_based = layout.is_face_sized();
        self.default_color_used = false;
    }

    /// Switch between flat (per-face) and smooth (per-vertex) coloring
    ///
    /// Face-sized arrays are averaged onto the vertices when leaving face mode.
    pub fn set_face_based(&mut self, enabled: bool, vertex_count: usize, faces: &[[u32; 3]]) {
        if self.face_based == enabled {
            return;
        }
        self.face_based = enabled;
        if self.default_color_used {
            self.apply_default(vertex_count, faces.len());
            return;
        }
        if !enabled {
            if let Some(layout) = self.layout(vertex_count, faces.len()) {
                if layout.is_face_sized() {
                    self.colors = ShadingColors {
                        ambient: average_onto_vertices(&self.colors.ambient, layout, vertex_count, faces),
                        specular: average_onto_vertices(&self.colors.specular, layout, vertex_count, faces),
                        diffuse: average_onto_vertices(&self.colors.diffuse, layout, vertex_count, faces),
                    };
                    self.source = ColorLayout::PerVertex;
                }
            }
        }
    }

    /// Keep the default color in step with the geometry
    pub fn after_vertex_update(&mut self, vertex_count: usize, face_count: usize) {
        if self.default_color_used {
            self.apply_default(vertex_count, face_count);
        }
    }

    /// Revalidate after faces changed; returns `true` when user colors were dropped
    pub fn after_topology_change(&mut self, vertex_count: usize, face_count: usize) -> bool {
        if self.default_color_used {
            self.apply_default(vertex_count, face_count);
            return false;
        }
        match self.layout(vertex_count, face_count) {
            Some(_) => false,
            None => {
                log::warn!(
                    "Color rows ({}) no longer match the mesh, resetting to the default color",
                    self.colors.rows()
                );
                self.apply_default(vertex_count, face_count);
                true
            }
        }
    }
}

fn row_count_error(rows: usize, vertex_count: usize, face_count: usize) -> Error {
    Error::invalid(format!(
        "Color array has {rows} rows; expected {vertex_count} (vertices), {face_count} (faces) or {} (corners)",
        3 * face_count
    ))
}

/// Read an `n × 3` color matrix
pub fn colors_from_rows(m: &DMatrix<f64>) -> Result<Vec<Color3>> {
    if m.ncols() != 3 {
        return Err(Error::invalid(format!(
            "Colors must have 3 columns, got {}",
            m.ncols()
        )));
    }
    Ok(m.row_iter()
        .map(|r| [r[0] as f32, r[1] as f32, r[2] as f32])
        .collect())
}

fn average_onto_vertices(
    colors: &[Color3],
    layout: ColorLayout,
    vertex_count: usize,
    faces: &[[u32; 3]],
) -> Vec<Color3> {
    let mut sums = vec![[0.0f32; 3]; vertex_count];
    let mut counts = vec![0u32; vertex_count];
    for (fi, face) in faces.iter().enumerate() {
        for (k, &v) in face.iter().enumerate() {
            let c = match layout {
                ColorLayout::PerCorner => colors[3 * fi + k],
                _ => colors[fi],
            };
            let sum = &mut sums[v as usize];
            for ch in 0..3 {
                sum[ch] += c[ch];
            }
            counts[v as usize] += 1;
        }
    }
    sums.into_iter()
        .zip(counts)
        .map(|(sum, n)| {
            if n == 0 {
                default_color()
            } else {
                let n = n as f32;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            }
        })
        .collect()
}

/// Per-edge line transparency
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LineTransparency {
    #[default]
    Disabled,
    /// One value per edge
    Enabled(Vec<f32>),
}

impl LineTransparency {
    pub fn enable(values: &[f32], edge_count: usize) -> Result<Self> {
        if values.len() != edge_count {
            return Err(Error::invalid(format!(
                "Line transparency needs one value per edge ({edge_count}), got {}",
                values.len()
            )));
        }
        Ok(LineTransparency::Enabled(values.to_vec()))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LineTransparency::Enabled(_))
    }

    /// Contents of the line transparency buffer
    ///
    /// Enabled: two samples per edge. Otherwise opaque samples matching the
    /// edge layout in use (per edge when face-based, per vertex otherwise).
    pub fn buffer_values(&self, face_based: bool, vertex_count: usize, edge_count: usize) -> Vec<f32> {
        match self {
            LineTransparency::Enabled(values) => values.iter().flat_map(|&t| [t, t]).collect(),
            LineTransparency::Disabled if face_based => vec![1.0; 2 * edge_count],
            LineTransparency::Disabled => vec![1.0; vertex_count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FACES: [[u32; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

    #[test]
    fn test_classify_row_counts() {
        assert_eq!(ColorLayout::classify(4, 4, 2), Some(ColorLayout::PerVertex));
        assert_eq!(ColorLayout::classify(2, 4, 2), Some(ColorLayout::PerFace));
        assert_eq!(ColorLayout::classify(6, 4, 2), Some(ColorLayout::PerCorner));
        assert_eq!(ColorLayout::classify(5, 4, 2), None);
        assert_eq!(ColorLayout::classify(0, 4, 2), None);
        // Face sizes win on ties
        assert_eq!(ColorLayout::classify(3, 3, 3), Some(ColorLayout::PerFace));
    }

    #[test]
    fn test_set_colors_derives_shading() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(4, 3, &[0.5; 12]);
        assert_eq!(state.set_colors(&c, 4, 2).unwrap(), ColorLayout::PerVertex);
        assert!(!state.face_based());
        assert!(!state.default_color_used());

        let colors = state.colors();
        assert_relative_eq!(colors.ambient[0][0], 0.2);
        assert_relative_eq!(colors.specular[0][1], 0.34);
        assert_relative_eq!(colors.diffuse[3][2], 0.5);
    }

    #[test]
    fn test_face_sized_colors_switch_mode() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(state.set_colors(&c, 4, 2).unwrap(), ColorLayout::PerFace);
        assert!(state.face_based());
    }

    #[test]
    fn test_rejects_bad_rows() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(5, 3, &[0.5; 15]);
        assert!(matches!(state.set_colors(&c, 4, 2), Err(Error::InvalidInput(_))));

        let a = DMatrix::from_row_slice(4, 3, &[0.5; 12]);
        let d = DMatrix::from_row_slice(2, 3, &[0.5; 6]);
        assert!(matches!(
            state.set_colors_full(&a, &a, &d, 4, 2),
            Err(Error::InvalidInput(_))
        ));
        assert!(state.default_color_used());
    }

    #[test]
    fn test_leaving_face_mode_averages_corners() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        state.set_colors(&c, 4, 2).unwrap();
        state.set_face_based(false, 4, &FACES);

        let diffuse = &state.colors().diffuse;
        assert_eq!(diffuse.len(), 4);
        assert_relative_eq!(diffuse[0][0], 0.5);
        assert_relative_eq!(diffuse[0][2], 0.5);
        assert_relative_eq!(diffuse[1][0], 1.0);
        assert_relative_eq!(diffuse[3][2], 1.0);
    }

    #[test]
    fn test_default_color_follows_mode() {
        let mut state = ColoringState::default();
        state.apply_default(4, 2);
        assert_eq!(state.colors().rows(), 4);
        state.set_face_based(true, 4, &FACES);
        assert_eq!(state.colors().rows(), 2);
        assert!(state.default_color_used());
    }

    #[test]
    fn test_topology_change_resets_stale_colors() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(2, 3, &[0.2; 6]);
        state.set_colors(&c, 4, 2).unwrap();
        assert!(state.after_topology_change(4, 1));
        assert!(state.default_color_used());
        assert_eq!(state.colors().rows(), 1);
    }

    #[test]
    fn test_vertex_colors_stay_per_vertex_when_counts_tie() {
        // tetrahedron: four vertices and four faces
        let faces = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        let mut state = ColoringState::default();
        state.apply_default(4, 4);
        assert_eq!(state.layout(4, 4), Some(ColorLayout::PerVertex));

        state.set_face_based(true, 4, &faces);
        assert_eq!(state.layout(4, 4), Some(ColorLayout::PerFace));
        state.set_face_based(false, 4, &faces);
        assert_eq!(state.layout(4, 4), Some(ColorLayout::PerVertex));

        state.set_uniform([1.0, 0.0, 0.0], 4, 4);
        assert_eq!(state.layout(4, 4), Some(ColorLayout::PerVertex));
    }

    #[test]
    fn test_topology_change_keeps_face_mode() {
        let mut state = ColoringState::default();
        let c = DMatrix::from_row_slice(4, 3, &[0.5; 12]);
        state.set_colors(&c, 4, 2).unwrap();
        state.set_face_based(true, 4, &FACES);
        assert!(state.face_based());

        assert!(!state.after_topology_change(4, 2));
        assert!(state.face_based());
        assert_eq!(state.layout(4, 2), Some(ColorLayout::PerVertex));

        // vertex-sized colors survive a face count change too
        assert!(!state.after_topology_change(4, 1));
        assert!(state.face_based());
    }

    #[test]
    fn test_line_transparency_buffer() {
        assert!(LineTransparency::enable(&[0.5], 2).is_err());
        let lt = LineTransparency::enable(&[0.25, 0.75], 2).unwrap();
        assert_eq!(lt.buffer_values(false, 3, 2), vec![0.25, 0.25, 0.75, 0.75]);
        assert_eq!(LineTransparency::Disabled.buffer_values(true, 3, 2).len(), 4);
        assert_eq!(LineTransparency::Disabled.buffer_values(false, 3, 2).len(), 3);
    }
}
