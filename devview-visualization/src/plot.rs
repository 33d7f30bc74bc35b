//! Inset line plots for optimizer convergence metrics

use devview_core::{rgb8, Color3, Result};
use devview_gpu::{BufferHandle, BufferUsage, DrawCall, GraphicsBackend, Program};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Color of series past the end of the palette
pub const FALLBACK_SERIES_COLOR: Color3 = [0.1, 0.1, 0.1];

/// Shift applied below the minimum before taking logarithms
const LOG_OFFSET: f64 = 0.1;

/// Default qualitative palette, one color per series
pub fn default_palette() -> Vec<Color3> {
    vec![
        rgb8(31, 120, 180),
        rgb8(51, 160, 44),
        rgb8(227, 26, 28),
        rgb8(255, 127, 0),
        rgb8(106, 61, 154),
        rgb8(177, 89, 40),
        rgb8(166, 206, 227),
        rgb8(178, 223, 138),
        rgb8(251, 154, 153),
        rgb8(253, 191, 111),
        rgb8(202, 178, 214),
        rgb8(255, 255, 153),
    ]
}

/// Inset rectangle in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotRect {
    pub corner: [f32; 2],
    pub width: f32,
    pub height: f32,
}

impl Default for PlotRect {
    fn default() -> Self {
        Self {
            corner: [-0.9, -0.9],
            width: 1.8,
            height: 0.4,
        }
    }
}

impl PlotRect {
    /// Two triangles covering the rectangle
    pub fn triangles(&self) -> [[f32; 2]; 6] {
        let [x, y] = self.corner;
        let (w, h) = (self.width, self.height);
        [
            [x, y],
            [x + w, y],
            [x, y + h],
            [x + w, y],
            [x + w, y + h],
            [x, y + h],
        ]
    }
}

/// A run of line-strip vertices belonging to one series
#[derive(Debug, Clone, PartialEq)]
pub struct PlotChunk {
    /// Index of the series this chunk draws
    pub series: usize,
    pub vertices: Range<u32>,
}

/// Vertex data for all series, ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotLayout {
    pub lines: Vec<[f32; 2]>,
    pub chunks: Vec<PlotChunk>,
}

/// Map one series into the rectangle
pub fn series_vertices(values: &[f64], rect: &PlotRect, log_scale: bool) -> Vec<[f32; 2]> {
    if values.is_empty() {
        return Vec::new();
    }
    let w = rect.width as f64;
    let h = rect.height as f64;
    let [cx, cy] = rect.corner.map(f64::from);

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // constant series sit on the baseline
    let flat = max <= min;
    if log_scale {
        min -= LOG_OFFSET;
    }
    let scale = if log_scale {
        ((max - min).ln() - LOG_OFFSET.ln()) / 0.9
    } else {
        (max - min) / 0.9
    };

    let last = values.len().saturating_sub(1).max(1) as f64;
    values
        .iter()
        .enumerate()
        .map(|(j, &v)| {
            let progress = 0.96 * j as f64 / last;
            let span = if log_scale {
                (v - min).ln() - LOG_OFFSET.ln()
            } else {
                v - min
            };
            let rise = if flat || scale <= f64::EPSILON { 0.0 } else { h / scale * span };
            [
                (w * 0.02 + cx + progress * w) as f32,
                (h * 0.05 + cy + rise) as f32,
            ]
        })
        .collect()
}

/// Lay out every non-empty series back to back
pub fn layout_series(series: &[Vec<f64>], rect: &PlotRect, log_scale: bool) -> PlotLayout {
    let mut layout = PlotLayout::default();
    for (i, values) in series.iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        let start = layout.lines.len() as u32;
        layout.lines.extend(series_vertices(values, rect, log_scale));
        layout.chunks.push(PlotChunk {
            series: i,
            vertices: start..layout.lines.len() as u32,
        });
    }
    layout
}

/// Named series plus their presentation
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOverlay {
    pub titles: Vec<String>,
    pub series: Vec<Vec<f64>>,
    pub colors: Vec<Color3>,
    pub background: Color3,
    pub rect: PlotRect,
    pub enabled: bool,
    pub log_scale: bool,
}

impl Default for PlotOverlay {
    fn default() -> Self {
        Self {
            titles: Vec::new(),
            series: Vec::new(),
            colors: default_palette(),
            background: [0.97, 0.97, 0.97],
            rect: PlotRect::default(),
            enabled: false,
            log_scale: false,
        }
    }
}

impl PlotOverlay {
    /// Color of series `i`
    pub fn series_color(&self, i: usize) -> Color3 {
        self.colors.get(i).copied().unwrap_or(FALLBACK_SERIES_COLOR)
    }

    pub fn layout(&self) -> PlotLayout {
        layout_series(&self.series, &self.rect, self.log_scale)
    }
}

/// GPU buffers for the overlay
#[derive(Debug, Default)]
pub struct PlotBuffers {
    background: Option<BufferHandle>,
    lines: Option<BufferHandle>,
    colors: Option<BufferHandle>,
    chunks: Vec<PlotChunk>,
}

fn ensure<B: GraphicsBackend + ?Sized>(
    slot: &mut Option<BufferHandle>,
    backend: &mut B,
    label: &str,
) -> Result<BufferHandle> {
    match *slot {
        Some(h) => Ok(h),
        None => {
            let h = backend.create_buffer(label, BufferUsage::Vertex)?;
            *slot = Some(h);
            Ok(h)
        }
    }
}

impl PlotBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-upload the overlay; line data is written chunk by chunk at its offset
    pub fn update<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B, overlay: &PlotOverlay) -> Result<()> {
        let background = ensure(&mut self.background, backend, "plot background")?;
        let lines = ensure(&mut self.lines, backend, "plot lines")?;
        let colors = ensure(&mut self.colors, backend, "plot colors")?;

        backend.upload(background, bytemuck::cast_slice(&overlay.rect.triangles()))?;

        let mut palette = vec![overlay.background];
        palette.extend((0..overlay.series.len()).map(|i| overlay.series_color(i)));
        backend.upload(colors, bytemuck::cast_slice(&palette))?;

        let layout = overlay.layout();
        let vertex_size = std::mem::size_of::<[f32; 2]>() as u64;
        backend.allocate_buffer(lines, layout.lines.len() as u64 * vertex_size)?;
        for chunk in &layout.chunks {
            let range = chunk.vertices.start as usize..chunk.vertices.end as usize;
            backend.write_buffer(
                lines,
                chunk.vertices.start as u64 * vertex_size,
                bytemuck::cast_slice(&layout.lines[range]),
            )?;
        }
        log::debug!("Updated plots: {} series, {} vertices", layout.chunks.len(), layout.lines.len());
        self.chunks = layout.chunks;
        Ok(())
    }

    pub fn chunks(&self) -> &[PlotChunk] {
        &self.chunks
    }

    pub fn lines_buffer(&self) -> Option<BufferHandle> {
        self.lines
    }

    /// Background quad then one line strip per series
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        let (Some(background), Some(lines), Some(colors)) = (self.background, self.lines, self.colors) else {
            return Vec::new();
        };
        let mut draws = vec![DrawCall::arrays(Program::PlotBackground, vec![background, colors], 0..6, 0..1)];
        for chunk in &self.chunks {
            let color = chunk.series as u32 + 1;
            draws.push(DrawCall::arrays(
                Program::PlotLines,
                vec![lines, colors],
                chunk.vertices.clone(),
                color..color + 1,
            ));
        }
        draws
    }
}
