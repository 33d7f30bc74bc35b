//! Marked points, click resolution and drag gestures
//!
//! Clicks are resolved without ray casting: a marked point is hit when the
//! cursor lies within its rendered radius and the already-rendered pixel
//! under the cursor carries the color that point is drawn with. Anything
//! drawn on top of the marker changes that pixel, so the color doubles as an
//! occlusion test. Two markers drawn with the same color on the same pixel
//! cannot be told apart.

use crate::error::{Error, Result};
use crate::point::{rgb8, Color3, Vector3f};
use serde::{Deserialize, Serialize};

/// Extra pixels around a marker that still count as a hit
pub const CLICK_TOLERANCE_PX: f32 = 2.0;

/// Per-channel tolerance when comparing a read-back pixel to a marker color
///
/// Read-back goes through an 8-bit target, so exact float equality is never
/// reached; 1.5 steps absorbs rounding on either side.
pub const COLOR_MATCH_TOLERANCE: f32 = 1.5 / 255.0;

/// Marker radii in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSizes {
    pub normal: f32,
    pub important: f32,
    pub selected: f32,
}

impl PointSizes {
    /// Same size for normal and important points, selected ones a third larger
    pub fn uniform(size: f32) -> Self {
        Self {
            normal: size,
            important: size,
            selected: 4.0 / 3.0 * size,
        }
    }
}

impl Default for PointSizes {
    fn default() -> Self {
        Self::uniform(6.0)
    }
}

/// Marker colors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointColors {
    pub outline: Color3,
    pub fill: Color3,
    pub important: Color3,
    pub selected: Color3,
}

impl Default for PointColors {
    fn default() -> Self {
        Self {
            outline: [0.0, 0.0, 0.0],
            fill: rgb8(255, 255, 179),
            important: rgb8(141, 211, 199),
            selected: rgb8(225, 26, 39),
        }
    }
}

/// Access to the color of an already-rendered pixel
///
/// Coordinates use a bottom-left origin.
pub trait PixelSource {
    fn read_pixel(&mut self, x: u32, y: u32) -> Result<Color3>;
}

/// Cursor and window state at the moment of a click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    /// Cursor in window coordinates (top-left origin)
    pub cursor: [f32; 2],
    pub window_size: [u32; 2],
    /// Whether the extend-selection modifier is held
    pub extend: bool,
}

/// Result of resolving a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Outside the window or no marked points
    Ignored,
    /// At least one point was selected
    Hit,
    /// Nothing under the cursor; the selection was cleared
    Missed,
}

/// Marked vertices with their importance, selection and drag translation
#[derive(Debug, Clone, Default)]
pub struct Selection {
    marked: Vec<usize>,
    important: Vec<bool>,
    selected: Vec<bool>,
    translations: Vec<Vector3f>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the marked points, resetting flags and translations
    pub fn set_marked_points(&mut self, indices: &[usize], vertex_count: usize) -> Result<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::invalid(format!(
                "Marked point {bad} is out of range for {vertex_count} vertices"
            )));
        }
        let n = indices.len();
        self.marked = indices.to_vec();
        self.important = vec![false; n];
        self.selected = vec![false; n];
        self.translations = vec![Vector3f::zeros(); n];
        log::debug!("Marked {n} points");
        Ok(())
    }

    pub fn set_important(&mut self, flags: &[bool]) -> Result<()> {
        if flags.len() != self.marked.len() {
            return Err(Error::invalid(format!(
                "Expected {} important flags, got {}",
                self.marked.len(),
                flags.len()
            )));
        }
        self.important = flags.to_vec();
        Ok(())
    }

    /// Drop all marks when any no longer indexes a vertex; returns `true` if dropped
    pub fn retain_valid(&mut self, vertex_count: usize) -> bool {
        if self.marked.iter().all(|&i| i < vertex_count) {
            return false;
        }
        log::warn!("Marked points exceed the new vertex count ({vertex_count}), clearing them");
        *self = Self::default();
        true
    }

    pub fn marked_points(&self) -> &[usize] {
        &self.marked
    }

    pub fn important(&self) -> &[bool] {
        &self.important
    }

    pub fn selected(&self) -> &[bool] {
        &self.selected
    }

    pub fn translations(&self) -> &[Vector3f] {
        &self.translations
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    pub fn any_selected(&self) -> bool {
        self.selected.iter().any(|&s| s)
    }

    pub fn clear_selection(&mut self) {
        self.selected.iter_mut().for_each(|s| *s = false);
    }

    /// Per-point flag word for the marker shader: bit 0 important, bit 1 selected
    pub fn point_flags(&self) -> Vec<u32> {
        self.important
            .iter()
            .zip(&self.selected)
            .map(|(&imp, &sel)| u32::from(imp) | (u32::from(sel) << 1))
            .collect()
    }

    /// Radii and colors a point may legitimately be matched against
    fn appearances(&self, i: usize, sizes: &PointSizes, colors: &PointColors) -> Vec<(f32, Color3)> {
        let (imp, sel) = (self.important[i], self.selected[i]);
        let mut out = Vec::with_capacity(3);
        if !(imp && sel) {
            out.push((sizes.normal, colors.fill));
        }
        if imp {
            out.push((sizes.important, colors.important));
        }
        if sel {
            out.push((sizes.selected, colors.selected));
        }
        out
    }

    /// Resolve a primary/tertiary click against the marked points
    ///
    /// `screen` holds each marked point projected to window coordinates with
    /// a bottom-left origin, in marked-point order.
    pub fn resolve_click(
        &mut self,
        screen: &[[f32; 2]],
        click: Click,
        pixels: &mut dyn PixelSource,
        sizes: &PointSizes,
        colors: &PointColors,
    ) -> Result<ClickOutcome> {
        let [w, h] = click.window_size;
        let [x, y] = click.cursor;
        if x < 0.0 || y < 0.0 || x > w as f32 || y > h as f32 || w == 0 || h == 0 {
            return Ok(ClickOutcome::Ignored);
        }
        if self.marked.is_empty() {
            return Ok(ClickOutcome::Ignored);
        }
        if screen.len() != self.marked.len() {
            return Err(Error::invalid(format!(
                "Expected {} projected points, got {}",
                self.marked.len(),
                screen.len()
            )));
        }

        let y = h as f32 - y;
        let px = (x as u32).min(w - 1);
        let py = (y as u32).min(h - 1);

        let mut pixel: Option<Color3> = None;
        let mut hit = false;
        for (i, p) in screen.iter().enumerate() {
            let dist = ((p[0] - x).powi(2) + (p[1] - y).powi(2)).sqrt();
            let looks = self.appearances(i, sizes, colors);
            if !looks.iter().any(|(r, _)| dist < r + CLICK_TOLERANCE_PX) {
                continue;
            }
            let rendered = match pixel {
                Some(c) => c,
                None => {
                    let c = pixels.read_pixel(px, py)?;
                    pixel = Some(c);
                    c
                }
            };
            if !looks.iter().any(|(_, c)| colors_match(rendered, *c)) {
                continue;
            }

            if !click.extend && !self.selected[i] {
                self.clear_selection();
            }
            self.selected[i] = true;
            hit = true;
        }

        if hit {
            Ok(ClickOutcome::Hit)
        } else {
            self.clear_selection();
            Ok(ClickOutcome::Missed)
        }
    }

    /// Move every selected point to its press-time translation plus `delta`
    pub fn apply_drag(&mut self, baseline: &[Vector3f], delta: Vector3f) {
        for ((t, base), &sel) in self
            .translations
            .iter_mut()
            .zip(baseline)
            .zip(&self.selected)
        {
            if sel {
                *t = base + delta;
            }
        }
    }
}

/// Whether two colors agree within [`COLOR_MATCH_TOLERANCE`] on every channel
pub fn colors_match(a: Color3, b: Color3) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= COLOR_MATCH_TOLERANCE)
}

/// A drag in progress, captured at button press
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    /// Press position in window coordinates (bottom-left origin)
    pub press_cursor: [f32; 2],
    /// Window-space depth of the mesh centroid at press time
    pub depth: f32,
    /// Translations of all marked points at press time
    pub baseline: Vec<Vector3f>,
}

/// Point dragging state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragGesture),
}

impl DragState {
    /// Enter `Dragging` if dragging is enabled and the click selected something
    pub fn begin(
        &mut self,
        outcome: ClickOutcome,
        enabled: bool,
        selection: &Selection,
        press_cursor: [f32; 2],
        depth: f32,
    ) -> bool {
        if !enabled || outcome != ClickOutcome::Hit || !selection.any_selected() {
            return false;
        }
        *self = DragState::Dragging(DragGesture {
            press_cursor,
            depth,
            baseline: selection.translations().to_vec(),
        });
        log::debug!("Drag started");
        true
    }

    pub fn stop(&mut self) {
        if self.is_dragging() {
            log::debug!("Drag stopped");
        }
        *self = DragState::Idle;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging(_))
    }

    pub fn gesture(&self) -> Option<&DragGesture> {
        match self {
            DragState::Dragging(g) => Some(g),
            DragState::Idle => None,
        }
    }
}
