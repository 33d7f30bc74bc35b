//! The viewer facade
//!
//! [`Viewer`] owns the scene state and a [`GraphicsBackend`]. Mutations mark
//! the affected GPU mirrors dirty; once launched they are uploaded right
//! away, before that on the first frame.

use crate::camera::{Camera, ProjectionType};
use crate::config::{DisplayMode, LightingParams, ViewerConfig};
use crate::input::{InputEvent, InputState, Key, MouseButton};
use crate::plot::{PlotBuffers, PlotOverlay};
use devview_core::{
    Click, ClickOutcome, Color3, ColoringState, DMatrix, DragState, Error, LineTransparency, MeshStore,
    PointColors, PointSizes, Result, Selection, Vector3f,
};
use devview_gpu::{
    opengl_to_wgpu_matrix, DrawCall, Frame, GraphicsBackend, MeshBuffers, MeshPasses, SceneSource, SceneUniforms,
};
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

/// Quaternion chord distance within which `S` snaps to a canonical view
pub const SNAP_TOLERANCE: f32 = 1.0;

/// Window depth per pixel of vertical motion when dragging points in and out
const DEPTH_DRAG_RATE: f32 = 0.0005;

/// Camera and cursor state captured when a button goes down
#[derive(Debug, Clone)]
struct Press {
    /// Top-left origin
    cursor: [f32; 2],
    depth: f32,
    rotation: UnitQuaternion<f32>,
    translation: Vector3<f32>,
    model: Matrix4<f32>,
}

/// Interactive viewer for a single triangle mesh
pub struct Viewer<B: GraphicsBackend> {
    config: ViewerConfig,
    backend: B,
    camera: Camera,
    mesh: MeshStore,
    coloring: ColoringState,
    line_transparency: LineTransparency,
    selection: Selection,
    drag: DragState,
    buffers: MeshBuffers,
    plots: PlotOverlay,
    plot_buffers: PlotBuffers,
    plots_dirty: bool,
    input: InputState,
    press: Option<Press>,
    launched: bool,
    close_requested: bool,
    interacted: bool,
}

impl<B: GraphicsBackend> Viewer<B> {
    /// Create a viewer drawing through `backend`
    pub fn new(mut backend: B, config: ViewerConfig) -> Result<Self> {
        config.validate()?;
        backend.resize(config.width, config.height)?;

        let mut camera = Camera::new(config.width, config.height);
        camera.projection = config.projection;
        let plots = PlotOverlay {
            colors: config.plots.palette.clone(),
            background: config.plots.background,
            enabled: config.plots.enabled,
            log_scale: config.plots.log_scale,
            ..PlotOverlay::default()
        };

        Ok(Self {
            coloring: ColoringState::new(config.face_based),
            config,
            backend,
            camera,
            mesh: MeshStore::new(),
            line_transparency: LineTransparency::Disabled,
            selection: Selection::new(),
            drag: DragState::default(),
            buffers: MeshBuffers::new(),
            plots,
            plot_buffers: PlotBuffers::new(),
            plots_dirty: true,
            input: InputState::new(),
            press: None,
            launched: false,
            close_requested: false,
            interacted: false,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    // ---- mesh ----

    /// Replace the mesh; edges are derived from the faces when `None`
    pub fn set_mesh(
        &mut self,
        vertices: &DMatrix<f64>,
        faces: &DMatrix<usize>,
        edges: Option<&DMatrix<usize>>,
    ) -> Result<()> {
        self.mesh.set_mesh(vertices, faces, edges)?;
        self.after_topology_change();
        log::info!(
            "Loaded mesh with {} vertices, {} faces and {} edges",
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.mesh.edge_count()
        );
        self.sync_if_launched()
    }

    /// Move the vertices; topology buffers are kept
    pub fn modify_vertices(&mut self, vertices: &DMatrix<f64>) -> Result<()> {
        self.mesh.modify_vertices(vertices)?;
        if self.coloring.default_color_used() {
            self.coloring
                .after_vertex_update(self.mesh.vertex_count(), self.mesh.face_count());
            self.buffers.mark_colors_dirty();
        }
        self.buffers.mark_positions_dirty();
        self.sync_if_launched()
    }

    /// Replace the faces and optionally the edges
    pub fn modify_faces(&mut self, faces: &DMatrix<usize>, edges: Option<&DMatrix<usize>>) -> Result<()> {
        self.mesh.modify_faces(faces, edges)?;
        self.after_topology_change();
        self.sync_if_launched()
    }

    fn after_topology_change(&mut self) {
        self.line_transparency = LineTransparency::Disabled;
        self.coloring
            .after_topology_change(self.mesh.vertex_count(), self.mesh.face_count());
        if self.selection.retain_valid(self.mesh.vertex_count()) {
            self.drag.stop();
        }
        self.buffers.mark_topology_dirty();
    }

    /// Vertices in working precision, in input order
    pub fn get_vertices(&self) -> DMatrix<f32> {
        self.mesh.vertices_matrix()
    }

    pub fn get_faces(&self) -> &[[u32; 3]] {
        self.mesh.faces()
    }

    pub fn get_edges(&self) -> &[[u32; 2]] {
        self.mesh.edges()
    }

    pub fn mesh(&self) -> &MeshStore {
        &self.mesh
    }

    // ---- coloring ----

    /// Base colors per vertex, face or corner
    pub fn set_colors(&mut self, colors: &DMatrix<f64>) -> Result<()> {
        let layout = self
            .coloring
            .set_colors(colors, self.mesh.vertex_count(), self.mesh.face_count())?;
        log::debug!("Set {:?} colors", layout);
        self.buffers.mark_colors_dirty();
        self.sync_if_launched()
    }

    pub fn set_colors_uniform(&mut self, color: Color3) -> Result<()> {
        self.coloring
            .set_uniform(color, self.mesh.vertex_count(), self.mesh.face_count());
        self.buffers.mark_colors_dirty();
        self.sync_if_launched()
    }

    pub fn set_colors_full(
        &mut self,
        ambient: &DMatrix<f64>,
        specular: &DMatrix<f64>,
        diffuse: &DMatrix<f64>,
    ) -> Result<()> {
        self.coloring.set_colors_full(
            ambient,
            specular,
            diffuse,
            self.mesh.vertex_count(),
            self.mesh.face_count(),
        )?;
        self.buffers.mark_colors_dirty();
        self.sync_if_launched()
    }

    pub fn set_face_based_coloring(&mut self, enabled: bool) -> Result<()> {
        self.coloring
            .set_face_based(enabled, self.mesh.vertex_count(), self.mesh.faces());
        self.buffers.mark_colors_dirty();
        self.sync_if_launched()
    }

    pub fn coloring(&self) -> &ColoringState {
        &self.coloring
    }

    /// One transparency value per edge
    pub fn set_line_transparency(&mut self, values: &[f32]) -> Result<()> {
        self.line_transparency = LineTransparency::enable(values, self.mesh.edge_count())?;
        self.buffers.mark_line_transparency_dirty();
        self.sync_if_launched()
    }

    pub fn disable_line_transparency(&mut self) -> Result<()> {
        self.line_transparency = LineTransparency::Disabled;
        self.buffers.mark_line_transparency_dirty();
        self.sync_if_launched()
    }

    pub fn line_transparency(&self) -> &LineTransparency {
        &self.line_transparency
    }

    // ---- selection ----

    /// Replace the marked points, clearing flags and translations
    pub fn set_marked_points(&mut self, indices: &[usize]) -> Result<()> {
        self.selection
            .set_marked_points(indices, self.mesh.vertex_count())?;
        self.drag.stop();
        self.buffers.mark_points_dirty();
        self.sync_if_launched()
    }

    pub fn set_important_points(&mut self, flags: &[bool]) -> Result<()> {
        self.selection.set_important(flags)?;
        self.buffers.mark_points_dirty();
        self.sync_if_launched()
    }

    pub fn marked_points(&self) -> &[usize] {
        self.selection.marked_points()
    }

    pub fn important_points(&self) -> &[bool] {
        self.selection.important()
    }

    pub fn selected_points(&self) -> &[bool] {
        self.selection.selected()
    }

    /// Drag offsets accumulated per marked point
    pub fn point_translations(&self) -> &[Vector3f] {
        self.selection.translations()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn stop_dragging(&mut self) {
        self.drag.stop();
    }

    pub fn set_dragging_enabled(&mut self, enabled: bool) {
        self.config.dragging_enabled = enabled;
        if !enabled {
            self.drag.stop();
        }
    }

    pub fn set_rotation_enabled(&mut self, enabled: bool) {
        self.config.rotation_enabled = enabled;
    }

    // ---- appearance ----

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.config.display_mode = mode;
    }

    pub fn set_projection(&mut self, projection: ProjectionType) {
        self.config.projection = projection;
        self.camera.projection = projection;
    }

    pub fn set_lighting(&mut self, lighting: LightingParams) {
        self.config.lighting = lighting;
    }

    pub fn set_point_sizes(&mut self, sizes: PointSizes) -> Result<()> {
        let valid = [sizes.normal, sizes.important, sizes.selected]
            .iter()
            .all(|s| s.is_finite() && *s > 0.0);
        if !valid {
            return Err(Error::InvalidInput(format!("Point sizes must be positive, got {:?}", sizes)));
        }
        self.config.point_sizes = sizes;
        Ok(())
    }

    pub fn set_point_colors(&mut self, colors: PointColors) {
        self.config.point_colors = colors;
    }

    pub fn set_background_color(&mut self, color: Color3) {
        self.config.background = color;
    }

    pub fn set_wire_color(&mut self, color: Color3) {
        self.config.wire_color = color;
    }

    // ---- plots ----

    /// Replace titles and series together
    pub fn set_plots(&mut self, titles: Vec<String>, series: Vec<Vec<f64>>) -> Result<()> {
        if titles.len() != series.len() {
            return Err(Error::InvalidInput(format!(
                "Got {} plot titles for {} series",
                titles.len(),
                series.len()
            )));
        }
        self.plots.titles = titles;
        self.plots.series = series;
        self.plots_dirty = true;
        Ok(())
    }

    pub fn set_plot_titles(&mut self, titles: Vec<String>) {
        self.plots.titles = titles;
    }

    pub fn set_plot_series(&mut self, series: Vec<Vec<f64>>) {
        self.plots.series = series;
        self.plots_dirty = true;
    }

    pub fn set_plot_colors(&mut self, colors: Vec<Color3>) {
        self.plots.colors = colors;
        self.plots_dirty = true;
    }

    pub fn set_plotting_enabled(&mut self, enabled: bool) {
        self.plots.enabled = enabled;
    }

    pub fn set_plotting_log_scale(&mut self, log_scale: bool) {
        self.plots.log_scale = log_scale;
        self.plots_dirty = true;
    }

    pub fn plots(&self) -> &PlotOverlay {
        &self.plots
    }

    // ---- camera helpers ----

    /// Current model matrix, including the mesh centering
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.camera.model_matrix(&self.mesh.initial_shift())
    }

    /// Window coordinates (bottom-left origin, depth in `[0, 1]`) of a mesh-space point
    pub fn project(&self, point: &Point3<f32>) -> Vector3<f32> {
        self.camera.project(point, &self.model_matrix())
    }

    pub fn unproject(&self, window: &Vector3<f32>) -> Option<Point3<f32>> {
        self.camera.unproject(window, &self.model_matrix())
    }

    pub fn snap_to_canonical_view(&mut self) -> bool {
        self.camera.snap_to_canonical(SNAP_TOLERANCE)
    }

    // ---- lifecycle ----

    /// Upload everything and draw the first frame
    pub fn launch(&mut self) -> Result<()> {
        self.launched = true;
        self.close_requested = false;
        self.render_frame()?;
        log::info!("Viewer launched ({}x{})", self.config.width, self.config.height);
        Ok(())
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }

    /// Ask the render loop to stop after the current frame
    pub fn exit(&mut self) {
        self.close_requested = true;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Whether the user dragged or clicked since the last call
    pub fn take_interaction(&mut self) -> bool {
        let happened = self.interacted || self.drag.is_dragging();
        self.interacted = false;
        happened
    }

    fn sync_if_launched(&mut self) -> Result<()> {
        if self.launched {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if self.mesh.is_loaded() {
            let source = SceneSource {
                mesh: &self.mesh,
                coloring: &self.coloring,
                line_transparency: &self.line_transparency,
                selection: &self.selection,
            };
            self.buffers.sync(&mut self.backend, source)?;
        }
        if self.plots_dirty {
            self.plot_buffers.update(&mut self.backend, &self.plots)?;
            self.plots_dirty = false;
        }
        Ok(())
    }

    fn uniforms(&self) -> SceneUniforms {
        let (width, height) = self.camera.viewport();
        let lighting = &self.config.lighting;
        let colors = &self.config.point_colors;
        let sizes = &self.config.point_sizes;
        SceneUniforms {
            model: self.model_matrix().into(),
            view: self.camera.view_matrix().into(),
            proj: (opengl_to_wgpu_matrix() * self.camera.projection_matrix()).into(),
            light_position: lighting.position,
            lighting_factor: lighting.factor,
            wire_color: self.config.wire_color,
            shininess: lighting.shininess,
            fill_color: colors.fill,
            cel_shading: u32::from(lighting.cel_shading),
            important_color: colors.important,
            point_size: sizes.normal,
            selected_color: colors.selected,
            important_size: sizes.important,
            outline_color: colors.outline,
            selected_size: sizes.selected,
            viewport: [width as f32, height as f32],
            _padding: [0.0; 2],
        }
    }

    /// Draw calls of one frame: mesh passes, markers, then plots
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        let mode = self.config.display_mode;
        let mut draws = self.buffers.draw_calls(MeshPasses {
            fill: mode.fill_program(),
            lines: mode.draws_lines(),
            points: true,
        });
        if self.plots.enabled {
            draws.extend(self.plot_buffers.draw_calls());
        }
        draws
    }

    /// Upload pending changes and submit one frame
    pub fn render_frame(&mut self) -> Result<()> {
        self.sync()?;
        self.backend.write_uniforms(&self.uniforms())?;
        let frame = Frame {
            clear_color: self.config.background,
            draws: self.draw_calls(),
        };
        self.backend.submit_frame(&frame)
    }

    // ---- input ----

    /// Apply one input event; keys are left to [`Viewer::handle_key`]
    pub fn handle_event(&mut self, event: &InputEvent) -> Result<()> {
        self.input.apply(event);
        match *event {
            InputEvent::CursorMoved { .. } => self.mouse_move(),
            InputEvent::MouseInput { button, pressed: true } => self.mouse_down(button)?,
            InputEvent::MouseInput { button, pressed: false } => self.mouse_up(button),
            InputEvent::Scroll { delta } => {
                self.camera.scroll_zoom(delta, self.input.modifiers.ctrl);
            }
            InputEvent::Resized { width, height } => self.resize(width, height)?,
            InputEvent::CloseRequested => self.exit(),
            InputEvent::ModifiersChanged(_) | InputEvent::KeyInput { .. } => {}
        }
        Ok(())
    }

    /// Record an event in the input state without acting on it
    pub fn track_input(&mut self, event: &InputEvent) {
        self.input.apply(event);
    }

    /// Built-in key bindings; returns `true` if the key was used
    pub fn handle_key(&mut self, key: &Key) -> bool {
        match key {
            Key::Escape => {
                self.exit();
                true
            }
            k if k.is_char('s') => {
                self.snap_to_canonical_view();
                true
            }
            _ => false,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.config.width = width;
        self.config.height = height;
        self.camera.set_viewport(width, height);
        self.backend.resize(width, height)
    }

    fn mouse_down(&mut self, button: MouseButton) -> Result<()> {
        if button == MouseButton::Right {
            return Ok(());
        }
        let model = self.model_matrix();
        let depth = self.camera.project(&self.mesh.centroid(), &model).z;
        let cursor = self.input.cursor;
        self.press = Some(Press {
            cursor,
            depth,
            rotation: self.camera.rotation,
            translation: self.camera.translation,
            model,
        });

        let outcome = self.resolve_click()?;
        if outcome != ClickOutcome::Ignored {
            self.interacted = true;
            self.buffers.mark_points_dirty();
        }
        if button == MouseButton::Left {
            let (_, height) = self.camera.viewport();
            let press_cursor = [cursor[0], height as f32 - cursor[1]];
            self.drag
                .begin(outcome, self.config.dragging_enabled, &self.selection, press_cursor, depth);
        }
        Ok(())
    }

    fn mouse_up(&mut self, button: MouseButton) {
        if button == MouseButton::Right {
            return;
        }
        self.drag.stop();
        if !self.input.is_pressed(MouseButton::Left) && !self.input.is_pressed(MouseButton::Middle) {
            self.press = None;
        }
    }

    /// Pick against the last rendered frame
    fn resolve_click(&mut self) -> Result<ClickOutcome> {
        if !self.launched || !self.mesh.is_loaded() {
            return Ok(ClickOutcome::Ignored);
        }
        let model = self.model_matrix();
        let vertices = self.mesh.vertices();
        let screen: Vec<[f32; 2]> = self
            .selection
            .marked_points()
            .iter()
            .map(|&i| {
                let w = self.camera.project(&vertices[i], &model);
                [w.x, w.y]
            })
            .collect();
        let (width, height) = self.camera.viewport();
        let click = Click {
            cursor: self.input.cursor,
            window_size: [width, height],
            extend: self.input.modifiers.shift,
        };
        let outcome = self.selection.resolve_click(
            &screen,
            click,
            &mut self.backend,
            &self.config.point_sizes,
            &self.config.point_colors,
        )?;
        log::debug!("Click at {:?}: {:?}", click.cursor, outcome);
        Ok(outcome)
    }

    fn mouse_move(&mut self) {
        let Some(press) = self.press.clone() else {
            return;
        };
        let left = self.input.is_pressed(MouseButton::Left);
        let middle = self.input.is_pressed(MouseButton::Middle);
        if !left && !middle {
            return;
        }
        let along_depth = middle || (left && self.input.modifiers.ctrl);
        let (_, height) = self.camera.viewport();
        let h = height as f32;
        let [cx, cy] = self.input.cursor;
        let [dx, dy] = press.cursor;

        let unproject = |x: f32, y: f32, z: f32| self.camera.unproject(&Vector3::new(x, y, z), &press.model);
        let planar = || match (unproject(cx, h - cy, press.depth), unproject(dx, h - dy, press.depth)) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };

        match (self.drag.is_dragging(), along_depth) {
            (false, true) => {
                if let Some(delta) = planar() {
                    self.camera.translation = press.translation + delta;
                }
            }
            (false, false) => {
                if self.config.rotation_enabled {
                    self.camera.trackball(press.rotation, press.cursor, self.input.cursor);
                }
            }
            (true, false) => {
                if let Some(delta) = planar() {
                    self.drag_selected(delta);
                }
            }
            (true, true) => {
                let near = unproject(dx, h - dy, DEPTH_DRAG_RATE * dy);
                let far = unproject(dx, h - dy, DEPTH_DRAG_RATE * cy);
                if let (Some(a), Some(b)) = (far, near) {
                    self.drag_selected(a - b);
                }
            }
        }
    }

    fn drag_selected(&mut self, delta: Vector3f) {
        if let Some(gesture) = self.drag.gesture() {
            self.selection.apply_drag(&gesture.baseline, delta);
            self.interacted = true;
        }
    }
}
