//! Developable Viewer Demo
//!
//! Opens a window on a wavy sheet and relaxes it with a simple smoothing
//! "solver". It shows how to:
//! - Feed geometry to the viewer and update it every frame
//! - Mark, select and drag points (the solver pins them to the dragged position)
//! - Plot convergence metrics in the overlay
//!
//! Controls: left-drag rotates or drags selected points, middle/Ctrl-drag pans
//! or moves points along the view axis, scroll zooms, S snaps the view,
//! Escape quits.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use devview_core::DMatrix;
use devview_gpu::WgpuBackend;
use devview_visualization::{
    run, DisplayMode, ProjectionType, Viewer, ViewerCallbacks, ViewerConfig, WinitEventSource,
};
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Fill,
    Wireframe,
    FillWireframe,
    Texture,
    TextureWireframe,
}

impl From<ModeArg> for DisplayMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fill => DisplayMode::Fill,
            ModeArg::Wireframe => DisplayMode::Wireframe,
            ModeArg::FillWireframe => DisplayMode::FillWireframe,
            ModeArg::Texture => DisplayMode::Texture,
            ModeArg::TextureWireframe => DisplayMode::TextureWireframe,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProjectionArg {
    Orthographic,
    Frustum,
}

#[derive(Debug, Parser)]
#[command(about = "Interactive viewer for a relaxing triangle sheet")]
struct Args {
    #[arg(long, default_value_t = 1200)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,
    #[arg(long, value_enum, default_value = "fill-wireframe")]
    mode: ModeArg,
    #[arg(long, value_enum, default_value = "frustum")]
    projection: ProjectionArg,
    /// Flat shading with per-face colors
    #[arg(long)]
    face_based: bool,
    /// Grid vertices per side
    #[arg(long, default_value_t = 24)]
    resolution: usize,
    /// Hide the convergence plots
    #[arg(long)]
    no_plots: bool,
    /// Logarithmic plot scale
    #[arg(long)]
    log_scale: bool,
}

/// Laplacian smoothing with pinned handles
struct Relaxation {
    rest: Vec<Vector3<f64>>,
    current: Vec<Vector3<f64>>,
    neighbors: Vec<Vec<usize>>,
    energy: Vec<f64>,
    displacement: Vec<f64>,
}

impl Relaxation {
    fn new(vertices: &DMatrix<f64>, edges: &[[u32; 2]]) -> Self {
        let rest: Vec<_> = vertices
            .row_iter()
            .map(|r| Vector3::new(r[0], r[1], r[2]))
            .collect();
        let mut neighbors = vec![Vec::new(); rest.len()];
        for &[a, b] in edges {
            neighbors[a as usize].push(b as usize);
            neighbors[b as usize].push(a as usize);
        }
        Self {
            current: rest.clone(),
            rest,
            neighbors,
            energy: Vec::new(),
            displacement: Vec::new(),
        }
    }

    fn converged(&self) -> bool {
        self.displacement.last().is_some_and(|&d| d < 1e-6)
    }

    /// One Jacobi sweep; `handles` maps pinned vertices to their targets
    fn step(&mut self, handles: &[(usize, Vector3<f64>)]) {
        let mut next = self.current.clone();
        let mut energy = 0.0;
        for (i, ring) in self.neighbors.iter().enumerate() {
            if ring.is_empty() {
                continue;
            }
            let average = ring.iter().map(|&j| self.current[j]).sum::<Vector3<f64>>() / ring.len() as f64;
            let offset = average - self.current[i];
            energy += offset.norm_squared();
            next[i] += 0.5 * offset;
        }
        for &(i, target) in handles {
            next[i] = target;
        }
        let displacement = next
            .iter()
            .zip(&self.current)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);

        self.current = next;
        self.energy.push(energy);
        self.displacement.push(displacement);
    }

    fn vertices(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.current.len(), 3, |r, c| self.current[r][c])
    }
}

/// Wavy `n × n` sheet over the unit square
fn sheet(n: usize) -> (DMatrix<f64>, DMatrix<usize>) {
    let n = n.max(2);
    let step = 1.0 / (n - 1) as f64;
    let vertices = DMatrix::from_fn(n * n, 3, |r, c| {
        let (x, y) = ((r % n) as f64 * step, (r / n) as f64 * step);
        match c {
            0 => x,
            1 => y,
            _ => 0.15 * (6.0 * x).sin() * (4.0 * y).cos(),
        }
    });
    let mut faces = Vec::with_capacity(2 * (n - 1) * (n - 1) * 3);
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let a = j * n + i;
            faces.extend_from_slice(&[a, a + 1, a + n + 1, a, a + n + 1, a + n]);
        }
    }
    let faces = DMatrix::from_row_slice(faces.len() / 3, 3, &faces);
    (vertices, faces)
}

/// Blue-to-orange ramp by height
fn height_colors(vertices: &DMatrix<f64>) -> DMatrix<f64> {
    let z = vertices.column(2);
    let (lo, hi) = (z.min(), z.max());
    let span = (hi - lo).max(f64::EPSILON);
    DMatrix::from_fn(vertices.nrows(), 3, |r, c| {
        let t = (z[r] - lo) / span;
        let low = [0.0, 118.0 / 255.0, 189.0 / 255.0];
        let high = [1.0, 127.0 / 255.0, 0.0];
        low[c] + t * (high[c] - low[c])
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ViewerConfig {
        title: "Developable Viewer".to_string(),
        width: args.width,
        height: args.height,
        display_mode: args.mode.into(),
        projection: match args.projection {
            ProjectionArg::Orthographic => ProjectionType::Orthographic,
            ProjectionArg::Frustum => ProjectionType::Frustum,
        },
        face_based: args.face_based,
        ..ViewerConfig::default()
    };
    config.validate().context("invalid viewer configuration")?;

    let mut events = WinitEventSource::new()?;
    let window = events.create_window(&config.title, config.width, config.height)?;
    let backend = pollster::block_on(WgpuBackend::new(&window)).context("failed to initialize wgpu")?;

    let (vertices, faces) = sheet(args.resolution);
    let n = args.resolution.max(2);
    let corners = [0, n - 1, n * (n - 1), n * n - 1];

    let mut viewer = Viewer::new(backend, config)?;
    viewer.set_mesh(&vertices, &faces, None)?;
    viewer.set_colors(&height_colors(&vertices))?;
    viewer.set_face_based_coloring(args.face_based)?;
    viewer.set_marked_points(&corners)?;
    viewer.set_important_points(&[true, false, false, true])?;
    viewer.set_plots(
        vec!["smoothing energy".to_string(), "max displacement".to_string()],
        vec![Vec::new(), Vec::new()],
    )?;
    viewer.set_plotting_enabled(!args.no_plots);
    viewer.set_plotting_log_scale(args.log_scale);

    let mut solver = Relaxation::new(&vertices, viewer.get_edges());
    let mut callbacks = ViewerCallbacks::<WgpuBackend<'_>>::new().pre_draw(move |viewer, interacted| {
        if !interacted && solver.converged() {
            return Ok(());
        }
        let handles: Vec<_> = viewer
            .marked_points()
            .iter()
            .zip(viewer.point_translations())
            .map(|(&i, t)| (i, solver.rest[i] + t.cast::<f64>()))
            .collect();
        solver.step(&handles);
        viewer.modify_vertices(&solver.vertices())?;
        viewer.set_plot_series(vec![solver.energy.clone(), solver.displacement.clone()]);
        Ok(())
    });

    log::info!("Mesh has {} vertices and {} faces", vertices.nrows(), faces.nrows());
    let frames = run(&mut viewer, &mut events, &mut callbacks)?;
    log::info!("Closed after {} frames", frames);
    Ok(())
}
