//! Viewer configuration

use crate::plot::default_palette;
use devview_core::{Color3, Error, Result};
use devview_gpu::Program;
use serde::{Deserialize, Serialize};

pub use crate::camera::ProjectionType;
pub use devview_core::{PointColors, PointSizes};

/// Which mesh passes are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    Fill,
    Wireframe,
    #[default]
    FillWireframe,
    Texture,
    TextureWireframe,
}

impl DisplayMode {
    /// Program for the fill pass, if this mode draws one
    pub fn fill_program(self) -> Option<Program> {
        match self {
            DisplayMode::Fill | DisplayMode::FillWireframe => Some(Program::Fill),
            DisplayMode::Texture | DisplayMode::TextureWireframe => Some(Program::Texture),
            DisplayMode::Wireframe => None,
        }
    }

    pub fn draws_lines(self) -> bool {
        matches!(
            self,
            DisplayMode::Wireframe | DisplayMode::FillWireframe | DisplayMode::TextureWireframe
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingParams {
    /// Light position in eye space
    pub position: [f32; 3],
    pub factor: f32,
    pub shininess: f32,
    pub cel_shading: bool,
}

impl Default for LightingParams {
    fn default() -> Self {
        Self {
            position: [0.0, 0.3, 5.0],
            factor: 1.0,
            shininess: 35.0,
            cel_shading: false,
        }
    }
}

/// Overlay plot presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    pub enabled: bool,
    pub log_scale: bool,
    pub background: Color3,
    pub palette: Vec<Color3>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_scale: false,
            background: [0.97, 0.97, 0.97],
            palette: default_palette(),
        }
    }
}

/// Everything the viewer can be configured with at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub display_mode: DisplayMode,
    pub projection: ProjectionType,
    pub face_based: bool,
    pub lighting: LightingParams,
    pub point_sizes: PointSizes,
    pub point_colors: PointColors,
    pub background: Color3,
    pub wire_color: Color3,
    pub plots: PlotConfig,
    pub dragging_enabled: bool,
    pub rotation_enabled: bool,
    /// Upper bound on frames per second
    pub target_fps: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "devview".to_string(),
            width: 1200,
            height: 800,
            display_mode: DisplayMode::default(),
            projection: ProjectionType::default(),
            face_based: false,
            lighting: LightingParams::default(),
            point_sizes: PointSizes::default(),
            point_colors: PointColors::default(),
            background: [0.9, 0.9, 0.9],
            wire_color: [0.0, 0.0, 0.0],
            plots: PlotConfig::default(),
            dragging_enabled: true,
            rotation_enabled: true,
            target_fps: 60,
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "Window size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.target_fps == 0 {
            return Err(Error::InvalidInput("Target frame rate must be positive".to_string()));
        }
        let sizes = [self.point_sizes.normal, self.point_sizes.important, self.point_sizes.selected];
        if sizes.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidInput(format!("Point sizes must be positive, got {:?}", sizes)));
        }
        Ok(())
    }
}
