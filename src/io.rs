use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, Layer, LoopMode, DEFAULT_FPS, MAX_CANVAS_DIM};
use crate::grid::{PixelGrid, TRANSPARENT};
use crate::log_info;

// ============================================================================
// PROJECT SNAPSHOT (.pforge)
// ============================================================================
//
// JSON project files. Pixel data is stored sparsely: every frame is a list of
// per-layer entry lists, each entry a `[x, y, colorInt]` triplet in
// layer-local coordinates. Transparent entries are never written. Restoring
// validates everything up front and either builds a complete state or fails
// without side effects.

pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Error type for project file operations.
#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Json(String),
    InvalidProject(String),
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {}", e),
            ProjectError::Json(e) => write!(f, "JSON error: {}", e),
            ProjectError::InvalidProject(e) => write!(f, "Invalid project data: {}", e),
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        ProjectError::Json(e.to_string())
    }
}

/// The serializable shape of a whole project.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub version: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub current_frame_index: usize,
    pub current_layer_index: usize,
    pub fps: u32,
    pub loop_mode: LoopMode,
    pub layers: Vec<Layer>,
    /// frames → layers → sparse `[x, y, colorInt]` entries.
    pub frames: Vec<Vec<Vec<(i32, i32, u32)>>>,
}

/// Capture the canvas as a snapshot. Entries are sorted so the output is
/// byte-stable for identical states.
pub fn snapshot(canvas: &CanvasState, name: &str) -> ProjectSnapshot {
    let frames = canvas
        .frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|grid| {
                    let mut entries: Vec<(i32, i32, u32)> =
                        grid.iter().map(|(x, y, c)| (x, y, c)).collect();
                    entries.sort_by_key(|&(x, y, _)| (y, x));
                    entries
                })
                .collect()
        })
        .collect();
    ProjectSnapshot {
        version: SNAPSHOT_VERSION.to_string(),
        name: name.to_string(),
        width: canvas.width,
        height: canvas.height,
        current_frame_index: canvas.current_frame_index,
        current_layer_index: canvas.current_layer_index,
        fps: canvas.fps,
        loop_mode: canvas.loop_mode,
        layers: canvas.layers.clone(),
        frames,
    }
}

/// Rebuild a [`CanvasState`] from a snapshot. All validation happens before
/// any state is constructed; a bad snapshot yields an error and nothing
/// else.
pub fn restore(snap: ProjectSnapshot) -> Result<CanvasState, ProjectError> {
    if snap.width == 0 || snap.height == 0 {
        return Err(ProjectError::InvalidProject(
            "canvas dimensions cannot be zero".into(),
        ));
    }
    if snap.width > MAX_CANVAS_DIM || snap.height > MAX_CANVAS_DIM {
        return Err(ProjectError::InvalidProject(format!(
            "canvas size {}x{} exceeds maximum {}x{}",
            snap.width, snap.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    if snap.layers.is_empty() {
        return Err(ProjectError::InvalidProject("project has no layers".into()));
    }
    if snap.frames.is_empty() {
        return Err(ProjectError::InvalidProject("project has no frames".into()));
    }
    for (idx, frame) in snap.frames.iter().enumerate() {
        if frame.len() != snap.layers.len() {
            return Err(ProjectError::InvalidProject(format!(
                "frame {} has {} layers, expected {}",
                idx,
                frame.len(),
                snap.layers.len()
            )));
        }
    }

    let frames = snap
        .frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|entries| {
                    let mut grid = PixelGrid::new();
                    for &(x, y, color) in entries {
                        if color != TRANSPARENT {
                            grid.set(x, y, color);
                        }
                    }
                    grid
                })
                .collect()
        })
        .collect::<Vec<_>>();

    let current_frame_index = snap.current_frame_index.min(frames.len() - 1);
    let current_layer_index = snap.current_layer_index.min(snap.layers.len() - 1);
    Ok(CanvasState {
        width: snap.width,
        height: snap.height,
        frames,
        layers: snap.layers,
        current_frame_index,
        current_layer_index,
        fps: if snap.fps == 0 { DEFAULT_FPS } else { snap.fps },
        loop_mode: snap.loop_mode,
        selection: None,
        floating: None,
        dirty: false,
    })
}

pub fn to_json(snap: &ProjectSnapshot) -> Result<String, ProjectError> {
    Ok(serde_json::to_string(snap)?)
}

pub fn from_json(json: &str) -> Result<ProjectSnapshot, ProjectError> {
    Ok(serde_json::from_str(json)?)
}

/// Write the canvas to a `.pforge` file.
pub fn save_project(canvas: &CanvasState, name: &str, path: &Path) -> Result<(), ProjectError> {
    let json = to_json(&snapshot(canvas, name))?;
    fs::write(path, json)?;
    log_info!("Saved project '{}' to {}", name, path.display());
    Ok(())
}

/// Load a `.pforge` file; returns the rebuilt state and the project name.
pub fn load_project(path: &Path) -> Result<(CanvasState, String), ProjectError> {
    let json = fs::read_to_string(path)?;
    let snap = from_json(&json)?;
    let name = snap.name.clone();
    let canvas = restore(snap)?;
    log_info!(
        "Loaded project '{}' from {} ({} frames, {} layers)",
        name,
        path.display(),
        canvas.frame_count(),
        canvas.layer_count()
    );
    Ok((canvas, name))
}
