use std::path::Path;

use crate::canvas::CanvasState;
use crate::compositor;
use crate::gif::GifEncoder;
use crate::grid::{PackedColor, TRANSPARENT};
use crate::history::HistoryLog;
use crate::io::{self, ProjectError};
use crate::selection::Clipboard;

/// Single open document: canvas, its undo log, the project name and the
/// clipboard. Gestures that must snapshot history run through here; the
/// plain canvas methods only flip the dirty flag.
///
/// One editing context at a time; callers serialize gestures. An abandoned
/// gesture (a move never committed) needs no cleanup.
pub struct Project {
    pub canvas: CanvasState,
    pub history: HistoryLog,
    pub name: String,
    pub clipboard: Option<Clipboard>,
}

impl Project {
    /// Fresh project; the initial state is committed so undo always has a
    /// floor to return to.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        background: Option<PackedColor>,
    ) -> Self {
        let mut canvas = CanvasState::new(width, height, background);
        let mut history = HistoryLog::new();
        history.commit(&mut canvas);
        Self {
            canvas,
            history,
            name: name.into(),
            clipboard: None,
        }
    }

    /// Open a `.pforge` file.
    pub fn open(path: &Path) -> Result<Self, ProjectError> {
        let (mut canvas, name) = io::load_project(path)?;
        let mut history = HistoryLog::new();
        canvas.dirty = true;
        history.commit(&mut canvas);
        Ok(Self {
            canvas,
            history,
            name,
            clipboard: None,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        io::save_project(&self.canvas, &self.name, path)
    }

    /// Funnel pending canvas changes into the history log.
    pub fn commit(&mut self) {
        self.history.commit(&mut self.canvas);
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.canvas)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.canvas)
    }

    // ------------------------------------------------------------------
    // Gestures that bracket themselves with history commits
    // ------------------------------------------------------------------

    /// Begin a move: snapshot first so undo restores the uncut state, then
    /// lift the selected pixels.
    pub fn start_move(&mut self) {
        if self.canvas.floating.is_some() {
            return;
        }
        let has_selection = self
            .canvas
            .selection
            .as_ref()
            .is_some_and(|sel| !sel.is_empty());
        if !has_selection {
            return;
        }
        self.canvas.dirty = true;
        self.commit();
        self.canvas.begin_move();
    }

    pub fn drag_move(&mut self, dx: i32, dy: i32) {
        self.canvas.drag_move(dx, dy);
    }

    pub fn commit_move(&mut self) {
        if self.canvas.floating.is_none() {
            return;
        }
        self.canvas.commit_move();
        self.commit();
    }

    pub fn flood_fill(&mut self, x: i32, y: i32, color: PackedColor) {
        self.canvas.flood_fill(x, y, color);
        self.commit();
    }

    /// Copy leaves the previous clipboard alone when nothing is selected.
    pub fn copy_selection(&mut self) {
        if let Some(clip) = self.canvas.copy_selection() {
            self.clipboard = Some(clip);
        }
    }

    /// Copy, then clear the selected pixels with a snapshot on both sides
    /// so the deletion is a single undo step.
    pub fn cut_selection(&mut self) {
        let Some(clip) = self.canvas.copy_selection() else {
            return;
        };
        self.clipboard = Some(clip);

        let layer_idx = self.canvas.current_layer_index;
        let has_pixels = self
            .canvas
            .selection
            .as_ref()
            .is_some_and(|sel| {
                sel.iter()
                    .any(|&(x, y)| self.canvas.get_pixel_on_layer(x, y, layer_idx) != TRANSPARENT)
            });
        if !has_pixels {
            return;
        }
        self.canvas.dirty = true;
        self.commit();
        self.canvas.delete_selected_pixels();
        self.commit();
    }

    /// Paste onto a fresh layer; the content floats until the caller
    /// commits the implicit move.
    pub fn paste_selection(&mut self) {
        let Some(clip) = self.clipboard.clone() else {
            return;
        };
        self.canvas.paste_clipboard(&clip);
        self.commit();
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Flatten every frame and encode an animated GIF. `fps` falls back to
    /// the project's playback rate.
    pub fn export_gif(&self, fps: Option<u32>) -> Vec<u8> {
        let fps = fps.unwrap_or(self.canvas.fps).max(1);
        let delay_ms = (1000.0 / fps as f64).round() as u32;
        let mut encoder = GifEncoder::new(self.canvas.width as u16, self.canvas.height as u16);
        for idx in 0..self.canvas.frame_count() {
            encoder.add_frame(compositor::composite_frame(&self.canvas, idx), delay_ms);
        }
        encoder.encode()
    }
}
