use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::grid::{PackedColor, PixelGrid, TRANSPARENT};
use crate::selection::FloatingBuffer;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Hard cap on either canvas dimension.
pub const MAX_CANVAS_DIM: u32 = 300;

/// Selection coordinates and region growth may run this far past the canvas
/// edge in every direction.
pub const SELECTION_MARGIN: i32 = 100;

pub const DEFAULT_FPS: u32 = 12;

// ============================================================================
// LAYER / FRAME MODEL
// ============================================================================

/// Per-layer metadata. Pixel content lives in the frames, index-aligned with
/// the layer list (index 0 is the topmost layer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub opacity: u8,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub clipped: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            opacity: 255,
            x: 0,
            y: 0,
            clipped: false,
        }
    }
}

/// One animation frame: one [`PixelGrid`] per layer, same order as the
/// layer list.
pub type Frame = Vec<PixelGrid>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Loop,
    PingPong,
    Once,
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// The whole editable document: canvas dimensions, frames, layers, playback
/// settings, the active selection and any in-flight floating move buffer.
///
/// Invariant: every frame holds exactly `layers.len()` grids, and the current
/// frame/layer indices are always in range. All structural operations keep
/// that alignment atomically.
#[derive(Clone, Debug)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame>,
    pub layers: Vec<Layer>,
    pub current_frame_index: usize,
    pub current_layer_index: usize,
    pub fps: u32,
    pub loop_mode: LoopMode,
    /// Active selection mask, canvas-absolute coordinates. `None` means no
    /// constraint.
    pub selection: Option<HashSet<(i32, i32)>>,
    /// Pixels lifted off the current layer by an in-flight move gesture.
    pub floating: Option<FloatingBuffer>,
    /// Set by every mutation; consumed by the history log on commit.
    pub dirty: bool,
}

impl CanvasState {
    /// Fresh document: three empty layers, one frame. When `background` is
    /// given the bottom layer is filled with it. Dimensions outside
    /// 1..=[`MAX_CANVAS_DIM`] are clamped.
    pub fn new(width: u32, height: u32, background: Option<PackedColor>) -> Self {
        let (width, height) = clamp_dimensions(width, height);
        let layers = vec![
            Layer::new("Layer 1"),
            Layer::new("Layer 2"),
            Layer::new("Layer 3"),
        ];
        let mut frame: Frame = layers.iter().map(|_| PixelGrid::new()).collect();
        if let Some(bg) = background
            && bg != TRANSPARENT
        {
            let bottom = frame.len() - 1;
            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    frame[bottom].set(x, y, bg);
                }
            }
        }
        Self {
            width,
            height,
            frames: vec![frame],
            layers,
            current_frame_index: 0,
            current_layer_index: 0,
            fps: DEFAULT_FPS,
            loop_mode: LoopMode::Loop,
            selection: None,
            floating: None,
            dirty: true,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.current_frame_index]
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current_frame_index]
    }

    /// True while coordinates stay inside the canvas-plus-margin band where
    /// selection growth is allowed to roam.
    pub fn in_margin(&self, x: i32, y: i32) -> bool {
        x >= -SELECTION_MARGIN
            && x < self.width as i32 + SELECTION_MARGIN
            && y >= -SELECTION_MARGIN
            && y < self.height as i32 + SELECTION_MARGIN
    }

    // ------------------------------------------------------------------
    // Pixel access (canvas-absolute coordinates, translated through the
    // layer offset)
    // ------------------------------------------------------------------

    pub fn get_pixel(&self, x: i32, y: i32) -> PackedColor {
        self.get_pixel_on_layer(x, y, self.current_layer_index)
    }

    pub fn get_pixel_on_layer(&self, x: i32, y: i32, layer_idx: usize) -> PackedColor {
        let layer = &self.layers[layer_idx];
        self.frames[self.current_frame_index][layer_idx].get(x - layer.x, y - layer.y)
    }

    /// Write through the selection constraint: when a selection is active,
    /// coordinates outside it are silently dropped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: PackedColor) {
        self.set_pixel_on_layer(x, y, color, self.current_layer_index);
    }

    pub fn set_pixel_on_layer(&mut self, x: i32, y: i32, color: PackedColor, layer_idx: usize) {
        if let Some(selection) = &self.selection
            && !selection.contains(&(x, y))
        {
            return;
        }
        self.set_pixel_unconstrained(x, y, color, layer_idx);
    }

    /// Write ignoring the selection mask. Move/cut internals use this to
    /// clear pixels that are themselves part of the selection.
    pub(crate) fn set_pixel_unconstrained(
        &mut self,
        x: i32,
        y: i32,
        color: PackedColor,
        layer_idx: usize,
    ) {
        let layer = &self.layers[layer_idx];
        let (lx, ly) = (x - layer.x, y - layer.y);
        if self.frames[self.current_frame_index][layer_idx].set(lx, ly, color) {
            self.dirty = true;
        }
    }

    // ------------------------------------------------------------------
    // Frame operations
    // ------------------------------------------------------------------

    /// Append an empty frame and make it current.
    pub fn add_frame(&mut self) {
        let frame: Frame = self.layers.iter().map(|_| PixelGrid::new()).collect();
        self.frames.push(frame);
        self.current_frame_index = self.frames.len() - 1;
        self.dirty = true;
    }

    /// Deep-copy the current frame, insert the copy right after it and make
    /// the copy current.
    pub fn duplicate_frame(&mut self) {
        let copy = self.frames[self.current_frame_index].clone();
        self.frames.insert(self.current_frame_index + 1, copy);
        self.current_frame_index += 1;
        self.dirty = true;
    }

    /// Remove the current frame. Removing the last remaining frame is a
    /// no-op.
    pub fn delete_frame(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        self.frames.remove(self.current_frame_index);
        if self.current_frame_index >= self.frames.len() {
            self.current_frame_index = self.frames.len() - 1;
        }
        self.dirty = true;
    }

    /// Move a frame from one position to another, keeping the current index
    /// pointing at the same frame it pointed at before.
    pub fn reorder_frames(&mut self, from: usize, to: usize) {
        if from == to || from >= self.frames.len() || to >= self.frames.len() {
            return;
        }
        let frame = self.frames.remove(from);
        self.frames.insert(to, frame);
        self.current_frame_index = translate_index(self.current_frame_index, from, to);
        self.dirty = true;
    }

    /// Wipe every layer of the current frame.
    pub fn clear_frame(&mut self) {
        for grid in self.current_frame_mut() {
            grid.clear();
        }
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Layer operations
    // ------------------------------------------------------------------

    /// Insert a new empty layer on top (index 0) of every frame and select
    /// it. `None` names it `Layer N`.
    pub fn add_layer(&mut self, name: Option<String>) {
        let name = name.unwrap_or_else(|| format!("Layer {}", self.layers.len() + 1));
        self.layers.insert(0, Layer::new(name));
        for frame in &mut self.frames {
            frame.insert(0, PixelGrid::new());
        }
        self.current_layer_index = 0;
        self.dirty = true;
    }

    /// Remove a layer from the metadata list and from every frame. Removing
    /// the last remaining layer is a no-op.
    pub fn delete_layer(&mut self, index: usize) {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return;
        }
        self.layers.remove(index);
        for frame in &mut self.frames {
            frame.remove(index);
        }
        if self.current_layer_index >= self.layers.len() {
            self.current_layer_index = self.layers.len() - 1;
        }
        self.dirty = true;
    }

    /// Move a layer (metadata and every frame's grid together), translating
    /// the current layer index through the permutation.
    pub fn reorder_layers(&mut self, from: usize, to: usize) {
        if from == to || from >= self.layers.len() || to >= self.layers.len() {
            return;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        for frame in &mut self.frames {
            let grid = frame.remove(from);
            frame.insert(to, grid);
        }
        self.current_layer_index = translate_index(self.current_layer_index, from, to);
        self.dirty = true;
    }

    pub fn rename_layer(&mut self, index: usize, name: impl Into<String>) {
        if let Some(layer) = self.layers.get_mut(index) {
            let name = name.into();
            if layer.name != name {
                layer.name = name;
                self.dirty = true;
            }
        }
    }

    pub fn toggle_layer_visibility(&mut self, index: usize) {
        if let Some(layer) = self.layers.get_mut(index) {
            layer.visible = !layer.visible;
            self.dirty = true;
        }
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: u8) {
        if let Some(layer) = self.layers.get_mut(index)
            && layer.opacity != opacity
        {
            layer.opacity = opacity;
            self.dirty = true;
        }
    }

    /// Toggle clip-to-below. The bottom layer has nothing below it and can
    /// never clip.
    pub fn toggle_layer_clip(&mut self, index: usize) {
        if index + 1 >= self.layers.len() {
            return;
        }
        self.layers[index].clipped = !self.layers[index].clipped;
        self.dirty = true;
    }

    /// Wipe the current layer of the current frame.
    pub fn clear_layer(&mut self) {
        let layer_idx = self.current_layer_index;
        self.frames[self.current_frame_index][layer_idx].clear();
        self.dirty = true;
    }

    /// Replace the selection with every occupied coordinate of a layer,
    /// translated to canvas-absolute space. An empty layer clears the
    /// selection instead of leaving an empty mask behind.
    pub fn select_layer_alpha(&mut self, index: usize) {
        if index >= self.layers.len() {
            return;
        }
        let layer = &self.layers[index];
        let set: HashSet<(i32, i32)> = self.frames[self.current_frame_index][index]
            .iter()
            .map(|(lx, ly, _)| (lx + layer.x, ly + layer.y))
            .collect();
        self.selection = if set.is_empty() { None } else { Some(set) };
    }
}

/// After removing at `from` and reinserting at `to`, where did the element
/// that used to sit at `current` end up?
fn translate_index(current: usize, from: usize, to: usize) -> usize {
    if current == from {
        to
    } else if from < current && to >= current {
        current - 1
    } else if from > current && to <= current {
        current + 1
    } else {
        current
    }
}

fn clamp_dimensions(width: u32, height: u32) -> (u32, u32) {
    let w = width.clamp(1, MAX_CANVAS_DIM);
    let h = height.clamp(1, MAX_CANVAS_DIM);
    if w != width || h != height {
        eprintln!("canvas dimensions {width}x{height} clamped to {w}x{h}");
    }
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::pack_rgb;

    fn state() -> CanvasState {
        CanvasState::new(16, 16, None)
    }

    fn assert_aligned(state: &CanvasState) {
        for frame in &state.frames {
            assert_eq!(frame.len(), state.layers.len());
        }
        assert!(state.current_frame_index < state.frames.len());
        assert!(state.current_layer_index < state.layers.len());
    }

    #[test]
    fn new_project_fills_bottom_layer_with_background() {
        let bg = pack_rgb(20, 30, 40);
        let s = CanvasState::new(4, 3, Some(bg));
        let bottom = s.layers.len() - 1;
        assert_eq!(s.frames[0][bottom].len(), 12);
        assert_eq!(s.frames[0][bottom].get(3, 2), bg);
        assert!(s.frames[0][0].is_empty());
        assert!(s.frames[0][1].is_empty());
    }

    #[test]
    fn oversized_dimensions_are_clamped() {
        let s = CanvasState::new(5000, 0, None);
        assert_eq!((s.width, s.height), (MAX_CANVAS_DIM, 1));
    }

    #[test]
    fn add_and_duplicate_frame_keep_alignment() {
        let mut s = state();
        s.add_frame();
        assert_eq!(s.current_frame_index, 1);
        s.set_pixel(2, 2, pack_rgb(9, 9, 9));
        s.duplicate_frame();
        assert_eq!(s.current_frame_index, 2);
        assert_eq!(s.get_pixel(2, 2), pack_rgb(9, 9, 9));
        // The copy is independent of the source
        s.set_pixel(2, 2, TRANSPARENT);
        assert_eq!(s.frames[1][0].get(2, 2), pack_rgb(9, 9, 9));
        assert_aligned(&s);
    }

    #[test]
    fn delete_last_frame_and_layer_are_noops() {
        let mut s = state();
        s.delete_frame();
        assert_eq!(s.frames.len(), 1);
        while s.layers.len() > 1 {
            s.delete_layer(0);
        }
        s.delete_layer(0);
        assert_eq!(s.layers.len(), 1);
        assert_aligned(&s);
    }

    #[test]
    fn delete_frame_clamps_current_index() {
        let mut s = state();
        s.add_frame();
        s.add_frame();
        assert_eq!(s.current_frame_index, 2);
        s.delete_frame();
        assert_eq!(s.current_frame_index, 1);
        assert_eq!(s.frames.len(), 2);
    }

    #[test]
    fn add_layer_inserts_on_top_everywhere() {
        let mut s = state();
        s.add_frame();
        s.add_layer(None);
        assert_eq!(s.layers[0].name, "Layer 4");
        assert_eq!(s.current_layer_index, 0);
        assert_aligned(&s);
    }

    #[test]
    fn reorder_translates_current_index() {
        // Moving the current element follows it
        assert_eq!(translate_index(1, 1, 3), 3);
        // Element pulled out from below us, reinserted at/after us
        assert_eq!(translate_index(2, 0, 2), 1);
        assert_eq!(translate_index(2, 1, 3), 1);
        // Element pulled from above us, reinserted at/before us
        assert_eq!(translate_index(1, 3, 0), 2);
        assert_eq!(translate_index(1, 3, 1), 2);
        // Untouched
        assert_eq!(translate_index(0, 2, 3), 0);
    }

    #[test]
    fn reorder_layers_moves_grids_with_metadata() {
        let mut s = state();
        s.set_pixel_on_layer(1, 1, pack_rgb(5, 5, 5), 2);
        s.reorder_layers(2, 0);
        assert_eq!(s.layers[0].name, "Layer 3");
        assert_eq!(s.frames[0][0].get(1, 1), pack_rgb(5, 5, 5));
        // Current was 0; the moved layer landed on top of it
        assert_eq!(s.current_layer_index, 1);
        assert_aligned(&s);
    }

    #[test]
    fn set_pixel_translates_layer_offset() {
        let mut s = state();
        s.layers[0].x = 3;
        s.layers[0].y = -2;
        s.set_pixel(5, 5, pack_rgb(1, 2, 3));
        assert_eq!(s.frames[0][0].get(2, 7), pack_rgb(1, 2, 3));
        assert_eq!(s.get_pixel(5, 5), pack_rgb(1, 2, 3));
    }

    #[test]
    fn selection_constrains_writes() {
        let mut s = state();
        s.selection = Some([(1, 1)].into_iter().collect());
        s.set_pixel(1, 1, pack_rgb(7, 7, 7));
        s.set_pixel(2, 2, pack_rgb(7, 7, 7));
        assert_eq!(s.get_pixel(1, 1), pack_rgb(7, 7, 7));
        assert_eq!(s.get_pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn bottom_layer_cannot_clip() {
        let mut s = state();
        let bottom = s.layers.len() - 1;
        s.toggle_layer_clip(bottom);
        assert!(!s.layers[bottom].clipped);
        s.toggle_layer_clip(0);
        assert!(s.layers[0].clipped);
    }

    #[test]
    fn select_layer_alpha_translates_offsets() {
        let mut s = state();
        s.layers[1].x = 2;
        s.layers[1].y = 1;
        s.frames[0][1].set(0, 0, pack_rgb(1, 1, 1));
        s.frames[0][1].set(4, 4, pack_rgb(2, 2, 2));
        s.select_layer_alpha(1);
        let sel = s.selection.as_ref().unwrap();
        assert_eq!(sel.len(), 2);
        assert!(sel.contains(&(2, 1)));
        assert!(sel.contains(&(6, 5)));
        // Empty layer clears the selection
        s.select_layer_alpha(0);
        assert!(s.selection.is_none());
    }
}
