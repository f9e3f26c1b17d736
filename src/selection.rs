use std::collections::{HashMap, HashSet};

use crate::canvas::CanvasState;
use crate::grid::{PackedColor, TRANSPARENT};

// ============================================================================
// SELECTION ENGINE
// ============================================================================
//
// Selections are sets of canvas-absolute coordinates. They may extend into
// the margin band around the canvas, so a moved selection can be dragged
// partially or fully off-screen and dragged back later without losing
// pixels.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionShape {
    Rectangle,
    Ellipse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    Replace,
    Add,
}

/// Shift/alt modifier state for shape gestures.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShapeConstraints {
    /// Force equal width and height (circle/square).
    pub square: bool,
    /// Treat the anchor point as the shape's center instead of a corner.
    pub from_center: bool,
}

/// Pixels lifted off a layer by an in-flight move gesture. Keys are the
/// coordinates the pixels were cut from (canvas-absolute, or clipboard-local
/// after a paste); `dx`/`dy` is the current drag offset.
#[derive(Clone, Debug, Default)]
pub struct FloatingBuffer {
    pub pixels: HashMap<(i32, i32), PackedColor>,
    pub dx: i32,
    pub dy: i32,
}

/// Copied pixels, normalized so the selection's top-left corner is (0, 0).
#[derive(Clone, Debug)]
pub struct Clipboard {
    pub pixels: HashMap<(i32, i32), PackedColor>,
    pub width: i32,
    pub height: i32,
}

impl CanvasState {
    // ------------------------------------------------------------------
    // Shape rasterization
    // ------------------------------------------------------------------

    /// Rasterize a rectangle or ellipse spanned by two drag endpoints,
    /// clamped to the canvas-plus-margin band.
    pub fn shape_pixels(
        &self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        shape: SelectionShape,
        filled: bool,
        constraints: ShapeConstraints,
    ) -> Vec<(i32, i32)> {
        let (mut sx, mut sy, mut ex, mut ey) = (x0, y0, x1, y1);
        if constraints.from_center {
            let (dx, dy) = ((x1 - x0).abs(), (y1 - y0).abs());
            sx = x0 - dx;
            ex = x0 + dx;
            sy = y0 - dy;
            ey = y0 + dy;
        }
        if constraints.square {
            let w = (ex - sx).abs() + 1;
            let h = (ey - sy).abs() + 1;
            let max = w.max(h);
            let dir_x = if ex >= sx { 1 } else { -1 };
            let dir_y = if ey >= sy { 1 } else { -1 };
            ex = sx + (max - 1) * dir_x;
            ey = sy + (max - 1) * dir_y;
        }

        let min_x = sx.min(ex).max(-crate::canvas::SELECTION_MARGIN);
        let max_x = sx
            .max(ex)
            .min(self.width as i32 + crate::canvas::SELECTION_MARGIN);
        let min_y = sy.min(ey).max(-crate::canvas::SELECTION_MARGIN);
        let max_y = sy
            .max(ey)
            .min(self.height as i32 + crate::canvas::SELECTION_MARGIN);

        let mut pixels = Vec::new();
        match shape {
            SelectionShape::Rectangle => {
                if filled {
                    for y in min_y..=max_y {
                        for x in min_x..=max_x {
                            pixels.push((x, y));
                        }
                    }
                } else {
                    for x in min_x..=max_x {
                        pixels.push((x, min_y));
                        pixels.push((x, max_y));
                    }
                    for y in min_y + 1..max_y {
                        pixels.push((min_x, y));
                        pixels.push((max_x, y));
                    }
                }
            }
            SelectionShape::Ellipse => {
                let rx = (max_x - min_x) as f64 / 2.0;
                let ry = (max_y - min_y) as f64 / 2.0;
                let cx = min_x as f64 + rx;
                let cy = min_y as f64 + ry;
                let dx2 = if rx * rx == 0.0 { 0.25 } else { rx * rx };
                let dy2 = if ry * ry == 0.0 { 0.25 } else { ry * ry };
                let dist = |x: f64, y: f64| {
                    (x - cx) * (x - cx) / dx2 + (y - cy) * (y - cy) / dy2
                };
                for y in min_y..=max_y {
                    for x in min_x..=max_x {
                        if dist(x as f64, y as f64) > 1.05 {
                            continue;
                        }
                        if filled {
                            pixels.push((x, y));
                            continue;
                        }
                        // Outline: keep cells with a failing 4-neighbor
                        let edge = [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
                            .iter()
                            .any(|&(nx, ny)| dist(nx as f64, ny as f64) > 1.05);
                        if edge || rx < 1.0 || ry < 1.0 {
                            pixels.push((x, y));
                        }
                    }
                }
            }
        }
        pixels
    }

    /// Replace or extend the selection with a filled shape.
    pub fn select_shape(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        shape: SelectionShape,
        constraints: ShapeConstraints,
        mode: SelectionMode,
    ) {
        let pixels = self.shape_pixels(x0, y0, x1, y1, shape, true, constraints);
        self.merge_selection(pixels, mode);
    }

    // ------------------------------------------------------------------
    // Lasso
    // ------------------------------------------------------------------

    /// Interior of a freehand polygon, scanline-filled at row centers and
    /// restricted to the canvas rectangle. Paths of fewer than three points
    /// enclose nothing.
    pub fn lasso_pixels(&self, path: &[(i32, i32)]) -> Vec<(i32, i32)> {
        if path.len() < 3 {
            return Vec::new();
        }
        let n = path.len();
        let mut pixels = Vec::new();
        for y in 0..self.height {
            let yf = y as f32 + 0.5;
            let mut nodes: Vec<f32> = Vec::new();
            // Walk polygon edges, including the closing edge n-1 → 0
            for i in 0..n {
                let j = (i + 1) % n;
                let yi = path[i].1 as f32;
                let yj = path[j].1 as f32;
                if (yi < yf && yj >= yf) || (yj < yf && yi >= yf) {
                    let t = (yf - yi) / (yj - yi);
                    let x = path[i].0 as f32 + t * (path[j].0 as f32 - path[i].0 as f32);
                    nodes.push(x);
                }
            }
            nodes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mut k = 0;
            while k + 1 < nodes.len() {
                let x_start = (nodes[k].max(0.0) as u32).min(self.width);
                let x_end = ((nodes[k + 1] + 1.0).max(0.0) as u32).min(self.width);
                for x in x_start..x_end {
                    pixels.push((x as i32, y as i32));
                }
                k += 2;
            }
        }
        pixels
    }

    pub fn select_lasso(&mut self, path: &[(i32, i32)], mode: SelectionMode) {
        if path.len() < 3 {
            return;
        }
        let pixels = self.lasso_pixels(path);
        self.merge_selection(pixels, mode);
    }

    fn merge_selection(&mut self, pixels: Vec<(i32, i32)>, mode: SelectionMode) {
        let mut set = match (mode, self.selection.take()) {
            (SelectionMode::Add, Some(existing)) => existing,
            _ => HashSet::new(),
        };
        set.extend(pixels);
        self.selection = if set.is_empty() { None } else { Some(set) };
    }

    // ------------------------------------------------------------------
    // Magic wand
    // ------------------------------------------------------------------

    /// Select the 4-connected region of the current layer matching the
    /// seed's color, growth bounded by the margin band. A seed outside the
    /// band selects nothing but still leaves an (empty) active selection,
    /// so subsequent constrained writes are blocked until it is cleared.
    pub fn magic_wand(&mut self, seed_x: i32, seed_y: i32, mode: SelectionMode) {
        let mut set = match (mode, self.selection.take()) {
            (SelectionMode::Add, Some(existing)) => existing,
            _ => HashSet::new(),
        };

        let target = self.get_pixel(seed_x, seed_y);
        let mut stack = vec![(seed_x, seed_y)];
        let mut processed = HashSet::new();
        while let Some((x, y)) = stack.pop() {
            if !processed.insert((x, y)) {
                continue;
            }
            if !self.in_margin(x, y) {
                continue;
            }
            if self.get_pixel(x, y) != target {
                continue;
            }
            set.insert((x, y));
            stack.push((x + 1, y));
            stack.push((x - 1, y));
            stack.push((x, y + 1));
            stack.push((x, y - 1));
        }
        self.selection = Some(set);
    }

    /// Selection membership check that tracks an in-flight drag: while a
    /// floating buffer exists the mask visually sits at its offset.
    pub fn is_in_selection(&self, x: i32, y: i32) -> bool {
        let Some(selection) = &self.selection else {
            return false;
        };
        let (ox, oy) = self
            .floating
            .as_ref()
            .map_or((0, 0), |fb| (fb.dx, fb.dy));
        selection.contains(&(x - ox, y - oy))
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    // ------------------------------------------------------------------
    // Flood fill
    // ------------------------------------------------------------------

    /// 8-connected fill of the seed's color region on the current layer.
    /// An active selection constrains both which pixels change and how the
    /// region may grow. Filling with the seed's own color is a no-op.
    pub fn flood_fill(&mut self, seed_x: i32, seed_y: i32, fill: PackedColor) {
        let target = self.get_pixel(seed_x, seed_y);
        if target == fill {
            return;
        }
        let mut stack = vec![(seed_x, seed_y)];
        let mut processed = HashSet::new();
        while let Some((x, y)) = stack.pop() {
            if !processed.insert((x, y)) {
                continue;
            }
            if let Some(selection) = &self.selection
                && !selection.contains(&(x, y))
            {
                continue;
            }
            if self.get_pixel(x, y) != target {
                continue;
            }
            self.set_pixel(x, y, fill);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if self.in_margin(nx, ny) {
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Move gesture
    // ------------------------------------------------------------------

    /// Cut the selected non-transparent pixels of the current layer into a
    /// floating buffer. No-op when nothing is selected or a move is already
    /// in flight. The caller snapshots history *before* this runs so undo
    /// restores the pre-cut state.
    pub fn begin_move(&mut self) {
        if self.floating.is_some() {
            return;
        }
        let Some(selection) = &self.selection else {
            return;
        };
        if selection.is_empty() {
            return;
        }
        let layer_idx = self.current_layer_index;
        let lifted: Vec<((i32, i32), PackedColor)> = selection
            .iter()
            .filter_map(|&(x, y)| {
                let pixel = self.get_pixel_on_layer(x, y, layer_idx);
                (pixel != TRANSPARENT).then_some(((x, y), pixel))
            })
            .collect();

        let mut pixels = HashMap::new();
        for ((x, y), pixel) in lifted {
            pixels.insert((x, y), pixel);
            self.set_pixel_unconstrained(x, y, TRANSPARENT, layer_idx);
        }
        self.floating = Some(FloatingBuffer {
            pixels,
            dx: 0,
            dy: 0,
        });
    }

    /// Update the drag offset of the in-flight move (absolute, relative to
    /// where the pixels were cut from).
    pub fn drag_move(&mut self, dx: i32, dy: i32) {
        if let Some(fb) = &mut self.floating {
            fb.dx = dx;
            fb.dy = dy;
        }
    }

    /// Paste the floating pixels back at their offset position and replace
    /// the selection with the translated coordinates. Destinations are not
    /// clamped: pixels dragged off-canvas stay in the layer's sparse store.
    pub fn commit_move(&mut self) {
        let Some(fb) = self.floating.take() else {
            return;
        };
        let layer_idx = self.current_layer_index;
        let (lx_off, ly_off) = (self.layers[layer_idx].x, self.layers[layer_idx].y);
        let mut new_selection = HashSet::new();
        for (&(sx, sy), &pixel) in &fb.pixels {
            let (nx, ny) = (sx + fb.dx, sy + fb.dy);
            new_selection.insert((nx, ny));
            self.frames[self.current_frame_index][layer_idx]
                .set(nx - lx_off, ny - ly_off, pixel);
        }
        self.selection = if new_selection.is_empty() {
            None
        } else {
            Some(new_selection)
        };
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    /// Capture the selected non-transparent pixels of the current layer,
    /// normalized to the selection's bounding-box corner. `None` when
    /// nothing is selected.
    pub fn copy_selection(&self) -> Option<Clipboard> {
        let selection = self.selection.as_ref()?;
        let min_x = selection.iter().map(|p| p.0).min()?;
        let min_y = selection.iter().map(|p| p.1).min()?;
        let max_x = selection.iter().map(|p| p.0).max()?;
        let max_y = selection.iter().map(|p| p.1).max()?;

        let mut pixels = HashMap::new();
        for &(x, y) in selection {
            let p = self.get_pixel(x, y);
            if p != TRANSPARENT {
                pixels.insert((x - min_x, y - min_y), p);
            }
        }
        Some(Clipboard {
            pixels,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    /// Clear the selected non-transparent pixels of the current layer,
    /// bypassing the selection write constraint. Returns whether anything
    /// was removed.
    pub fn delete_selected_pixels(&mut self) -> bool {
        let Some(selection) = &self.selection else {
            return false;
        };
        let layer_idx = self.current_layer_index;
        let coords: Vec<(i32, i32)> = selection
            .iter()
            .filter(|&&(x, y)| self.get_pixel_on_layer(x, y, layer_idx) != TRANSPARENT)
            .copied()
            .collect();
        if coords.is_empty() {
            return false;
        }
        for (x, y) in coords {
            self.set_pixel_unconstrained(x, y, TRANSPARENT, layer_idx);
        }
        true
    }

    /// Paste clipboard content: a fresh "Pasted Content" layer is added on
    /// top and the pixels start floating at a quarter-canvas offset, ready
    /// to be dragged and committed like a move.
    pub fn paste_clipboard(&mut self, clipboard: &Clipboard) {
        self.add_layer(Some("Pasted Content".to_string()));
        let offset = self.width as i32 / 4;
        let selection: HashSet<(i32, i32)> = clipboard
            .pixels
            .keys()
            .map(|&(x, y)| (x + offset, y + offset))
            .collect();
        self.floating = Some(FloatingBuffer {
            pixels: clipboard.pixels.clone(),
            dx: offset,
            dy: offset,
        });
        self.selection = if selection.is_empty() {
            None
        } else {
            Some(selection)
        };
    }
}
