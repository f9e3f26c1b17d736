use crate::canvas::{CanvasState, Layer};
use crate::grid::PixelGrid;

// ============================================================================
// HISTORY LOG
// ============================================================================

/// Maximum number of retained snapshots. Committing past the cap evicts the
/// oldest entry instead of refusing.
pub const MAX_HISTORY: usize = 20;

/// One undoable state: which frame was current, a deep copy of that frame's
/// grids, and the full layer metadata list.
///
/// Frame structure (count and order) is deliberately not captured, so frame
/// add/delete/reorder cannot be undone; only the affected frame's content
/// and the layer list roll back.
#[derive(Clone, Debug)]
struct Snapshot {
    frame_idx: usize,
    grids: Vec<PixelGrid>,
    layers: Vec<Layer>,
}

impl Snapshot {
    fn capture(canvas: &CanvasState) -> Self {
        Self {
            frame_idx: canvas.current_frame_index,
            grids: canvas.frames[canvas.current_frame_index].clone(),
            layers: canvas.layers.clone(),
        }
    }

    fn restore_into(&self, canvas: &mut CanvasState) {
        // The snapshotted frame may have been deleted since; clamp rather
        // than resurrect it.
        canvas.current_frame_index = self.frame_idx.min(canvas.frames.len() - 1);
        canvas.frames[canvas.current_frame_index] = self.grids.clone();
        canvas.layers = self.layers.clone();

        // Other frames must stay index-aligned with the restored layer
        // list. New layers land at the front, so realignment trims or pads
        // there. Their content is not otherwise rolled back.
        let n = canvas.layers.len();
        for frame in &mut canvas.frames {
            while frame.len() > n {
                frame.remove(0);
            }
            while frame.len() < n {
                frame.insert(0, PixelGrid::new());
            }
        }
    }
}

/// Bounded cursor-based undo/redo log over [`Snapshot`]s.
#[derive(Default)]
pub struct HistoryLog {
    entries: Vec<Snapshot>,
    cursor: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    /// Record the canvas if it has pending changes; no-op otherwise. Any
    /// redo tail past the cursor is discarded. When the cap is hit the
    /// oldest entry is evicted and the cursor stays put.
    pub fn commit(&mut self, canvas: &mut CanvasState) {
        if !canvas.dirty {
            return;
        }
        canvas.dirty = false;

        if !self.entries.is_empty() && self.cursor + 1 < self.entries.len() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(Snapshot::capture(canvas));
        if self.entries.len() > MAX_HISTORY {
            self.entries.remove(0);
        } else if self.entries.len() == 1 {
            self.cursor = 0;
        } else {
            self.cursor += 1;
        }
    }

    /// Step back one snapshot. Returns whether anything changed.
    pub fn undo(&mut self, canvas: &mut CanvasState) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        self.entries[self.cursor].restore_into(canvas);
        true
    }

    /// Step forward one snapshot. Returns whether anything changed.
    pub fn redo(&mut self, canvas: &mut CanvasState) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        self.entries[self.cursor].restore_into(canvas);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{pack_rgb, TRANSPARENT};

    fn setup() -> (CanvasState, HistoryLog) {
        let mut canvas = CanvasState::new(8, 8, None);
        let mut history = HistoryLog::new();
        history.commit(&mut canvas); // initial state, canvas starts dirty
        (canvas, history)
    }

    #[test]
    fn commit_is_noop_unless_dirty() {
        let (mut canvas, mut history) = setup();
        assert_eq!(history.len(), 1);
        history.commit(&mut canvas);
        history.commit(&mut canvas);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn undo_and_redo_walk_the_log() {
        let (mut canvas, mut history) = setup();
        let colors = [pack_rgb(1, 0, 0), pack_rgb(2, 0, 0), pack_rgb(3, 0, 0)];
        for &c in &colors {
            canvas.set_pixel(0, 0, c);
            history.commit(&mut canvas);
        }
        assert!(history.undo(&mut canvas));
        assert_eq!(canvas.get_pixel(0, 0), colors[1]);
        assert!(history.undo(&mut canvas));
        assert!(history.undo(&mut canvas));
        assert_eq!(canvas.get_pixel(0, 0), TRANSPARENT);
        // Fully unwound
        assert!(!history.undo(&mut canvas));
        for &c in &colors {
            assert!(history.redo(&mut canvas));
            assert_eq!(canvas.get_pixel(0, 0), c);
        }
        assert!(!history.redo(&mut canvas));
    }

    #[test]
    fn new_commit_discards_redo_tail() {
        let (mut canvas, mut history) = setup();
        canvas.set_pixel(0, 0, pack_rgb(1, 0, 0));
        history.commit(&mut canvas);
        canvas.set_pixel(0, 0, pack_rgb(2, 0, 0));
        history.commit(&mut canvas);
        history.undo(&mut canvas);
        history.undo(&mut canvas);

        canvas.set_pixel(0, 0, pack_rgb(9, 0, 0));
        history.commit(&mut canvas);
        assert!(!history.redo(&mut canvas));
        assert_eq!(history.len(), 2);
        history.undo(&mut canvas);
        assert_eq!(canvas.get_pixel(0, 0), TRANSPARENT);
    }

    #[test]
    fn log_never_exceeds_capacity() {
        let (mut canvas, mut history) = setup();
        for i in 0..40u8 {
            canvas.set_pixel(0, 0, pack_rgb(i + 1, 0, 0));
            history.commit(&mut canvas);
            assert!(history.len() <= MAX_HISTORY);
        }
        assert_eq!(history.len(), MAX_HISTORY);
        // Newest state is still at the cursor
        assert!(!history.redo(&mut canvas));
        // Unwinding stops at the oldest retained snapshot
        let mut steps = 0;
        while history.undo(&mut canvas) {
            steps += 1;
        }
        assert_eq!(steps, MAX_HISTORY - 1);
        assert_eq!(canvas.get_pixel(0, 0), pack_rgb(21, 0, 0));
    }

    #[test]
    fn snapshots_are_independent_of_live_state() {
        let (mut canvas, mut history) = setup();
        canvas.set_pixel(1, 1, pack_rgb(5, 5, 5));
        history.commit(&mut canvas);
        // Mutate without committing
        canvas.set_pixel(1, 1, pack_rgb(6, 6, 6));
        canvas.set_pixel(2, 2, pack_rgb(7, 7, 7));
        history.undo(&mut canvas);
        history.redo(&mut canvas);
        assert_eq!(canvas.get_pixel(1, 1), pack_rgb(5, 5, 5));
        assert_eq!(canvas.get_pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn layer_metadata_rolls_back() {
        let (mut canvas, mut history) = setup();
        canvas.set_layer_opacity(0, 100);
        history.commit(&mut canvas);
        canvas.set_layer_opacity(0, 30);
        canvas.rename_layer(0, "Ink");
        history.commit(&mut canvas);
        history.undo(&mut canvas);
        assert_eq!(canvas.layers[0].opacity, 100);
        assert_eq!(canvas.layers[0].name, "Layer 1");
    }

    #[test]
    fn undoing_add_layer_keeps_frames_aligned() {
        let (mut canvas, mut history) = setup();
        canvas.add_frame();
        history.commit(&mut canvas);
        canvas.add_layer(None);
        history.commit(&mut canvas);
        history.undo(&mut canvas);
        assert_eq!(canvas.layers.len(), 3);
        for frame in &canvas.frames {
            assert_eq!(frame.len(), 3);
        }
    }

    #[test]
    fn undo_after_frame_delete_clamps_frame_index() {
        let (mut canvas, mut history) = setup();
        canvas.add_frame();
        canvas.set_pixel(0, 0, pack_rgb(1, 1, 1));
        history.commit(&mut canvas);
        canvas.delete_frame();
        history.commit(&mut canvas);
        history.undo(&mut canvas);
        assert!(canvas.current_frame_index < canvas.frames.len());
    }
}
