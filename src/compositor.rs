use image::RgbaImage;

use crate::canvas::CanvasState;
use crate::grid::unpack_rgba;

// ============================================================================
// COMPOSITOR
// ============================================================================
//
// Flattens one frame's layer stack into a dense RGBA image. Layers paint
// back-to-front (highest index first, index 0 last) so the topmost layer wins
// wherever layers overlap. Blending is overwrite on both color and alpha:
// the output alpha at a pixel is the effective opacity of whichever visible
// layer painted it last, not an accumulation. Pure function of the state;
// compositing twice yields identical images.

/// Flatten `frame_idx` at full opacity.
pub fn composite_frame(state: &CanvasState, frame_idx: usize) -> RgbaImage {
    composite_frame_with_alpha(state, frame_idx, 1.0)
}

/// Flatten `frame_idx`, scaling every layer's opacity by `global_alpha`
/// (preview and onion-skin paths pass values below 1.0).
pub fn composite_frame_with_alpha(
    state: &CanvasState,
    frame_idx: usize,
    global_alpha: f32,
) -> RgbaImage {
    let mut out = RgbaImage::new(state.width, state.height);
    let Some(frame) = state.frames.get(frame_idx) else {
        return out;
    };
    let layer_count = state.layers.len();

    for l in (0..layer_count).rev() {
        let meta = &state.layers[l];
        if !meta.visible {
            continue;
        }

        // Clip-to-below: resolve the mask to the nearest non-clipped layer
        // underneath. A clipped layer whose mask layer is invisible, or a
        // clipped layer at the bottom of the stack, contributes nothing.
        let mut mask: Option<(usize, i32, i32)> = None;
        if meta.clipped {
            if l + 1 >= layer_count {
                continue;
            }
            let mut base = l + 1;
            while base < layer_count - 1 && state.layers[base].clipped {
                base += 1;
            }
            if !state.layers[base].visible {
                continue;
            }
            mask = Some((base, state.layers[base].x, state.layers[base].y));
        }

        let alpha = (meta.opacity as f32 * global_alpha).round().clamp(0.0, 255.0) as u8;
        for (lx, ly, color) in frame[l].iter() {
            let sx = lx + meta.x;
            let sy = ly + meta.y;

            // Mask correspondence happens in canvas-absolute space
            if let Some((base, mox, moy)) = mask
                && !frame[base].contains(sx - mox, sy - moy)
            {
                continue;
            }

            if sx >= 0 && sx < state.width as i32 && sy >= 0 && sy < state.height as i32 {
                let [r, g, b, _] = unpack_rgba(color);
                out.put_pixel(sx as u32, sy as u32, image::Rgba([r, g, b, alpha]));
            }
        }
    }
    out
}

/// Pack every frame into a near-square sprite sheet: ⌈√n⌉ columns, frames in
/// index order, row-major.
pub fn composite_sprite_sheet(state: &CanvasState) -> RgbaImage {
    let count = state.frames.len();
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = (count as u32).div_ceil(cols);
    let mut sheet = RgbaImage::new(cols * state.width, rows * state.height);

    for idx in 0..count {
        let frame = composite_frame(state, idx);
        let col = (idx as u32) % cols;
        let row = (idx as u32) / cols;
        image::imageops::replace(
            &mut sheet,
            &frame,
            (col * state.width) as i64,
            (row * state.height) as i64,
        );
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{pack_rgb, pack_rgba};

    fn state() -> CanvasState {
        CanvasState::new(8, 8, None)
    }

    #[test]
    fn topmost_layer_paints_last() {
        let mut s = state();
        s.frames[0][2].set(1, 1, pack_rgb(10, 0, 0));
        s.frames[0][0].set(1, 1, pack_rgb(0, 20, 0));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(1, 1).0, [0, 20, 0, 255]);
    }

    #[test]
    fn invisible_layers_are_skipped() {
        let mut s = state();
        s.frames[0][0].set(2, 2, pack_rgb(10, 0, 0));
        s.frames[0][1].set(2, 2, pack_rgb(0, 10, 0));
        s.layers[0].visible = false;
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(2, 2).0, [0, 10, 0, 255]);
    }

    #[test]
    fn alpha_byte_is_the_last_painter_opacity() {
        let mut s = state();
        s.frames[0][1].set(3, 3, pack_rgb(5, 5, 5)); // opaque below
        s.frames[0][0].set(3, 3, pack_rgb(9, 9, 9));
        s.layers[0].opacity = 128;
        let img = composite_frame(&s, 0);
        // Overwrite blending: the half-transparent top layer's alpha lands
        // in the output even though an opaque layer sits underneath.
        assert_eq!(img.get_pixel(3, 3).0, [9, 9, 9, 128]);
    }

    #[test]
    fn global_alpha_scales_layer_opacity() {
        let mut s = state();
        s.frames[0][0].set(0, 0, pack_rgb(1, 2, 3));
        s.layers[0].opacity = 200;
        let img = composite_frame_with_alpha(&s, 0, 0.5);
        assert_eq!(img.get_pixel(0, 0).0[3], 100);
    }

    #[test]
    fn layer_offset_translates_into_canvas_space() {
        let mut s = state();
        s.layers[0].x = 3;
        s.layers[0].y = 2;
        s.frames[0][0].set(1, 1, pack_rgb(7, 7, 7));
        // Off-canvas after translation: dropped
        s.frames[0][0].set(-10, 0, pack_rgb(8, 8, 8));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(4, 3).0, [7, 7, 7, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn stored_color_alpha_byte_is_ignored_on_composite() {
        let mut s = state();
        s.frames[0][0].set(0, 0, pack_rgba(9, 8, 7, 40));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(0, 0).0, [9, 8, 7, 255]);
    }

    #[test]
    fn clipped_layer_shows_only_over_mask_content() {
        let mut s = state();
        s.layers[0].clipped = true;
        // Mask layer (nearest non-clipped below) has one pixel, offset
        s.layers[1].x = 1;
        s.frames[0][1].set(2, 4, pack_rgb(1, 1, 1)); // abs (3, 4)
        s.frames[0][0].set(3, 4, pack_rgb(200, 0, 0));
        s.frames[0][0].set(5, 5, pack_rgb(200, 0, 0));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(3, 4).0, [200, 0, 0, 255]);
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0, 0]);
    }

    #[test]
    fn clip_chain_resolves_past_clipped_neighbors() {
        let mut s = state();
        s.add_layer(None); // four layers now
        s.layers[0].clipped = true;
        s.layers[1].clipped = true;
        // Layer 2 is the mask for both clipped layers above it
        s.frames[0][2].set(1, 1, pack_rgb(1, 1, 1));
        s.frames[0][0].set(1, 1, pack_rgb(50, 0, 0));
        s.frames[0][0].set(6, 6, pack_rgb(50, 0, 0));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(1, 1).0, [50, 0, 0, 255]);
        assert_eq!(img.get_pixel(6, 6).0, [0, 0, 0, 0]);
    }

    #[test]
    fn clipped_layer_over_invisible_mask_contributes_nothing() {
        let mut s = state();
        s.layers[0].clipped = true;
        s.layers[1].visible = false;
        s.frames[0][1].set(1, 1, pack_rgb(1, 1, 1));
        s.frames[0][0].set(1, 1, pack_rgb(60, 0, 0));
        let img = composite_frame(&s, 0);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn compositing_is_idempotent() {
        let mut s = state();
        s.frames[0][0].set(0, 0, pack_rgb(1, 2, 3));
        s.frames[0][2].set(7, 7, pack_rgb(4, 5, 6));
        s.layers[1].visible = false;
        let a = composite_frame(&s, 0);
        let b = composite_frame(&s, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn sprite_sheet_is_row_major_near_square() {
        let mut s = CanvasState::new(4, 4, None);
        let colors = [
            pack_rgb(10, 0, 0),
            pack_rgb(0, 10, 0),
            pack_rgb(0, 0, 10),
            pack_rgb(10, 10, 0),
            pack_rgb(0, 10, 10),
        ];
        s.frames[0][0].set(0, 0, colors[0]);
        for &c in &colors[1..] {
            s.add_frame();
            s.set_pixel(0, 0, c);
        }
        // 5 frames: 3 columns, 2 rows
        let sheet = composite_sprite_sheet(&s);
        assert_eq!((sheet.width(), sheet.height()), (12, 8));
        for (idx, &c) in colors.iter().enumerate() {
            let [r, g, b, _] = unpack_rgba(c);
            let (col, row) = ((idx as u32) % 3, (idx as u32) / 3);
            assert_eq!(sheet.get_pixel(col * 4, row * 4).0, [r, g, b, 255]);
        }
    }
}
