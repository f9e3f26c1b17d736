use std::collections::HashMap;

use image::RgbaImage;

use crate::lzw;

// ============================================================================
// GIF89a CONTAINER WRITER
// ============================================================================
//
// Minimal animated-GIF writer for sprite exports: one 256-entry global color
// table shared by all frames, palette index 0 reserved for transparency,
// disposal mode restore-to-background so transparent animations layer
// correctly. Lossy past 255 distinct opaque colors: overflow maps to index 0.

const MIN_CODE_SIZE: u8 = 8;
const PALETTE_SIZE: usize = 256;

/// Accumulates RGBA frames and serializes them as a GIF89a byte stream.
pub struct GifEncoder {
    width: u16,
    height: u16,
    frames: Vec<(RgbaImage, u32)>,
}

impl GifEncoder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
        }
    }

    /// Queue a frame with its display duration in milliseconds.
    /// The image must match the encoder's dimensions.
    pub fn add_frame(&mut self, image: RgbaImage, delay_ms: u32) {
        debug_assert_eq!(image.width(), self.width as u32);
        debug_assert_eq!(image.height(), self.height as u32);
        self.frames.push((image, delay_ms));
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Serialize every queued frame into a complete GIF89a stream.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"GIF89a");
        write_word(&mut out, self.width);
        write_word(&mut out, self.height);
        // GCT present, 8 bits/pixel, 2^8 table size
        out.push(0xF7);
        out.push(0); // background color index
        out.push(0); // pixel aspect ratio

        let (palette, color_map) = self.build_palette();
        for rgb in &palette {
            out.extend_from_slice(rgb);
        }

        write_loop_extension(&mut out);

        for (image, delay_ms) in &self.frames {
            self.write_frame(&mut out, image, *delay_ms, &color_map);
        }

        out.push(0x3B); // trailer
        out
    }

    /// First-come-first-served palette over all frames. Index 0 stays
    /// reserved as the transparent slot; colors past the 255 available
    /// entries are dropped and will render as index 0.
    fn build_palette(&self) -> (Vec<[u8; 3]>, HashMap<[u8; 3], u8>) {
        let mut palette: Vec<[u8; 3]> = vec![[0, 0, 0]];
        let mut color_map: HashMap<[u8; 3], u8> = HashMap::new();

        for (image, _) in &self.frames {
            for pixel in image.pixels() {
                let [r, g, b, a] = pixel.0;
                if a == 0 {
                    continue;
                }
                let key = [r, g, b];
                if !color_map.contains_key(&key) && palette.len() < PALETTE_SIZE {
                    color_map.insert(key, palette.len() as u8);
                    palette.push(key);
                }
            }
        }

        while palette.len() < PALETTE_SIZE {
            palette.push([0, 0, 0]);
        }
        (palette, color_map)
    }

    fn write_frame(
        &self,
        out: &mut Vec<u8>,
        image: &RgbaImage,
        delay_ms: u32,
        color_map: &HashMap<[u8; 3], u8>,
    ) {
        // Graphics control extension
        out.push(0x21);
        out.push(0xF9);
        out.push(4);
        // Disposal 2 (restore to background), transparency flag set
        out.push(0x09);
        let delay_cs = ((delay_ms as f64) / 10.0).round() as u16;
        write_word(out, delay_cs);
        out.push(0); // transparent color index
        out.push(0); // terminator

        // Image descriptor, full logical screen, global table
        out.push(0x2C);
        write_word(out, 0);
        write_word(out, 0);
        write_word(out, self.width);
        write_word(out, self.height);
        out.push(0);

        let indices: Vec<u8> = image
            .pixels()
            .map(|pixel| {
                let [r, g, b, a] = pixel.0;
                if a == 0 {
                    0
                } else {
                    color_map.get(&[r, g, b]).copied().unwrap_or(0)
                }
            })
            .collect();

        lzw::compress(out, &indices, MIN_CODE_SIZE);
        out.push(0); // block terminator
    }
}

fn write_word(out: &mut Vec<u8>, value: u16) {
    out.push(value as u8);
    out.push((value >> 8) as u8);
}

/// NETSCAPE2.0 application extension, loop count 0 (infinite).
fn write_loop_extension(out: &mut Vec<u8>) {
    out.push(0x21);
    out.push(0xFF);
    out.push(11);
    out.extend_from_slice(b"NETSCAPE2.0");
    out.push(3);
    out.push(1);
    write_word(out, 0);
    out.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_frame(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    #[test]
    fn header_and_screen_descriptor() {
        let mut enc = GifEncoder::new(17, 9);
        enc.add_frame(solid_frame(17, 9, [255, 0, 0, 255]), 100);
        let bytes = enc.encode();

        assert_eq!(&bytes[0..6], b"GIF89a");
        assert_eq!(&bytes[6..8], &[17, 0]); // width LE
        assert_eq!(&bytes[8..10], &[9, 0]); // height LE
        assert_eq!(bytes[10], 0xF7);
        assert_eq!(bytes[11], 0);
        assert_eq!(bytes[12], 0);
        assert_eq!(*bytes.last().unwrap(), 0x3B);
    }

    #[test]
    fn global_color_table_is_768_bytes_with_reserved_zero() {
        let mut enc = GifEncoder::new(2, 1);
        let mut img = solid_frame(2, 1, [10, 20, 30, 255]);
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        enc.add_frame(img, 50);
        let bytes = enc.encode();

        let gct = &bytes[13..13 + 768];
        // Index 0 reserved (black), index 1 the first seen opaque color
        assert_eq!(&gct[0..3], &[0, 0, 0]);
        assert_eq!(&gct[3..6], &[10, 20, 30]);
        // Rest padded with black
        assert_eq!(&gct[6..9], &[0, 0, 0]);
    }

    #[test]
    fn netscape_loop_block_follows_palette() {
        let mut enc = GifEncoder::new(1, 1);
        enc.add_frame(solid_frame(1, 1, [1, 2, 3, 255]), 100);
        let bytes = enc.encode();
        let at = 13 + 768;
        assert_eq!(&bytes[at..at + 3], &[0x21, 0xFF, 11]);
        assert_eq!(&bytes[at + 3..at + 14], b"NETSCAPE2.0");
        assert_eq!(&bytes[at + 14..at + 19], &[3, 1, 0, 0, 0]);
    }

    #[test]
    fn graphics_control_carries_rounded_centisecond_delay() {
        let mut enc = GifEncoder::new(1, 1);
        enc.add_frame(solid_frame(1, 1, [1, 2, 3, 255]), 83); // 12 fps -> 8.3cs -> 8
        let bytes = enc.encode();
        let gce = 13 + 768 + 19;
        assert_eq!(&bytes[gce..gce + 4], &[0x21, 0xF9, 4, 0x09]);
        assert_eq!(&bytes[gce + 4..gce + 6], &[8, 0]);
        assert_eq!(&bytes[gce + 6..gce + 8], &[0, 0]);
    }

    #[test]
    fn palette_overflow_maps_to_index_zero() {
        // 300 distinct colors on a 20x15 frame: only 255 fit alongside the
        // reserved slot, the rest must silently index 0.
        let mut img = RgbaImage::new(20, 15);
        for (i, pixel) in img.pixels_mut().enumerate() {
            *pixel = Rgba([(i % 256) as u8, (i / 256) as u8 + 1, 7, 255]);
        }
        let mut enc = GifEncoder::new(20, 15);
        enc.add_frame(img.clone(), 100);
        let (palette, color_map) = enc.build_palette();
        assert_eq!(palette.len(), 256);
        assert_eq!(color_map.len(), 255);

        let overflowed = img
            .pixels()
            .filter(|p| !color_map.contains_key(&[p.0[0], p.0[1], p.0[2]]))
            .count();
        assert_eq!(overflowed, 300 - 255);
        // Encoding still succeeds and terminates properly
        let bytes = enc.encode();
        assert_eq!(*bytes.last().unwrap(), 0x3B);
    }
}
