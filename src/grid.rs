use std::collections::HashMap;

// ============================================================================
// PACKED COLOR
// ============================================================================

/// Packed 32-bit RGBA color, byte order low-to-high = R, G, B, A.
///
/// `0` is the "absent" sentinel: an opaque pixel always carries alpha 255 in
/// the top byte, so no stored color can collide with it.
pub type PackedColor = u32;

/// The absent/transparent sentinel. Never stored inside a [`PixelGrid`].
pub const TRANSPARENT: PackedColor = 0;

/// Pack RGBA bytes into a [`PackedColor`].
#[inline]
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> PackedColor {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Pack an opaque RGB color (alpha forced to 255).
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> PackedColor {
    pack_rgba(r, g, b, 255)
}

/// Unpack a [`PackedColor`] into `[r, g, b, a]` bytes.
#[inline]
pub fn unpack_rgba(color: PackedColor) -> [u8; 4] {
    [
        color as u8,
        (color >> 8) as u8,
        (color >> 16) as u8,
        (color >> 24) as u8,
    ]
}

// ============================================================================
// SPARSE PIXEL GRID
// ============================================================================

/// Widen both signed coordinates into a single u64 key.
/// Sign-safe: each i32 is reinterpreted as u32 before shifting, so negative
/// coordinates (off-canvas pixels are legal) hash and compare correctly.
#[inline]
fn pack_key(x: i32, y: i32) -> u64 {
    ((x as u32 as u64) << 32) | (y as u32 as u64)
}

#[inline]
fn unpack_key(key: u64) -> (i32, i32) {
    ((key >> 32) as u32 as i32, key as u32 as i32)
}

/// Sparse pixel storage for one layer of one frame.
///
/// Maps integer coordinates (layer-local, unbounded — entries may lie outside
/// the canvas rectangle) to packed RGBA colors. Absence of a key means fully
/// transparent. Invariant: the map never contains [`TRANSPARENT`]; writing it
/// deletes the entry instead.
///
/// `clone()` is a deep copy — history snapshots rely on a cloned grid being
/// fully independent of subsequent live mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelGrid {
    pixels: HashMap<u64, PackedColor>,
}

impl PixelGrid {
    pub fn new() -> Self {
        Self {
            pixels: HashMap::new(),
        }
    }

    /// Color at (x, y); [`TRANSPARENT`] when the coordinate is unoccupied.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> PackedColor {
        self.pixels.get(&pack_key(x, y)).copied().unwrap_or(TRANSPARENT)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.pixels.contains_key(&pack_key(x, y))
    }

    /// Write `color` at (x, y). Returns `true` if the grid changed.
    ///
    /// Writing [`TRANSPARENT`] deletes the entry; writing the value already
    /// stored is a no-op (callers use the return value for dirty tracking).
    pub fn set(&mut self, x: i32, y: i32, color: PackedColor) -> bool {
        let key = pack_key(x, y);
        if color == TRANSPARENT {
            self.pixels.remove(&key).is_some()
        } else if self.pixels.get(&key) != Some(&color) {
            self.pixels.insert(key, color);
            true
        } else {
            false
        }
    }

    /// Remove the entry at (x, y). Returns `true` if one existed.
    pub fn delete(&mut self, x: i32, y: i32) -> bool {
        self.pixels.remove(&pack_key(x, y)).is_some()
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Iterate all occupied cells as `(x, y, color)`.
    ///
    /// Order is arbitrary and carries no meaning: each coordinate is a unique
    /// key, so consumers never depend on enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, PackedColor)> + '_ {
        self.pixels.iter().map(|(&key, &color)| {
            let (x, y) = unpack_key(key);
            (x, y, color)
        })
    }
}
