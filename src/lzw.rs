use std::collections::HashMap;

// ============================================================================
// GIF-FLAVOR LZW COMPRESSOR
// ============================================================================
//
// Variable-width LZW as the GIF image-data stream wants it: a minimum code
// size byte, then LSB-first packed codes chunked into <=255-byte sub-blocks.
// Code width starts at min+1 and grows to at most 12 bits; when the
// dictionary hits 4096 entries a clear code is emitted mid-stream and the
// dictionary starts over.

const MAX_CODE: u16 = 4096;
const MAX_WIDTH: u32 = 12;

/// LSB-first bit packer emitting 254-byte GIF sub-blocks.
struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    datum: u32,
    bits: u32,
    block: Vec<u8>,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            datum: 0,
            bits: 0,
            block: Vec::with_capacity(254),
        }
    }

    fn write_code(&mut self, code: u16, width: u32) {
        self.datum |= (code as u32) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.block.push(self.datum as u8);
            self.datum >>= 8;
            self.bits -= 8;
            if self.block.len() == 254 {
                self.flush_block();
            }
        }
    }

    fn flush_block(&mut self) {
        if !self.block.is_empty() {
            self.out.push(self.block.len() as u8);
            self.out.extend_from_slice(&self.block);
            self.block.clear();
        }
    }

    /// Pad the partial byte and emit whatever sub-block remains.
    fn finish(mut self) {
        if self.bits > 0 {
            self.block.push(self.datum as u8);
            if self.block.len() == 254 {
                self.flush_block();
            }
        }
        self.flush_block();
    }
}

/// Compress `indices` into `out`: minimum-code-size byte followed by the
/// packed code stream in sub-blocks. The caller writes the 0 block
/// terminator after this returns.
///
/// Greedy longest-match over a dictionary keyed by (prefix code, next
/// index); root strings are the codes `0..1<<min_code_size` themselves, so
/// they never need dictionary entries.
pub fn compress(out: &mut Vec<u8>, indices: &[u8], min_code_size: u8) {
    out.push(min_code_size);

    let clear_code: u16 = 1 << min_code_size;
    let end_code: u16 = clear_code + 1;
    let base_width: u32 = min_code_size as u32 + 1;

    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next_code = end_code + 1;
    let mut width = base_width;

    let mut writer = BitWriter::new(out);
    writer.write_code(clear_code, width);

    let mut prefix: Option<u16> = None;
    for &index in indices {
        let p = match prefix {
            None => {
                prefix = Some(index as u16);
                continue;
            }
            Some(p) => p,
        };
        if let Some(&code) = dict.get(&(p, index)) {
            prefix = Some(code);
            continue;
        }
        writer.write_code(p, width);
        // The decoder's table trails the emitted code by one entry, so the
        // width check compares the pre-insert count: once it fills the
        // current code space, the *next* code goes out one bit wider.
        if u32::from(next_code) >= 1 << width && width < MAX_WIDTH {
            width += 1;
        }
        if next_code < MAX_CODE {
            dict.insert((p, index), next_code);
            next_code += 1;
        } else {
            // Dictionary full: clear at the current width, start over.
            writer.write_code(clear_code, width);
            dict.clear();
            next_code = end_code + 1;
            width = base_width;
        }
        prefix = Some(index as u16);
    }

    if let Some(p) = prefix {
        writer.write_code(p, width);
        // A reader adds a table entry for this code too and may grow its
        // width before reading the end code.
        if u32::from(next_code) >= 1 << width && width < MAX_WIDTH {
            width += 1;
        }
    }
    writer.write_code(end_code, width);
    writer.finish();
}
