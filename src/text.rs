//! Bitmap font text rendering.
//!
//! Glyphs are fixed size, one byte per row, most significant bit on the
//! left. They are addressed through a sparse codepoint table: ASCII first,
//! then a handful of Latin-1 letters and two CJK characters.

use alloc::vec;
use alloc::vec::Vec;

use log::{info, warn};

use crate::raster::Surface;
use crate::storage::{read_full, Storage};

/// Codepoint for each glyph index of the stock font.
pub const DEFAULT_CHAR_MAP: [u32; 108] = {
    let mut map = [0u32; 108];
    let mut i = 0;
    while i < 96 {
        map[i] = 32 + i as u32;
        i += 1;
    }
    let extra = [161, 191, 209, 225, 233, 237, 241, 243, 250, 252, 26376, 20320];
    let mut j = 0;
    while j < extra.len() {
        map[96 + j] = extra[j];
        j += 1;
    }
    map
};

/// Fill byte used when no font file is available.
pub const PLACEHOLDER_ROW: u8 = 0xAA;

/// Shape of a font file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FontLayout {
    pub map: &'static [u32],
    /// Columns per glyph, at most 8.
    pub width: u8,
    pub height: u8,
}

impl FontLayout {
    pub const DEFAULT: FontLayout = FontLayout {
        map: &DEFAULT_CHAR_MAP,
        width: 8,
        height: 16,
    };

    /// Expected file size.
    pub fn bytes(&self) -> usize {
        self.map.len() * self.height as usize
    }
}

impl Default for FontLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// UTF-8 decoder over raw bytes.
///
/// A byte that cannot start a sequence, or a sequence cut short by the end
/// of input, is skipped as a single byte.
pub struct Utf8Codepoints<'a> {
    bytes: &'a [u8],
}

impl<'a> Utf8Codepoints<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl Iterator for Utf8Codepoints<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            let (&b0, rest) = self.bytes.split_first()?;
            let (len, init) = match b0 {
                b if b < 0x80 => (1, b as u32),
                b if b & 0xE0 == 0xC0 => (2, (b & 0x1F) as u32),
                b if b & 0xF0 == 0xE0 => (3, (b & 0x0F) as u32),
                b if b & 0xF8 == 0xF0 => (4, (b & 0x07) as u32),
                _ => {
                    self.bytes = rest;
                    continue;
                }
            };
            if self.bytes.len() < len {
                self.bytes = rest;
                continue;
            }
            let cp = self.bytes[1..len]
                .iter()
                .fold(init, |acc, &c| (acc << 6) | (c & 0x3F) as u32);
            self.bytes = &self.bytes[len..];
            return Some(cp);
        }
    }
}

pub struct GlyphTable {
    layout: FontLayout,
    bitmaps: Vec<u8>,
}

impl GlyphTable {
    /// Read a font file; a missing or short file yields the placeholder
    /// pattern instead of an error.
    pub fn load<S: Storage>(storage: &mut S, path: &str, layout: FontLayout) -> Self {
        let mut bitmaps = vec![0u8; layout.bytes()];
        let read = match storage.open(path) {
            Ok(mut file) => read_full(&mut file, &mut bitmaps).unwrap_or(0),
            Err(_) => {
                warn!("font {} not found, using placeholder", path);
                return Self::placeholder(layout);
            }
        };
        if read != bitmaps.len() {
            warn!("font {} incomplete: {}/{} bytes", path, read, bitmaps.len());
            return Self::placeholder(layout);
        }
        info!("font loaded: {} bytes", read);
        Self::with_layout(layout, bitmaps)
    }

    /// Font from an in-memory blob; `None` if it is too short.
    pub fn from_bytes(layout: FontLayout, bytes: &[u8]) -> Option<Self> {
        let n = layout.bytes();
        let bitmaps = bytes.get(..n)?.to_vec();
        Some(Self::with_layout(layout, bitmaps))
    }

    pub fn placeholder(layout: FontLayout) -> Self {
        let bitmaps = vec![PLACEHOLDER_ROW; layout.bytes()];
        Self::with_layout(layout, bitmaps)
    }

    fn with_layout(mut layout: FontLayout, bitmaps: Vec<u8>) -> Self {
        layout.width = layout.width.min(8);
        Self { layout, bitmaps }
    }

    #[inline]
    pub fn glyph_width(&self) -> u8 {
        self.layout.width
    }

    #[inline]
    pub fn glyph_height(&self) -> u8 {
        self.layout.height
    }

    pub fn index_of(&self, codepoint: u32) -> Option<usize> {
        self.layout.map.iter().position(|&c| c == codepoint)
    }

    /// Row bytes of glyph `index`.
    pub fn glyph(&self, index: usize) -> Option<&[u8]> {
        let h = self.layout.height as usize;
        self.bitmaps.get(index * h..(index + 1) * h)
    }
}

/// Render `text` at `(x, y)` and return the cursor after the last glyph.
///
/// `\n` returns to `x` and moves down `(glyph_height + 2) * scale`. Unknown
/// codepoints still advance one glyph width. `scale` 0 draws nothing.
pub fn draw_text(
    surface: &mut Surface<'_>,
    font: &GlyphTable,
    text: impl AsRef<[u8]>,
    x: i32,
    y: i32,
    color: u16,
    scale: u8,
) -> (i32, i32) {
    if scale == 0 {
        return (x, y);
    }
    let s = scale as i32;
    let advance = font.glyph_width() as i32 * s;
    let line = (font.glyph_height() as i32 + 2) * s;
    let (mut cx, mut cy) = (x, y);

    for cp in Utf8Codepoints::new(text.as_ref()) {
        if cp == '\n' as u32 {
            cx = x;
            cy = cy.saturating_add(line);
            continue;
        }
        if let Some(rows) = font.index_of(cp).and_then(|i| font.glyph(i)) {
            draw_glyph(surface, rows, font.glyph_width(), cx, cy, color, s);
        }
        cx = cx.saturating_add(advance);
    }
    (cx, cy)
}

fn draw_glyph(surface: &mut Surface<'_>, rows: &[u8], width: u8, x: i32, y: i32, color: u16, s: i32) {
    for (row, &bits) in rows.iter().enumerate() {
        for col in 0..width {
            if bits & (0x80 >> col) == 0 {
                continue;
            }
            // offsets are byte-sized products; only the origin can be extreme
            let (dx, dy) = (col as i32 * s, row as i32 * s);
            let (px, py) = (x.saturating_add(dx), y.saturating_add(dy));
            if s == 1 {
                surface.draw_pixel(px, py, color);
            } else {
                surface.fill_rect(px, py, s, s, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    fn decode(bytes: &[u8]) -> Vec<u32> {
        Utf8Codepoints::new(bytes).collect()
    }

    fn tiny_font() -> GlyphTable {
        // 'A' is a 2x2 block in the top-left corner, everything else blank
        let layout = FontLayout { map: &DEFAULT_CHAR_MAP, width: 8, height: 2 };
        let mut bytes = vec![0u8; layout.bytes()];
        let a = (b'A' - 32) as usize;
        bytes[a * 2] = 0b1100_0000;
        bytes[a * 2 + 1] = 0b1100_0000;
        GlyphTable::from_bytes(layout, &bytes).unwrap()
    }

    #[test]
    fn default_map_layout() {
        assert_eq!(DEFAULT_CHAR_MAP[0], 32);
        assert_eq!(DEFAULT_CHAR_MAP[95], 127);
        assert_eq!(DEFAULT_CHAR_MAP[96], 161);
        assert_eq!(DEFAULT_CHAR_MAP[107], 20320);
        assert_eq!(FontLayout::DEFAULT.bytes(), 108 * 16);
    }

    #[test]
    fn decodes_multibyte_sequences() {
        assert_eq!(decode("aé中😀".as_bytes()), vec![0x61, 0xE9, 0x4E2D, 0x1F600]);
    }

    #[test]
    fn malformed_lead_byte_is_skipped_alone() {
        assert_eq!(decode(&[0x41, 0xFF, 0x42]), vec![0x41, 0x42]);
        assert_eq!(decode(&[0x80, 0x43]), vec![0x43]);
        // truncated 3-byte sequence: each byte tried as a start
        assert_eq!(decode(&[0x44, 0xE4, 0xB8]), vec![0x44]);
    }

    #[test]
    fn unknown_codepoint_advances_one_glyph() {
        let font = tiny_font();
        let mut buf = vec![0u16; 64 * 8];
        let mut s = Surface::new(&mut buf, 64, 8).unwrap();
        let end = draw_text(&mut s, &font, "中", 0, 0, 0xFFFF, 1);
        assert_eq!(end, (8, 0));
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn newline_resets_column_and_moves_down() {
        let font = tiny_font();
        let mut buf = vec![0u16; 64 * 16];
        let mut s = Surface::new(&mut buf, 64, 16).unwrap();
        let end = draw_text(&mut s, &font, "AB\nA", 3, 1, 0x1111, 2);
        assert_eq!(end, (3 + 16, 1 + 8));
        // second 'A' at (3, 9), scale 2: covers x 3..7, y 9..13
        assert_eq!(s.pixel(3, 9), Some(0x1111));
        assert_eq!(s.pixel(6, 12), Some(0x1111));
        assert_eq!(s.pixel(7, 12), Some(0));
    }

    #[test]
    fn scale_zero_draws_nothing() {
        let font = tiny_font();
        let mut buf = vec![0u16; 16 * 4];
        let mut s = Surface::new(&mut buf, 16, 4).unwrap();
        assert_eq!(draw_text(&mut s, &font, "AAA", 2, 2, 0xFFFF, 0), (2, 2));
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn text_far_off_screen_is_dropped() {
        let font = GlyphTable::placeholder(FontLayout::DEFAULT);
        let mut buf = vec![0u16; 16 * 16];
        let mut s = Surface::new(&mut buf, 16, 16).unwrap();
        for (x, y) in [(i32::MAX - 3, 0), (0, i32::MAX - 3), (i32::MIN, i32::MIN)] {
            draw_text(&mut s, &font, "AB\nC", x, y, 0xFFFF, 1);
            draw_text(&mut s, &font, "AB\nC", x, y, 0xFFFF, 3);
        }
        assert_eq!(draw_text(&mut s, &font, "AB", i32::MAX - 3, 0, 0xFFFF, 1), (i32::MAX, 0));
        assert!(s.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn missing_or_short_font_falls_back_to_placeholder() {
        let mut storage = MemStorage::new();
        storage.insert("short.bin", vec![0xFF; 10]);
        let font = GlyphTable::load(&mut storage, "short.bin", FontLayout::DEFAULT);
        assert_eq!(font.glyph(0), Some(&[PLACEHOLDER_ROW; 16][..]));
        let font = GlyphTable::load(&mut storage, "none.bin", FontLayout::DEFAULT);
        assert_eq!(font.glyph(107), Some(&[PLACEHOLDER_ROW; 16][..]));
        assert_eq!(font.glyph(108), None);
    }
}
