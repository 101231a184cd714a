//! Compressed image decoding and placement on the panel.
//!
//! Decoding itself sits behind [`ImageDecoder`]; the crate ships
//! [`ZlibRgb565Decoder`] for its own container (`[w u16 LE][h u16 LE]`
//! followed by a zlib stream of little-endian RGB565 pixels). Placement comes
//! in two flavours matching the two buffering strategies: [`CoverMap`]
//! scales an image to cover the panel one stripe at a time, and
//! [`blit_centered`] crops or letterboxes it into a full frame.

use alloc::boxed::Box;
use core::fmt;

use miniz_oxide::inflate::stream::{inflate, InflateState};
use miniz_oxide::{DataFormat, MZFlush, MZStatus};

use crate::memory::try_zeroed;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Input shorter than the header, or a zero dimension.
    Header,
    /// Compressed stream is damaged or ends early.
    Corrupt,
    /// Output buffer cannot hold the decoded image.
    OutputTooSmall { needed: usize, available: usize },
    /// Scratch memory for decoding was not available.
    NoMemory,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Header => f.write_str("bad image header"),
            DecodeError::Corrupt => f.write_str("corrupt image data"),
            DecodeError::OutputTooSmall { needed, available } => write!(
                f,
                "image needs {} pixels, buffer holds {}",
                needed, available
            ),
            DecodeError::NoMemory => f.write_str("no memory for decoder"),
        }
    }
}

/// Downscale applied while decoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeScale {
    Full,
    Half,
    Quarter,
    Eighth,
}

impl DecodeScale {
    #[inline]
    pub const fn divisor(self) -> u16 {
        match self {
            DecodeScale::Full => 1,
            DecodeScale::Half => 2,
            DecodeScale::Quarter => 4,
            DecodeScale::Eighth => 8,
        }
    }

    /// Pick a downscale from the free heap: more than 130000 bytes decodes
    /// at half size, more than 70000 at a quarter, anything less at an
    /// eighth.
    pub const fn for_free_memory(free_bytes: usize) -> Self {
        if free_bytes > 130_000 {
            DecodeScale::Half
        } else if free_bytes > 70_000 {
            DecodeScale::Quarter
        } else {
            DecodeScale::Eighth
        }
    }

    /// Decode buffer budget for a 480x320 source at this scale.
    pub const fn budget_pixels(self) -> usize {
        let d = self.divisor() as usize;
        (480 / d) * (320 / d)
    }

    /// Output size of a `width x height` source.
    #[inline]
    pub const fn apply(self, width: u16, height: u16) -> (u16, u16) {
        let d = self.divisor();
        (width.div_ceil(d), height.div_ceil(d))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u16,
    pub height: u16,
}

impl DecodedImage {
    #[inline]
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

pub trait ImageDecoder {
    /// Output dimensions for `input` at `scale`, without decoding.
    fn dimensions(&self, input: &[u8], scale: DecodeScale) -> Result<DecodedImage, DecodeError>;

    /// Decode into `out` as host-order RGB565, row major.
    fn decode(
        &mut self,
        input: &[u8],
        scale: DecodeScale,
        out: &mut [u16],
    ) -> Result<DecodedImage, DecodeError>;
}

pub const ZLIB_HEADER_LEN: usize = 4;

#[derive(Copy, Clone, Debug, Default)]
pub struct ZlibRgb565Decoder;

impl ZlibRgb565Decoder {
    fn header(input: &[u8]) -> Result<(u16, u16), DecodeError> {
        let h = input.get(..ZLIB_HEADER_LEN).ok_or(DecodeError::Header)?;
        let w = u16::from_le_bytes([h[0], h[1]]);
        let ht = u16::from_le_bytes([h[2], h[3]]);
        if w == 0 || ht == 0 {
            return Err(DecodeError::Header);
        }
        Ok((w, ht))
    }
}

impl ImageDecoder for ZlibRgb565Decoder {
    fn dimensions(&self, input: &[u8], scale: DecodeScale) -> Result<DecodedImage, DecodeError> {
        let (w, h) = Self::header(input)?;
        let (width, height) = scale.apply(w, h);
        Ok(DecodedImage { width, height })
    }

    fn decode(
        &mut self,
        input: &[u8],
        scale: DecodeScale,
        out: &mut [u16],
    ) -> Result<DecodedImage, DecodeError> {
        let (src_w, src_h) = Self::header(input)?;
        let d = scale.divisor() as usize;
        let (out_w, out_h) = scale.apply(src_w, src_h);
        let img = DecodedImage { width: out_w, height: out_h };
        if out.len() < img.pixels() {
            return Err(DecodeError::OutputTooSmall {
                needed: img.pixels(),
                available: out.len(),
            });
        }

        // One source row at a time; only every d-th row and column is kept.
        let mut row = try_zeroed::<u8>(src_w as usize * 2).ok_or(DecodeError::NoMemory)?;
        let mut state: Box<InflateState> = InflateState::new_boxed(DataFormat::Zlib);
        let mut stream = &input[ZLIB_HEADER_LEN..];
        let ow = out_w as usize;

        for sy in 0..src_h as usize {
            inflate_exact(&mut state, &mut stream, &mut row)?;
            if sy % d != 0 {
                continue;
            }
            let dst = &mut out[(sy / d) * ow..(sy / d + 1) * ow];
            for (ox, px) in dst.iter_mut().enumerate() {
                let i = ox * d * 2;
                *px = u16::from_le_bytes([row[i], row[i + 1]]);
            }
        }
        Ok(img)
    }
}

// Inflate exactly `buf.len()` bytes, advancing `input` past what was used.
fn inflate_exact(state: &mut InflateState, input: &mut &[u8], buf: &mut [u8]) -> Result<(), DecodeError> {
    let mut filled = 0;
    while filled < buf.len() {
        let res = inflate(state, input, &mut buf[filled..], MZFlush::None);
        *input = &input[res.bytes_consumed..];
        filled += res.bytes_written;
        match res.status {
            Ok(MZStatus::StreamEnd) if filled < buf.len() => return Err(DecodeError::Corrupt),
            Ok(_) if res.bytes_consumed == 0 && res.bytes_written == 0 => {
                return Err(DecodeError::Corrupt)
            }
            Ok(_) => {}
            Err(_) => return Err(DecodeError::Corrupt),
        }
    }
    Ok(())
}

/// Cover-mode placement: the image is scaled uniformly until it covers the
/// whole target, centered, and whatever spills over is cropped.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoverMap {
    src_w: u16,
    src_h: u16,
    scale: f32,
    offset_x: i32,
    offset_y: i32,
}

impl CoverMap {
    pub fn new(image: DecodedImage, dst_w: u16, dst_h: u16) -> Option<Self> {
        if image.width == 0 || image.height == 0 {
            return None;
        }
        let sx = dst_w as f32 / image.width as f32;
        let sy = dst_h as f32 / image.height as f32;
        let scale = libm::fmaxf(sx, sy);
        let scaled_w = libm::truncf(image.width as f32 * scale) as i32;
        let scaled_h = libm::truncf(image.height as f32 * scale) as i32;
        Some(Self {
            src_w: image.width,
            src_h: image.height,
            scale,
            offset_x: (dst_w as i32 - scaled_w) / 2,
            offset_y: (dst_h as i32 - scaled_h) / 2,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    #[inline]
    fn source(&self, screen: i32, offset: i32, limit: u16) -> Option<usize> {
        // truncation toward zero, so a sliver left of the origin still maps to 0
        let s = libm::truncf((screen - offset) as f32 / self.scale) as i32;
        if s < 0 || s >= limit as i32 {
            None
        } else {
            Some(s as usize)
        }
    }

    /// Render target rows `first_row .. first_row + out.len() / width` of a
    /// `width` wide target from `src`. Uncovered pixels are black.
    pub fn render_rows(&self, src: &[u16], first_row: u16, width: u16, out: &mut [u16]) {
        let w = width as usize;
        if w == 0 {
            return;
        }
        let sw = self.src_w as usize;
        for (y, line) in out.chunks_exact_mut(w).enumerate() {
            let screen_y = first_row as i32 + y as i32;
            let Some(sy) = self.source(screen_y, self.offset_y, self.src_h) else {
                line.fill(0);
                continue;
            };
            for (x, px) in line.iter_mut().enumerate() {
                *px = match self.source(x as i32, self.offset_x, self.src_w) {
                    Some(sx) => src.get(sy * sw + sx).copied().unwrap_or(0),
                    None => 0,
                };
            }
        }
    }
}

/// Copy `image` into the center of a `frame_w x frame_h` frame at 1:1,
/// cropping what does not fit. The rest of the frame is cleared to black.
pub fn blit_centered(frame: &mut [u16], frame_w: u16, frame_h: u16, src: &[u16], image: DecodedImage) {
    let (fw, fh) = (frame_w as i32, frame_h as i32);
    let (iw, ih) = (image.width as i32, image.height as i32);
    let frame_len = (fw * fh) as usize;
    if frame.len() < frame_len || src.len() < image.pixels() {
        return;
    }
    frame[..frame_len].fill(0);

    let mut off_x = (fw - iw) / 2;
    let mut off_y = (fh - ih) / 2;
    let (mut src_x, mut src_y) = (0, 0);
    let (mut copy_w, mut copy_h) = (iw, ih);
    if off_x < 0 {
        src_x = -off_x;
        copy_w = fw;
        off_x = 0;
    }
    if off_y < 0 {
        src_y = -off_y;
        copy_h = fh;
        off_y = 0;
    }
    copy_w = copy_w.min(fw - off_x);
    copy_h = copy_h.min(fh - off_y);

    for y in 0..copy_h {
        let d = ((off_y + y) * fw + off_x) as usize;
        let s = ((src_y + y) * iw + src_x) as usize;
        frame[d..d + copy_w as usize].copy_from_slice(&src[s..s + copy_w as usize]);
    }
}
