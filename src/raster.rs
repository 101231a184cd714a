//! Clipped drawing into a borrowed RGB565 buffer.
//!
//! `Surface` never owns pixels: it wraps whatever buffer the double buffer,
//! the stripe buffer or a preloaded frame hands out, for the length of a
//! call. It also implements embedded-graphics' `DrawTarget`, so primitives
//! and mono fonts from that crate render into the same buffers.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::warn;

use crate::driver::Error;
use crate::storage::{read_full, Storage, StorageFile};

pub struct Surface<'a> {
    buf: &'a mut [u16],
    width: u16,
    height: u16,
}

impl<'a> Surface<'a> {
    /// `None` if `buf` holds fewer than `width * height` pixels.
    pub fn new(buf: &'a mut [u16], width: u16, height: u16) -> Option<Self> {
        let n = width as usize * height as usize;
        if buf.len() < n {
            return None;
        }
        Some(Self {
            buf: &mut buf[..n],
            width,
            height,
        })
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.buf[..]
    }

    pub fn fill_screen(&mut self, color: u16) {
        fill_words(self.buf, color);
    }

    /// Fill `w x h` at `(x, y)`, clipped to the surface. Degenerate or fully
    /// outside rectangles are ignored.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u16) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        let width = self.width as usize;
        if x0 == 0 && x1 == width {
            fill_words(&mut self.buf[y0 * width..y1 * width], color);
        } else {
            for row in y0..y1 {
                self.buf[row * width + x0..row * width + x1].fill(color);
            }
        }
    }

    // Half-open pixel bounds of the visible part of a rectangle.
    fn clip(&self, x: i32, y: i32, w: i32, h: i32) -> Option<(usize, usize, usize, usize)> {
        if w <= 0 || h <= 0 {
            return None;
        }
        let (x, y, w, h) = (x as i64, y as i64, w as i64, h as i64);
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(self.width as i64);
        let y1 = (y + h).min(self.height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }

    #[inline]
    pub fn draw_pixel(&mut self, x: i32, y: i32, color: u16) {
        if let Some(i) = self.index(x, y) {
            self.buf[i] = color;
        }
    }

    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> Option<u16> {
        self.index(x, y).map(|i| self.buf[i])
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Solid fill writing two pixels per `u32` store over the aligned middle.
pub fn fill_words(dst: &mut [u16], color: u16) {
    let half = color.to_ne_bytes();
    let packed = u32::from_ne_bytes([half[0], half[1], half[0], half[1]]);
    let (head, mid, tail) = bytemuck::pod_align_to_mut::<u16, u32>(dst);
    head.fill(color);
    mid.fill(packed);
    tail.fill(color);
}

/// Load a raw full-frame file (host-order RGB565) into `buf`. The file must
/// be exactly `pixels * 2` bytes.
pub fn load_raw_image<S: Storage>(
    storage: &mut S,
    path: &str,
    buf: &mut [u16],
    pixels: usize,
) -> Result<(), Error> {
    let expected = pixels * 2;
    if buf.len() < pixels {
        return Err(Error::SizeMismatch {
            expected,
            actual: buf.len() * 2,
        });
    }
    let mut file = storage.open(path).map_err(|e| {
        warn!("cannot open {}: {}", path, e);
        Error::Storage(e)
    })?;
    if file.size() != expected {
        warn!("{}: {} bytes, expected {}", path, file.size(), expected);
        return Err(Error::SizeMismatch {
            expected,
            actual: file.size(),
        });
    }
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut buf[..pixels]);
    let read = read_full(&mut file, bytes)?;
    if read != expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: read,
        });
    }
    Ok(())
}

// -------------------- embedded-graphics integration --------------------
impl OriginDimensions for Surface<'_> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for Surface<'_> {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Rgb565>>,
    {
        for Pixel(p, c) in pixels {
            self.draw_pixel(p.x, p.y, c.into_storage());
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Rgb565>,
    {
        let area_w = area.size.width as usize;
        let inter = area.intersection(&self.bounding_box());
        let mut it = colors.into_iter();
        if inter.size.width == 0 || inter.size.height == 0 {
            return Ok(());
        }

        let left_skip = (inter.top_left.x - area.top_left.x) as usize;
        let take = inter.size.width as usize;
        let right_skip = area_w - left_skip - take;
        let top_skip = (inter.top_left.y - area.top_left.y) as usize;

        for _ in 0..top_skip * area_w {
            it.next();
        }

        let width = self.width as usize;
        let x0 = inter.top_left.x as usize;
        for ry in 0..inter.size.height as usize {
            for _ in 0..left_skip {
                it.next();
            }
            let base = (inter.top_left.y as usize + ry) * width + x0;
            for px in &mut self.buf[base..base + take] {
                match it.next() {
                    Some(c) => *px = c.into_storage(),
                    None => return Ok(()),
                }
            }
            for _ in 0..right_skip {
                it.next();
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Rgb565) -> Result<(), Self::Error> {
        let w = area.size.width.min(i32::MAX as u32) as i32;
        let h = area.size.height.min(i32::MAX as u32) as i32;
        self.fill_rect(area.top_left.x, area.top_left.y, w, h, color.into_storage());
        Ok(())
    }

    fn clear(&mut self, color: Rgb565) -> Result<(), Self::Error> {
        self.fill_screen(color.into_storage());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use proptest::prelude::*;

    fn slow_fill(buf: &mut [u16], w: u16, h: u16, x: i32, y: i32, rw: i32, rh: i32, c: u16) {
        let mut s = Surface::new(buf, w, h).unwrap();
        for yy in y..y.saturating_add(rh.max(0)) {
            for xx in x..x.saturating_add(rw.max(0)) {
                s.draw_pixel(xx, yy, c);
            }
        }
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buf = [0u16; 10];
        assert!(Surface::new(&mut buf, 4, 3).is_none());
        assert!(Surface::new(&mut buf, 5, 2).is_some());
    }

    #[test]
    fn fill_screen_covers_every_pixel_at_any_alignment() {
        for c in [0x0000u16, 0xFFFF, 0x1234] {
            for offset in 0..2 {
                // odd length so both a head and a tail word can appear
                let mut buf = vec![0xBEEFu16; 5 * 3 + 2];
                let end = offset + 15;
                Surface::new(&mut buf[offset..end], 5, 3).unwrap().fill_screen(c);
                assert!(buf[offset..end].iter().all(|&p| p == c), "{:#06x} at +{}", c, offset);
                assert!(buf[..offset].iter().all(|&p| p == 0xBEEF));
                assert!(buf[end..].iter().all(|&p| p == 0xBEEF));
            }
        }
    }

    #[test]
    fn out_of_bounds_pixels_are_ignored() {
        let mut buf = [0u16; 12];
        let mut s = Surface::new(&mut buf, 4, 3).unwrap();
        s.draw_pixel(-1, 0, 0xFFFF);
        s.draw_pixel(4, 0, 0xFFFF);
        s.draw_pixel(0, 3, 0xFFFF);
        s.draw_pixel(3, 2, 0x1234);
        assert_eq!(s.pixel(3, 2), Some(0x1234));
        assert_eq!(s.pixel(4, 2), None);
        assert_eq!(buf.iter().filter(|&&p| p != 0).count(), 1);
    }

    #[test]
    fn degenerate_rects_do_nothing() {
        let mut buf = [0u16; 16];
        let mut s = Surface::new(&mut buf, 4, 4).unwrap();
        s.fill_rect(0, 0, 0, 4, 1);
        s.fill_rect(0, 0, 4, -2, 1);
        s.fill_rect(10, 10, 4, 4, 1);
        s.fill_rect(-10, -10, 5, 5, 1);
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn negative_origin_is_clipped() {
        let mut buf = [0u16; 16];
        let mut s = Surface::new(&mut buf, 4, 4).unwrap();
        s.fill_rect(-1, -1, 3, 3, 7);
        assert_eq!(&buf[..4], &[7, 7, 0, 0]);
        assert_eq!(&buf[4..8], &[7, 7, 0, 0]);
        assert_eq!(&buf[8..], &[0; 8]);
    }

    #[test]
    fn embedded_graphics_rectangle_lands_in_buffer() {
        let mut buf = [0u16; 25];
        let mut s = Surface::new(&mut buf, 5, 5).unwrap();
        Rectangle::new(Point::new(1, 1), Size::new(2, 2))
            .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
            .draw(&mut s)
            .unwrap();
        assert_eq!(s.pixel(1, 1), Some(0xF800));
        assert_eq!(s.pixel(2, 2), Some(0xF800));
        assert_eq!(s.pixel(3, 3), Some(0));
    }

    #[test]
    fn contiguous_fill_is_clipped_and_ordered() {
        let mut buf = [0u16; 9];
        let mut s = Surface::new(&mut buf, 3, 3).unwrap();
        let area = Rectangle::new(Point::new(-1, 1), Size::new(3, 3));
        let colors = (1..=9u16).map(crate::color::to_rgb565);
        s.fill_contiguous(&area, colors).unwrap();
        // area rows 0,1 are visible as surface rows 1,2 with column -1 dropped
        assert_eq!(buf, [0, 0, 0, 2, 3, 0, 5, 6, 0]);
    }

    #[test]
    fn raw_image_size_is_checked() {
        let mut storage = MemStorage::new();
        storage.insert("ok.bin", [0x34u8, 0x12].repeat(6));
        storage.insert("short.bin", vec![0; 10]);
        let mut buf = [0u16; 6];
        load_raw_image(&mut storage, "ok.bin", &mut buf, 6).unwrap();
        assert_eq!(buf, [u16::from_ne_bytes([0x34, 0x12]); 6]);
        assert_eq!(
            load_raw_image(&mut storage, "short.bin", &mut buf, 6),
            Err(Error::SizeMismatch { expected: 12, actual: 10 })
        );
        assert!(matches!(
            load_raw_image(&mut storage, "missing.bin", &mut buf, 6),
            Err(Error::Storage(_))
        ));
    }

    proptest! {
        #[test]
        fn fast_path_matches_per_pixel(
            w in 1u16..24, h in 1u16..12,
            x in -8i32..30, y in -8i32..16,
            rw in -2i32..40, rh in -2i32..20,
            c in any::<u16>(), offset in 0usize..2,
        ) {
            let n = w as usize * h as usize;
            // offset shifts alignment so the u32 split is exercised both ways
            let mut fast = vec![0u16; n + 1];
            let mut slow = vec![0u16; n];
            Surface::new(&mut fast[offset..], w, h).unwrap().fill_rect(x, y, rw, rh, c);
            slow_fill(&mut slow, w, h, x, y, rw, rh, c);
            prop_assert_eq!(&fast[offset..offset + n], &slow[..]);
        }

        #[test]
        fn full_width_band_uses_fast_path_correctly(w in 1u16..32, h in 2u16..10, c in any::<u16>()) {
            let n = w as usize * h as usize;
            let mut buf = vec![0u16; n];
            Surface::new(&mut buf, w, h).unwrap().fill_rect(0, 1, w as i32, h as i32, c);
            prop_assert!(buf[..w as usize].iter().all(|&p| p == 0));
            prop_assert!(buf[w as usize..].iter().all(|&p| p == c));
        }
    }
}
