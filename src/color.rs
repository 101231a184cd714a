//! RGB888 -> RGB565 quantization.
//
// Plain truncation to 5/6/5 bits, no rounding or dithering.

use embedded_graphics::pixelcolor::{raw::RawU16, Rgb565};
use embedded_graphics::prelude::IntoStorage;

pub const BLACK: u16 = 0x0000;
pub const WHITE: u16 = 0xFFFF;
pub const RED: u16 = 0xF800;
pub const GREEN: u16 = 0x07E0;
pub const BLUE: u16 = 0x001F;

/// Convert an RGB888 triplet to a packed RGB565 value.
#[inline]
pub const fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Same quantization for sources that store blue first.
#[inline]
pub const fn bgr888_to_rgb565(b: u8, g: u8, r: u8) -> u16 {
    rgb888_to_rgb565(r, g, b)
}

// embedded-graphics bridge
#[inline]
pub fn from_rgb565(color: Rgb565) -> u16 {
    color.into_storage()
}

#[inline]
pub fn to_rgb565(raw: u16) -> Rgb565 {
    Rgb565::from(RawU16::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    #[test]
    fn primaries_quantize_to_expected_words() {
        assert_eq!(rgb888_to_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb888_to_rgb565(0, 0, 0), 0x0000);
        assert_eq!(rgb888_to_rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb888_to_rgb565(0, 255, 0), GREEN);
        assert_eq!(rgb888_to_rgb565(0, 0, 255), BLUE);
    }

    #[test]
    fn low_bits_are_truncated_not_rounded() {
        // 7 >> 3 == 0 and 3 >> 2 == 0
        assert_eq!(rgb888_to_rgb565(7, 3, 7), 0x0000);
        assert_eq!(rgb888_to_rgb565(8, 4, 8), (1 << 11) | (1 << 5) | 1);
    }

    #[test]
    fn bgr_order_permutes_arguments() {
        assert_eq!(bgr888_to_rgb565(0, 0, 255), RED);
        assert_eq!(bgr888_to_rgb565(10, 20, 30), rgb888_to_rgb565(30, 20, 10));
    }

    #[test]
    fn embedded_graphics_colors_round_trip() {
        assert_eq!(from_rgb565(Rgb565::RED), RED);
        assert_eq!(to_rgb565(WHITE), Rgb565::WHITE);
        assert_eq!(from_rgb565(to_rgb565(0x1234)), 0x1234);
    }
}
