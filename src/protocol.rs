//! ST77xx command set, orientation mapping and window normalization.

use crate::config::Geometry;

/// Controller opcodes (command phase, D/C low).
pub mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVOFF: u8 = 0x20;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A; // column address set
    pub const RASET: u8 = 0x2B; // row address set
    pub const RAMWR: u8 = 0x2C; // memory write
    pub const MADCTL: u8 = 0x36; // memory access control
    pub const COLMOD: u8 = 0x3A; // pixel format
    pub const PORCTRL: u8 = 0xB2;
    pub const GCTRL: u8 = 0xB7;
    pub const VCOMS: u8 = 0xBB;
}

/// COLMOD payload for 16-bit RGB565.
pub const COLMOD_RGB565: u8 = 0x55;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
    PortraitInverted,
    LandscapeInverted,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Portrait,
        Orientation::Landscape,
        Orientation::PortraitInverted,
        Orientation::LandscapeInverted,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Orientation::Portrait => 0,
            Orientation::Landscape => 1,
            Orientation::PortraitInverted => 2,
            Orientation::LandscapeInverted => 3,
        }
    }

    /// MADCTL byte for this orientation from a model table.
    #[inline]
    pub const fn madctl(self, table: &[u8; 4]) -> u8 {
        table[self.index()]
    }
}

/// A panel-local address window, sorted and clamped to the panel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Window {
    /// Normalize a raw window: reversed pairs are swapped, then both ends
    /// are clamped to `[0, width-1] x [0, height-1]`.
    pub fn new(x0: u16, y0: u16, x1: u16, y1: u16, geometry: &Geometry) -> Self {
        let (x0, x1) = if x0 > x1 { (x1, x0) } else { (x0, x1) };
        let (y0, y1) = if y0 > y1 { (y1, y0) } else { (y0, y1) };
        let max_x = geometry.width.saturating_sub(1);
        let max_y = geometry.height.saturating_sub(1);
        Self {
            x0: x0.min(max_x),
            y0: y0.min(max_y),
            x1: x1.min(max_x),
            y1: y1.min(max_y),
        }
    }

    pub fn full(geometry: &Geometry) -> Self {
        Self::new(0, 0, geometry.width, geometry.height, geometry)
    }

    /// Rows `first ..= first + lines - 1` across the whole width.
    pub fn rows(first: u16, lines: u16, geometry: &Geometry) -> Self {
        let last = first.saturating_add(lines.saturating_sub(1));
        Self::new(0, first, geometry.width, last, geometry)
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.x1 - self.x0 + 1
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.y1 - self.y0 + 1
    }

    #[inline]
    pub fn pixels(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// CASET payload: big-endian start/end columns with the offset applied.
    pub fn caset(&self, geometry: &Geometry) -> [u8; 4] {
        be_pair(
            self.x0.saturating_add(geometry.x_offset),
            self.x1.saturating_add(geometry.x_offset),
        )
    }

    /// RASET payload: big-endian start/end rows with the offset applied.
    pub fn raset(&self, geometry: &Geometry) -> [u8; 4] {
        be_pair(
            self.y0.saturating_add(geometry.y_offset),
            self.y1.saturating_add(geometry.y_offset),
        )
    }
}

#[inline]
fn be_pair(a: u16, b: u16) -> [u8; 4] {
    let a = a.to_be_bytes();
    let b = b.to_be_bytes();
    [a[0], a[1], b[0], b[1]]
}
