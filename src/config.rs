//! Panel models and the validated runtime configuration.
//!
//! Each supported controller carries a [`ModelProfile`]: geometry, tuning
//! register payloads, the MADCTL lookup table and the inversion flag. A
//! [`PanelConfig`] starts from a profile, takes builder overrides and is
//! checked once by [`PanelConfig::validate`]; every buffer size used by the
//! rest of the crate derives from it.

use core::fmt;

use crate::protocol::Orientation;

/// Panel geometry in controller pixels plus the RAM offset of the glass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
    pub x_offset: u16,
    pub y_offset: u16,
}

impl Geometry {
    pub const fn new(width: u16, height: u16, x_offset: u16, y_offset: u16) -> Self {
        Self { width, height, x_offset, y_offset }
    }

    #[inline]
    pub const fn frame_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Canonical full-frame size in bytes (RGB565).
    #[inline]
    pub const fn frame_bytes(&self) -> usize {
        self.frame_pixels() * 2
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PanelModel {
    St7789,
    St7796s,
}

/// Model specific constants sent during bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModelProfile {
    pub name: &'static str,
    pub geometry: Geometry,
    /// PORCTRL (0xB2) payload.
    pub porch: [u8; 5],
    /// GCTRL (0xB7) payload.
    pub gate: u8,
    /// VCOMS (0xBB) payload.
    pub vcoms: u8,
    pub invert_colors: bool,
    /// MADCTL byte per orientation, indexed by `Orientation::index`.
    pub madctl: [u8; 4],
    pub default_orientation: Orientation,
}

// MADCTL bits: MY=0x80, MX=0x40, MV=0x20, BGR=0x08
pub const ST7789_PROFILE: ModelProfile = ModelProfile {
    name: "ST7789",
    geometry: Geometry::new(135, 240, 52, 40),
    porch: [0x0C, 0x0C, 0x00, 0x33, 0x33],
    gate: 0x75,
    vcoms: 0x2B,
    invert_colors: true,
    madctl: [0x40, 0x20, 0x80, 0xE0],
    default_orientation: Orientation::LandscapeInverted,
};

pub const ST7796S_PROFILE: ModelProfile = ModelProfile {
    name: "ST7796S",
    geometry: Geometry::new(480, 320, 0, 0),
    porch: [0x0C, 0x0C, 0x00, 0x33, 0x33],
    gate: 0x35,
    vcoms: 0x1A,
    invert_colors: false,
    madctl: [0x48, 0x28, 0x88, 0xE8],
    default_orientation: Orientation::LandscapeInverted,
};

impl PanelModel {
    pub const fn profile(self) -> ModelProfile {
        match self {
            PanelModel::St7789 => ST7789_PROFILE,
            PanelModel::St7796s => ST7796S_PROFILE,
        }
    }
}

pub const DEFAULT_STRIPE_HEIGHT: u16 = 20;
/// Largest single SPI transaction; ESP32 SPI DMA tops out a little above this.
pub const DEFAULT_MAX_TRANSFER: usize = 4096;
pub const DEFAULT_SPI_HZ: u32 = 40_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroGeometry,
    ZeroStripeHeight,
    /// Stripe height must divide the panel height.
    StripeNotDivisor { height: u16, stripe_height: u16 },
    /// Chunks must be even so pixel words never straddle two transfers.
    BadMaxTransfer(usize),
    OffsetOverflow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroGeometry => f.write_str("panel width and height must be non-zero"),
            ConfigError::ZeroStripeHeight => f.write_str("stripe height must be non-zero"),
            ConfigError::StripeNotDivisor { height, stripe_height } => write!(
                f,
                "stripe height {} does not divide panel height {}",
                stripe_height, height
            ),
            ConfigError::BadMaxTransfer(n) => {
                write!(f, "max transfer {} must be even and at least 2", n)
            }
            ConfigError::OffsetOverflow => f.write_str("offset pushes window past u16 range"),
        }
    }
}

/// Validated engine configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    model: PanelModel,
    profile: ModelProfile,
    stripe_height: u16,
    max_transfer: usize,
    swap_bytes: bool,
    spi_hz: u32,
    external_memory: bool,
}

impl PanelConfig {
    pub const fn new(model: PanelModel) -> Self {
        Self {
            model,
            profile: model.profile(),
            stripe_height: DEFAULT_STRIPE_HEIGHT,
            max_transfer: DEFAULT_MAX_TRANSFER,
            swap_bytes: true,
            spi_hz: DEFAULT_SPI_HZ,
            external_memory: false,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.profile.geometry = geometry;
        self
    }

    pub fn with_stripe_height(mut self, lines: u16) -> Self {
        self.stripe_height = lines;
        self
    }

    pub fn with_max_transfer(mut self, bytes: usize) -> Self {
        self.max_transfer = bytes;
        self
    }

    pub fn with_swap_bytes(mut self, swap: bool) -> Self {
        self.swap_bytes = swap;
        self
    }

    pub fn with_spi_hz(mut self, hz: u32) -> Self {
        self.spi_hz = hz;
        self
    }

    /// Declare that a large external pool (PSRAM) backs the heap.
    pub fn with_external_memory(mut self, present: bool) -> Self {
        self.external_memory = present;
        self
    }

    pub fn with_default_orientation(mut self, orientation: Orientation) -> Self {
        self.profile.default_orientation = orientation;
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        let g = self.profile.geometry;
        if g.width == 0 || g.height == 0 {
            return Err(ConfigError::ZeroGeometry);
        }
        if self.stripe_height == 0 {
            return Err(ConfigError::ZeroStripeHeight);
        }
        if g.height % self.stripe_height != 0 {
            return Err(ConfigError::StripeNotDivisor {
                height: g.height,
                stripe_height: self.stripe_height,
            });
        }
        if self.max_transfer < 2 || self.max_transfer % 2 != 0 {
            return Err(ConfigError::BadMaxTransfer(self.max_transfer));
        }
        if g.x_offset.checked_add(g.width - 1).is_none()
            || g.y_offset.checked_add(g.height - 1).is_none()
        {
            return Err(ConfigError::OffsetOverflow);
        }
        Ok(self)
    }

    #[inline]
    pub fn model(&self) -> PanelModel {
        self.model
    }

    #[inline]
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.profile.geometry
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.profile.geometry.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.profile.geometry.height
    }

    #[inline]
    pub fn stripe_height(&self) -> u16 {
        self.stripe_height
    }

    #[inline]
    pub fn stripe_count(&self) -> u16 {
        self.profile.geometry.height / self.stripe_height
    }

    #[inline]
    pub fn stripe_pixels(&self) -> usize {
        self.width() as usize * self.stripe_height as usize
    }

    #[inline]
    pub fn stripe_bytes(&self) -> usize {
        self.stripe_pixels() * 2
    }

    #[inline]
    pub fn frame_pixels(&self) -> usize {
        self.profile.geometry.frame_pixels()
    }

    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.profile.geometry.frame_bytes()
    }

    #[inline]
    pub fn max_transfer(&self) -> usize {
        self.max_transfer
    }

    #[inline]
    pub fn swap_bytes(&self) -> bool {
        self.swap_bytes
    }

    #[inline]
    pub fn spi_hz(&self) -> u32 {
        self.spi_hz
    }

    #[inline]
    pub fn external_memory(&self) -> bool {
        self.external_memory
    }
}
