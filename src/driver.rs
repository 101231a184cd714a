//! ST7789 / ST7796S protocol driver.
//!
//! `St77xx` is the session object: it owns the bus, the D/C line, the
//! optional reset line and backlight channel, and tracks which window the
//! controller is currently addressed to. Pixel buffers are only borrowed for
//! the duration of a call.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, Error as _, OutputPin};
use embedded_hal::pwm::{self, Error as _, SetDutyCycle};
use embedded_hal::spi::{self, SpiDevice};
use log::{debug, error, info, warn};

use crate::config::{ConfigError, PanelConfig};
use crate::image::DecodeError;
use crate::interface::SpiInterface;
use crate::protocol::{cmd, Orientation, Window, COLMOD_RGB565};
use crate::storage::StorageError;
use crate::transfer::TransferEngine;

const RESET_LOW_MS: u32 = 10;
const SETTLE_MS: u32 = 120;

/// Everything that can go wrong in the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Spi(spi::ErrorKind),
    Pin(digital::ErrorKind),
    Backlight(pwm::ErrorKind),
    Config(ConfigError),
    /// A buffer of `bytes` could not be allocated.
    Alloc { bytes: usize },
    Storage(StorageError),
    SizeMismatch { expected: usize, actual: usize },
    /// The buffer mode in use was never initialized.
    NotAllocated,
    Decode(DecodeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(kind) => write!(f, "spi: {}", kind),
            Error::Pin(kind) => write!(f, "gpio: {}", kind),
            Error::Backlight(kind) => write!(f, "backlight: {}", kind),
            Error::Config(e) => write!(f, "config: {}", e),
            Error::Alloc { bytes } => write!(f, "could not allocate {} bytes", bytes),
            Error::Storage(e) => write!(f, "storage: {}", e),
            Error::SizeMismatch { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            Error::NotAllocated => f.write_str("buffers not allocated"),
            Error::Decode(e) => write!(f, "decode: {}", e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

/// Placeholder for an unwired reset line or backlight channel.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPin;

impl digital::ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl pwm::ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl SetDutyCycle for NoPin {
    fn max_duty_cycle(&self) -> u16 {
        u16::from(u8::MAX)
    }

    fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Snapshot returned by [`St77xx::info`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DriverInfo {
    pub controller: &'static str,
    pub width: u16,
    pub height: u16,
    pub spi_hz: u32,
    pub external_memory: bool,
    pub initialized: bool,
}

pub struct St77xx<SPI, DC, RST, BL> {
    iface: SpiInterface<SPI, DC>,
    rst: Option<RST>,
    backlight: Option<BL>,
    config: PanelConfig,
    orientation: Orientation,
    addressed: Option<Window>,
    initialized: bool,
}

impl<SPI, DC, RST, BL> St77xx<SPI, DC, RST, BL>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
{
    /// Build a session. Nothing is sent until [`St77xx::init`].
    ///
    /// * `rst` - optional hardware reset line (active low)
    /// * `backlight` - optional PWM channel driving the backlight
    pub fn new(
        spi: SPI,
        dc: DC,
        rst: Option<RST>,
        backlight: Option<BL>,
        config: PanelConfig,
    ) -> Result<Self, Error> {
        let config = config.validate()?;
        let engine = TransferEngine::new(config.max_transfer(), config.swap_bytes()).ok_or(
            Error::Alloc {
                bytes: config.max_transfer(),
            },
        )?;
        Ok(Self {
            iface: SpiInterface::new(spi, dc, engine),
            rst,
            backlight,
            orientation: config.profile().default_orientation,
            config,
            addressed: None,
            initialized: false,
        })
    }

    /// Hardware reset and register bring-up. A second call only warns.
    ///
    /// On a bus failure the error is logged and returned and the session
    /// stays uninitialized.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        if self.initialized {
            warn!("{} already initialized", self.config.profile().name);
            return Ok(());
        }
        match self.bring_up(delay) {
            Ok(()) => {
                self.initialized = true;
                let p = self.config.profile();
                info!(
                    "{} ready: {}x{} @ {} Hz",
                    p.name,
                    p.geometry.width,
                    p.geometry.height,
                    self.config.spi_hz()
                );
                Ok(())
            }
            Err(e) => {
                error!("{} bring-up failed: {}", self.config.profile().name, e);
                Err(e)
            }
        }
    }

    fn bring_up(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        if let Some(r) = self.rst.as_mut() {
            r.set_low().map_err(|e| Error::Pin(e.kind()))?;
            delay.delay_ms(RESET_LOW_MS);
            r.set_high().map_err(|e| Error::Pin(e.kind()))?;
            delay.delay_ms(SETTLE_MS);
        }

        self.iface.command(cmd::SWRESET)?;
        delay.delay_ms(SETTLE_MS);
        self.iface.command(cmd::SLPOUT)?;
        delay.delay_ms(SETTLE_MS);

        let profile = *self.config.profile();
        self.iface.command_with_data(cmd::COLMOD, &[COLMOD_RGB565])?;
        self.set_orientation(profile.default_orientation)?;
        self.iface.command_with_data(cmd::PORCTRL, &profile.porch)?;
        self.iface.command_with_data(cmd::GCTRL, &[profile.gate])?;
        self.iface.command_with_data(cmd::VCOMS, &[profile.vcoms])?;
        self.iface.command(if profile.invert_colors {
            cmd::INVON
        } else {
            cmd::INVOFF
        })?;
        self.iface.command(cmd::NORON)?;
        self.iface.command(cmd::DISPON)?;
        delay.delay_ms(SETTLE_MS);

        self.set_backlight(u8::MAX)
    }

    /// Program MADCTL for `orientation`. The addressed window is forgotten.
    pub fn set_orientation(&mut self, orientation: Orientation) -> Result<(), Error> {
        let madctl = orientation.madctl(&self.config.profile().madctl);
        self.addressed = None;
        self.iface.command_with_data(cmd::MADCTL, &[madctl])?;
        self.orientation = orientation;
        debug!("orientation {:?} (MADCTL {:#04x})", orientation, madctl);
        Ok(())
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Address a window and prime the controller for a memory write.
    /// Reversed or out-of-range corners are normalized, never rejected.
    pub fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Error> {
        let window = Window::new(x0, y0, x1, y1, &self.config.geometry());
        self.address(window)
    }

    pub(crate) fn address(&mut self, window: Window) -> Result<(), Error> {
        let g = self.config.geometry();
        self.addressed = None;
        self.iface.command_with_data(cmd::CASET, &window.caset(&g))?;
        self.iface.command_with_data(cmd::RASET, &window.raset(&g))?;
        self.iface.command(cmd::RAMWR)?;
        self.addressed = Some(window);
        Ok(())
    }

    /// Window the controller is currently addressed to, if known.
    pub fn addressed_window(&self) -> Option<Window> {
        self.addressed
    }

    /// Stream a full frame. The full-panel window is addressed first unless
    /// it is already the active one, in which case RAMWR alone restarts the
    /// write pointer.
    pub fn flush(&mut self, frame: &[u16]) -> Result<(), Error> {
        let Some(frame) = self.frame_slice(frame) else {
            return Ok(());
        };
        let full = Window::full(&self.config.geometry());
        if self.addressed == Some(full) {
            self.iface.command(cmd::RAMWR)?;
        } else {
            self.address(full)?;
        }
        self.iface.write_pixels(frame)
    }

    /// RAMWR and stream without looking at the addressed window.
    pub fn flush_immediate(&mut self, frame: &[u16]) -> Result<(), Error> {
        let Some(frame) = self.frame_slice(frame) else {
            return Ok(());
        };
        self.iface.command(cmd::RAMWR)?;
        self.iface.write_pixels(frame)
    }

    fn frame_slice<'a>(&self, frame: &'a [u16]) -> Option<&'a [u16]> {
        let n = self.config.frame_pixels();
        if frame.len() < n {
            debug!("flush ignored: {} of {} pixels", frame.len(), n);
            return None;
        }
        Some(&frame[..n])
    }

    /// Data phase only, continuing the current memory write.
    pub fn stream_pixels(&mut self, pixels: &[u16]) -> Result<(), Error> {
        self.iface.write_pixels(pixels)
    }

    /// Backlight duty, 0 (off) to 255 (full). No-op without a channel.
    pub fn set_backlight(&mut self, duty: u8) -> Result<(), Error> {
        match self.backlight.as_mut() {
            Some(bl) => bl
                .set_duty_cycle_fraction(u16::from(duty), u16::from(u8::MAX))
                .map_err(|e| Error::Backlight(e.kind())),
            None => Ok(()),
        }
    }

    pub fn info(&self) -> DriverInfo {
        let p = self.config.profile();
        DriverInfo {
            controller: p.name,
            width: p.geometry.width,
            height: p.geometry.height,
            spi_hz: self.config.spi_hz(),
            external_memory: self.config.external_memory(),
            initialized: self.initialized,
        }
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Back to the just-constructed state: uninitialized, no window.
    pub fn release(&mut self) {
        self.addressed = None;
        self.initialized = false;
    }

    /// Hand the peripherals back.
    pub fn free(self) -> (SPI, DC, Option<RST>, Option<BL>) {
        let (spi, dc) = self.iface.release();
        (spi, dc, self.rst, self.backlight)
    }
}
