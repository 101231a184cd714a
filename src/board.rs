//! ESP32-S3 wiring and bus setup for an SPI TFT.
//!
//! The following wiring is assumed:
//! - CS   => GPIO9
//! - D/C  => GPIO8
//! - RST  => GPIO14
//! - BL   => GPIO2 (on/off)
//! - SCK  => GPIO10
//! - MOSI => GPIO11

use alloc::boxed::Box;
use core::alloc::Layout;
use core::convert::Infallible;
use core::ptr;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_alloc::MemoryCapability;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{GPIO10, GPIO11, GPIO14, GPIO2, GPIO8, GPIO9, SPI2};
use esp_hal::spi::master::{Config, Spi};
use esp_hal::spi::Mode;
use esp_hal::time::Rate;
use esp_hal::Blocking;
use log::warn;

use crate::config::PanelConfig;
use crate::driver::{Error, St77xx};
use crate::memory::{try_zeroed, MemoryPool, PixelAllocator};

pub struct DisplayPins<'a> {
    pub spi2: SPI2<'a>,
    pub sck: GPIO10<'a>,
    pub mosi: GPIO11<'a>,
    pub cs: GPIO9<'a>,
    pub dc: GPIO8<'a>,
    pub rst: GPIO14<'a>,
    pub bl: GPIO2<'a>,
}

/// Backlight on a plain GPIO: any non-zero duty switches it on.
pub struct GpioBacklight<'a> {
    pin: Output<'a>,
}

impl<'a> GpioBacklight<'a> {
    pub fn new(pin: Output<'a>) -> Self {
        Self { pin }
    }
}

impl ErrorType for GpioBacklight<'_> {
    type Error = Infallible;
}

impl SetDutyCycle for GpioBacklight<'_> {
    fn max_duty_cycle(&self) -> u16 {
        u16::from(u8::MAX)
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if duty == 0 {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
        Ok(())
    }
}

/// Capability-aware allocation from the esp-alloc heap regions.
///
/// Full frames go to PSRAM when it was registered and fall back to internal
/// RAM when PSRAM is exhausted. Stripe and scratch buffers always come from
/// internal RAM, which is DMA-capable on the S3.
#[derive(Copy, Clone, Debug)]
pub struct BoardAllocator {
    psram: bool,
}

impl BoardAllocator {
    pub const fn new(psram: bool) -> Self {
        Self { psram }
    }

    fn alloc_in(&self, caps: MemoryCapability, pixels: usize) -> Option<Box<[u16]>> {
        let layout = Layout::array::<u16>(pixels).ok()?;
        if layout.size() == 0 {
            return try_zeroed(0);
        }
        // SAFETY: non-zero layout; the region belongs to the global heap, so
        // the box is freed through the same allocator.
        unsafe {
            let raw = esp_alloc::HEAP.alloc_caps(caps.into(), layout);
            if raw.is_null() {
                return None;
            }
            ptr::write_bytes(raw, 0, layout.size());
            Some(Box::from_raw(ptr::slice_from_raw_parts_mut(raw.cast::<u16>(), pixels)))
        }
    }
}

impl PixelAllocator for BoardAllocator {
    fn has_external(&self) -> bool {
        self.psram
    }

    fn allocate(&mut self, pool: MemoryPool, pixels: usize) -> Option<Box<[u16]>> {
        match pool {
            MemoryPool::External if self.psram => self
                .alloc_in(MemoryCapability::External, pixels)
                .or_else(|| {
                    warn!("psram exhausted, {} bytes from internal ram", pixels * 2);
                    self.alloc_in(MemoryCapability::Internal, pixels)
                }),
            _ => self.alloc_in(MemoryCapability::Internal, pixels),
        }
    }

    fn free_bytes(&self) -> Option<usize> {
        Some(esp_alloc::HEAP.free())
    }
}

pub type SpiDev<'a> = ExclusiveDevice<Spi<'a, Blocking>, Output<'a>, NoDelay>;
pub type BoardDriver<'a> = St77xx<SpiDev<'a>, Output<'a>, Output<'a>, GpioBacklight<'a>>;

/// Build the SPI device and driver session. Bring-up is left to the caller.
pub fn setup_display<'a>(pins: DisplayPins<'a>, config: PanelConfig) -> Result<BoardDriver<'a>, Error> {
    let DisplayPins {
        spi2,
        sck,
        mosi,
        cs,
        dc,
        rst,
        bl,
    } = pins;

    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let dc = Output::new(dc, Level::Low, OutputConfig::default());
    let rst = Output::new(rst, Level::High, OutputConfig::default());
    let bl = GpioBacklight::new(Output::new(bl, Level::Low, OutputConfig::default()));

    // SPI mode 0 at the configured clock
    let spi = Spi::new(
        spi2,
        Config::default()
            .with_frequency(Rate::from_hz(config.spi_hz()))
            .with_mode(Mode::_0),
    )
    .map_err(|_| Error::Spi(embedded_hal::spi::ErrorKind::Other))?
    .with_sck(sck)
    .with_mosi(mosi);

    let spi_dev = ExclusiveDevice::new(spi, cs, NoDelay)
        .map_err(|_| Error::Pin(embedded_hal::digital::ErrorKind::Other))?;

    St77xx::new(spi_dev, dc, Some(rst), Some(bl), config)
}
