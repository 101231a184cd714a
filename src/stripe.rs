//! Bounded-memory rendering, one horizontal band at a time.
//!
//! A single `width x stripe_height` buffer is rendered and flushed
//! `stripe_count` times per frame. Two flush protocols exist and they are not
//! interchangeable:
//!
//! * [`StripeBuffer::flush_next`] addresses each band's own window, so the
//!   caller may render bands in any way between flushes.
//! * [`StripeBuffer::draw_image`] addresses the full panel once and streams
//!   every band back to back, relying on the controller's auto-increment.

use alloc::boxed::Box;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiDevice;
use log::{debug, error, warn};

use crate::config::PanelConfig;
use crate::driver::{Error, St77xx};
use crate::memory::{MemoryPool, PixelAllocator};
use crate::protocol::Window;
use crate::raster::{fill_words, Surface};
use crate::storage::{read_full, Storage};

pub struct StripeBuffer {
    buf: Option<Box<[u16]>>,
    width: u16,
    stripe_height: u16,
    stripe_count: u16,
    cursor: u16,
}

impl StripeBuffer {
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            buf: None,
            width: config.width(),
            stripe_height: config.stripe_height(),
            stripe_count: config.stripe_count(),
            cursor: 0,
        }
    }

    fn pixels(&self) -> usize {
        self.width as usize * self.stripe_height as usize
    }

    /// Allocate the band buffer from the DMA pool. A no-op when already
    /// allocated.
    pub fn init<A: PixelAllocator>(&mut self, alloc: &mut A) -> Result<(), Error> {
        if self.buf.is_some() {
            return Ok(());
        }
        let pixels = self.pixels();
        match alloc.allocate(MemoryPool::Dma, pixels) {
            Some(buf) => {
                debug!(
                    "stripe mode: {} x {} bytes",
                    self.stripe_count,
                    pixels * 2
                );
                self.buf = Some(buf);
                self.cursor = 0;
                Ok(())
            }
            None => {
                error!("stripe mode: could not allocate {} bytes", pixels * 2);
                Err(Error::Alloc { bytes: pixels * 2 })
            }
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.buf.is_some()
    }

    pub fn buffer(&mut self) -> Option<&mut [u16]> {
        self.buf.as_deref_mut()
    }

    /// The band as a drawing surface with band-local coordinates.
    pub fn surface(&mut self) -> Option<Surface<'_>> {
        let (w, h) = (self.width, self.stripe_height);
        self.buf.as_deref_mut().and_then(|b| Surface::new(b, w, h))
    }

    #[inline]
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    #[inline]
    pub fn stripe_count(&self) -> u16 {
        self.stripe_count
    }

    #[inline]
    pub fn stripe_height(&self) -> u16 {
        self.stripe_height
    }

    /// First panel row of the band under the cursor.
    #[inline]
    pub fn current_y(&self) -> u16 {
        self.cursor * self.stripe_height
    }

    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    pub fn fill(&mut self, color: u16) {
        if let Some(buf) = self.buf.as_deref_mut() {
            fill_words(buf, color);
        }
    }

    /// Band-local rectangle fill, clipped to the band.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u16) {
        if let Some(mut s) = self.surface() {
            s.fill_rect(x, y, w, h, color);
        }
    }

    /// Send the band under the cursor to its own window and advance.
    ///
    /// Returns the index of the next band, or `None` once the frame is
    /// complete. Calls after completion send nothing and keep returning
    /// `None` until [`StripeBuffer::begin_frame`].
    pub fn flush_next<SPI, DC, RST, BL>(
        &mut self,
        driver: &mut St77xx<SPI, DC, RST, BL>,
    ) -> Result<Option<u16>, Error>
    where
        SPI: SpiDevice<u8>,
        DC: OutputPin,
        RST: OutputPin,
        BL: SetDutyCycle,
    {
        let Some(buf) = self.buf.as_deref() else {
            return Err(Error::NotAllocated);
        };
        if self.cursor >= self.stripe_count {
            return Ok(None);
        }
        let g = driver.config().geometry();
        let window = Window::rows(self.cursor * self.stripe_height, self.stripe_height, &g);
        driver.address(window)?;
        driver.stream_pixels(buf)?;
        self.cursor += 1;
        Ok((self.cursor < self.stripe_count).then_some(self.cursor))
    }

    /// Stream a full-panel raw file through the band buffer.
    ///
    /// The full window is addressed once; each band is read in turn and a
    /// short read is padded with black.
    pub fn draw_image<SPI, DC, RST, BL, S>(
        &mut self,
        driver: &mut St77xx<SPI, DC, RST, BL>,
        storage: &mut S,
        path: &str,
    ) -> Result<(), Error>
    where
        SPI: SpiDevice<u8>,
        DC: OutputPin,
        RST: OutputPin,
        BL: SetDutyCycle,
        S: Storage,
    {
        let count = self.stripe_count;
        let Some(buf) = self.buf.as_deref_mut() else {
            return Err(Error::NotAllocated);
        };
        let mut file = storage.open(path).map_err(|e| {
            warn!("cannot open {}: {}", path, e);
            Error::Storage(e)
        })?;

        let full = Window::full(&driver.config().geometry());
        driver.address(full)?;
        for _ in 0..count {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut *buf);
            let read = read_full(&mut file, bytes)?;
            bytes[read..].fill(0);
            driver.stream_pixels(buf)?;
        }
        Ok(())
    }

    /// Return the band buffer to `alloc` and rewind. Safe to repeat.
    pub fn cleanup<A: PixelAllocator>(&mut self, alloc: &mut A) {
        if let Some(buf) = self.buf.take() {
            alloc.release(buf);
        }
        self.cursor = 0;
    }
}
