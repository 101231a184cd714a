//! Front/back full-frame buffering.
//!
//! Rendering goes into the back buffer; `swap_and_display` exchanges the two
//! boxes (no pixel copy) and streams the new front.

use alloc::boxed::Box;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiDevice;
use log::{debug, error};

use crate::driver::{Error, St77xx};
use crate::memory::PixelAllocator;

#[derive(Default)]
pub struct DoubleBuffer {
    front: Option<Box<[u16]>>,
    back: Option<Box<[u16]>>,
}

impl DoubleBuffer {
    pub const fn new() -> Self {
        Self { front: None, back: None }
    }

    /// Allocate two zeroed frames of `pixels` words. A no-op when already
    /// allocated; on failure nothing is kept.
    pub fn init<A: PixelAllocator>(&mut self, alloc: &mut A, pixels: usize) -> Result<(), Error> {
        if self.is_allocated() {
            return Ok(());
        }
        let pool = alloc.frame_pool();
        let front = alloc.allocate(pool, pixels);
        let back = alloc.allocate(pool, pixels);
        match (front, back) {
            (Some(front), Some(back)) => {
                debug!("double buffer: 2 x {} bytes in {:?}", pixels * 2, pool);
                self.front = Some(front);
                self.back = Some(back);
                Ok(())
            }
            (front, back) => {
                error!("double buffer: could not allocate 2 x {} bytes", pixels * 2);
                front.into_iter().chain(back).for_each(|b| alloc.release(b));
                Err(Error::Alloc { bytes: pixels * 2 })
            }
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    /// The buffer to render into.
    pub fn draw_buffer(&mut self) -> Option<&mut [u16]> {
        self.back.as_deref_mut()
    }

    /// The frame last handed to the panel.
    pub fn front_buffer(&self) -> Option<&[u16]> {
        self.front.as_deref()
    }

    pub fn swap_and_display<SPI, DC, RST, BL>(
        &mut self,
        driver: &mut St77xx<SPI, DC, RST, BL>,
    ) -> Result<(), Error>
    where
        SPI: SpiDevice<u8>,
        DC: OutputPin,
        RST: OutputPin,
        BL: SetDutyCycle,
    {
        if !self.is_allocated() {
            return Err(Error::NotAllocated);
        }
        core::mem::swap(&mut self.front, &mut self.back);
        match self.front.as_deref() {
            Some(front) => driver.flush(front),
            None => Err(Error::NotAllocated),
        }
    }

    /// Return both frames to `alloc`. Safe to repeat.
    pub fn cleanup<A: PixelAllocator>(&mut self, alloc: &mut A) {
        self.front.take().into_iter().chain(self.back.take()).for_each(|b| alloc.release(b));
    }
}
