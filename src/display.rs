//! Top-level engine.
//!
//! `Display` bundles the protocol driver with an allocator and the three
//! buffer owners (double buffer, stripe buffer, preloaded frames). Every
//! buffer is allocated lazily by the matching `init_*` call and released by
//! the matching `cleanup_*` call or by [`Display::cleanup`].

use alloc::boxed::Box;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiDevice;
use log::{info, warn};

use crate::double_buffer::DoubleBuffer;
use crate::driver::{DriverInfo, Error, St77xx};
use crate::frames::PreloadedFrames;
use crate::image::{blit_centered, CoverMap, DecodeScale, DecodedImage, ImageDecoder};
use crate::memory::{try_zeroed, MemoryPool, PixelAllocator};
use crate::raster::Surface;
use crate::storage::{read_full, Storage, StorageFile};
use crate::stripe::StripeBuffer;

pub struct Display<SPI, DC, RST, BL, A> {
    driver: St77xx<SPI, DC, RST, BL>,
    alloc: A,
    double: DoubleBuffer,
    stripe: StripeBuffer,
    frames: PreloadedFrames,
}

impl<SPI, DC, RST, BL, A> Display<SPI, DC, RST, BL, A>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    A: PixelAllocator,
{
    pub fn new(driver: St77xx<SPI, DC, RST, BL>, alloc: A) -> Self {
        let stripe = StripeBuffer::new(driver.config());
        Self {
            driver,
            alloc,
            double: DoubleBuffer::new(),
            stripe,
            frames: PreloadedFrames::new(),
        }
    }

    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.driver.init(delay)
    }

    /// Bring-up followed by double buffer allocation.
    pub fn init_fast(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.init(delay)?;
        self.init_double_buffers()
    }

    pub fn driver(&mut self) -> &mut St77xx<SPI, DC, RST, BL> {
        &mut self.driver
    }

    pub fn allocator(&mut self) -> &mut A {
        &mut self.alloc
    }

    pub fn info(&self) -> DriverInfo {
        self.driver.info()
    }

    pub fn width(&self) -> u16 {
        self.driver.config().width()
    }

    pub fn height(&self) -> u16 {
        self.driver.config().height()
    }

    // ---- double buffering ----

    pub fn init_double_buffers(&mut self) -> Result<(), Error> {
        let pixels = self.driver.config().frame_pixels();
        self.double.init(&mut self.alloc, pixels)
    }

    pub fn draw_buffer(&mut self) -> Option<&mut [u16]> {
        self.double.draw_buffer()
    }

    /// The back buffer as a drawing surface.
    pub fn draw_surface(&mut self) -> Option<Surface<'_>> {
        let (w, h) = (self.width(), self.height());
        self.double.draw_buffer().and_then(|b| Surface::new(b, w, h))
    }

    pub fn front_buffer(&self) -> Option<&[u16]> {
        self.double.front_buffer()
    }

    pub fn swap_and_display(&mut self) -> Result<(), Error> {
        self.double.swap_and_display(&mut self.driver)
    }

    pub fn cleanup_double_buffers(&mut self) {
        self.double.cleanup(&mut self.alloc);
    }

    // ---- stripe mode ----

    pub fn init_stripe_mode(&mut self) -> Result<(), Error> {
        self.stripe.init(&mut self.alloc)
    }

    pub fn stripe(&mut self) -> &mut StripeBuffer {
        &mut self.stripe
    }

    pub fn stripe_flush_next(&mut self) -> Result<Option<u16>, Error> {
        self.stripe.flush_next(&mut self.driver)
    }

    pub fn stripe_draw_image<S: Storage>(&mut self, storage: &mut S, path: &str) -> Result<(), Error> {
        self.stripe.draw_image(&mut self.driver, storage, path)
    }

    pub fn cleanup_stripe_mode(&mut self) {
        self.stripe.cleanup(&mut self.alloc);
    }

    // ---- preloaded animation ----

    pub fn preload_frames<S: Storage>(&mut self, storage: &mut S, dir: &str, max: usize) -> usize {
        let pixels = self.driver.config().frame_pixels();
        self.frames.preload(&mut self.alloc, storage, dir, max, pixels)
    }

    pub fn preloaded(&self) -> &PreloadedFrames {
        &self.frames
    }

    /// Flush preloaded frame `index`. `Ok(false)` if there is no such frame.
    pub fn play_preloaded(&mut self, index: usize) -> Result<bool, Error> {
        match self.frames.get(index) {
            Some(frame) => self.driver.flush(frame).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn free_preloaded_frames(&mut self) {
        self.frames.clear(&mut self.alloc);
    }

    // ---- compressed images ----

    /// Decode an image at a scale picked from `free_bytes` and paint it in
    /// cover mode through the stripe buffer. Stripe mode is set up and torn
    /// down around the call.
    pub fn show_image_striped<S, D>(
        &mut self,
        storage: &mut S,
        decoder: &mut D,
        path: &str,
        free_bytes: usize,
    ) -> Result<(), Error>
    where
        S: Storage,
        D: ImageDecoder,
    {
        let scale = DecodeScale::for_free_memory(free_bytes);
        let input = read_file(storage, path)?;
        let budget = scale.budget_pixels();
        let mut decoded = self
            .alloc
            .allocate(MemoryPool::Internal, budget)
            .ok_or_else(|| Error::Alloc {
                bytes: budget.saturating_mul(2),
            })?;
        let decoded_image = decoder.decode(&input, scale, &mut decoded);
        drop(input);
        let result = match decoded_image {
            Ok(image) => {
                info!("{}: {}x{} at 1/{}", path, image.width, image.height, scale.divisor());
                self.paint_cover(image, &decoded)
            }
            Err(e) => Err(e.into()),
        };
        self.alloc.release(decoded);
        result
    }

    fn paint_cover(&mut self, image: DecodedImage, decoded: &[u16]) -> Result<(), Error> {
        let (w, h) = (self.width(), self.height());
        let Some(map) = CoverMap::new(image, w, h) else {
            return Ok(());
        };

        self.init_stripe_mode()?;
        self.stripe.begin_frame();
        let result = loop {
            let y = self.stripe.current_y();
            if let Some(band) = self.stripe.buffer() {
                map.render_rows(decoded, y, w, band);
            }
            match self.stripe.flush_next(&mut self.driver) {
                Ok(Some(_)) => continue,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stripe.cleanup(&mut self.alloc);
        result
    }

    /// Decode an image at full size and show it centered (cropped or
    /// letterboxed) through a temporary full frame.
    pub fn show_image_buffered<S, D>(&mut self, storage: &mut S, decoder: &mut D, path: &str) -> Result<(), Error>
    where
        S: Storage,
        D: ImageDecoder,
    {
        let input = read_file(storage, path)?;
        let dims = decoder.dimensions(&input, DecodeScale::Full)?;
        let pool = self.alloc.frame_pool();
        let mut decoded = self
            .alloc
            .allocate(pool, dims.pixels())
            .ok_or_else(|| Error::Alloc {
                bytes: dims.pixels().saturating_mul(2),
            })?;
        let decoded_image = decoder.decode(&input, DecodeScale::Full, &mut decoded);
        drop(input);
        let result = match decoded_image {
            Ok(image) => {
                info!("{}: {}x{}", path, image.width, image.height);
                self.paint_centered(image, &decoded)
            }
            Err(e) => Err(e.into()),
        };
        self.alloc.release(decoded);
        result
    }

    fn paint_centered(&mut self, image: DecodedImage, decoded: &[u16]) -> Result<(), Error> {
        let (w, h) = (self.width(), self.height());
        let pool = self.alloc.frame_pool();
        match self.alloc.allocate(pool, self.driver.config().frame_pixels()) {
            Some(mut frame) => {
                blit_centered(&mut frame, w, h, decoded, image);
                let result = self.driver.flush(&frame);
                self.alloc.release(frame);
                result
            }
            None if image.width == w && image.height == h => {
                warn!("no frame buffer, flushing decoded image directly");
                self.driver.flush(decoded)
            }
            None => Err(Error::Alloc {
                bytes: self.driver.config().frame_bytes(),
            }),
        }
    }

    /// Release every buffer and return the driver to its unconfigured state.
    pub fn cleanup(&mut self) {
        self.double.cleanup(&mut self.alloc);
        self.stripe.cleanup(&mut self.alloc);
        self.frames.clear(&mut self.alloc);
        self.driver.release();
        info!("display resources released");
    }

    pub fn free(self) -> (St77xx<SPI, DC, RST, BL>, A) {
        (self.driver, self.alloc)
    }
}

/// Whole file into a fresh buffer.
fn read_file<S: Storage>(storage: &mut S, path: &str) -> Result<Box<[u8]>, Error> {
    let mut file = storage.open(path).map_err(|e| {
        warn!("cannot open {}: {}", path, e);
        Error::Storage(e)
    })?;
    let size = file.size();
    let mut buf = try_zeroed::<u8>(size).ok_or(Error::Alloc { bytes: size })?;
    let read = read_full(&mut file, &mut buf)?;
    if read != size {
        return Err(Error::SizeMismatch {
            expected: size,
            actual: read,
        });
    }
    Ok(buf)
}
