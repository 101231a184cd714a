//! Chunked payload streaming through a bounce buffer.
//!
//! The SPI peripheral moves at most `max_transfer` bytes per transaction, and
//! the wire wants big-endian RGB565 words while frame buffers hold host-order
//! `u16`. Every chunk is staged into an internal buffer (optionally swapping
//! each byte pair on the way) and written as one blocking transaction.

use alloc::boxed::Box;

use embedded_hal::spi::SpiDevice;

use crate::memory::try_zeroed;

pub struct TransferEngine {
    swap_bytes: bool,
    stage: Box<[u8]>,
}

impl TransferEngine {
    /// `None` when the staging buffer cannot be allocated. `max_transfer`
    /// must be even (checked by `PanelConfig::validate`).
    pub fn new(max_transfer: usize, swap_bytes: bool) -> Option<Self> {
        let stage = try_zeroed::<u8>(max_transfer.max(2))?;
        Some(Self { swap_bytes, stage })
    }

    #[inline]
    pub fn max_transfer(&self) -> usize {
        self.stage.len()
    }

    #[inline]
    pub fn swap_bytes(&self) -> bool {
        self.swap_bytes
    }

    /// Stream `payload` as consecutive transactions of at most
    /// `max_transfer` bytes. An empty payload sends nothing.
    pub fn stream<SPI: SpiDevice<u8>>(
        &mut self,
        spi: &mut SPI,
        payload: &[u8],
    ) -> Result<(), SPI::Error> {
        let cap = self.stage.len();
        for chunk in payload.chunks(cap) {
            let staged = &mut self.stage[..chunk.len()];
            if self.swap_bytes {
                swap_pairs_into(staged, chunk);
            } else {
                staged.copy_from_slice(chunk);
            }
            spi.write(staged)?;
        }
        Ok(())
    }

    /// Stream host-order RGB565 pixels.
    #[inline]
    pub fn stream_pixels<SPI: SpiDevice<u8>>(
        &mut self,
        spi: &mut SPI,
        pixels: &[u16],
    ) -> Result<(), SPI::Error> {
        self.stream(spi, bytemuck::cast_slice(pixels))
    }
}

/// Copy `src` into `dst` exchanging bytes `i` and `i+1`; a trailing odd byte
/// is copied as is.
pub fn swap_pairs_into(dst: &mut [u8], src: &[u8]) {
    let mut d = dst.chunks_exact_mut(2);
    let mut s = src.chunks_exact(2);
    for (o, i) in (&mut d).zip(&mut s) {
        o[0] = i[1];
        o[1] = i[0];
    }
    if let (Some(o), Some(&i)) = (d.into_remainder().first_mut(), s.remainder().first()) {
        *o = i;
    }
}

/// Write `data` unstaged in transactions of at most `max` bytes.
pub fn write_chunked<SPI: SpiDevice<u8>>(
    spi: &mut SPI,
    data: &[u8],
    max: usize,
) -> Result<(), SPI::Error> {
    for chunk in data.chunks(max.max(1)) {
        spi.write(chunk)?;
    }
    Ok(())
}
