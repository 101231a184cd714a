//! 4-wire serial framing: one SPI device plus a data/command select line.
//!
//! D/C low marks a command byte, D/C high marks parameter or pixel bytes.
//! Parameters are small and go out unstaged; pixel payloads go through the
//! [`TransferEngine`] so they can be chunked and byte-swapped.

use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::spi::{Error as _, SpiDevice};

use crate::driver::Error;
use crate::transfer::{write_chunked, TransferEngine};

pub struct SpiInterface<SPI, DC> {
    spi: SPI,
    dc: DC,
    engine: TransferEngine,
}

impl<SPI, DC> SpiInterface<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, engine: TransferEngine) -> Self {
        Self { spi, dc, engine }
    }

    /// Single opcode, no parameters.
    pub fn command(&mut self, op: u8) -> Result<(), Error> {
        self.dc.set_low().map_err(|e| Error::Pin(e.kind()))?;
        self.spi.write(&[op]).map_err(|e| Error::Spi(e.kind()))
    }

    /// Opcode followed by its parameter bytes, sent as written.
    pub fn command_with_data(&mut self, op: u8, data: &[u8]) -> Result<(), Error> {
        self.command(op)?;
        if data.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(|e| Error::Pin(e.kind()))?;
        let max = self.engine.max_transfer();
        write_chunked(&mut self.spi, data, max).map_err(|e| Error::Spi(e.kind()))
    }

    /// Pixel data phase. Empty input touches neither line.
    pub fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Error> {
        if pixels.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(|e| Error::Pin(e.kind()))?;
        self.engine
            .stream_pixels(&mut self.spi, pixels)
            .map_err(|e| Error::Spi(e.kind()))
    }

    pub fn release(self) -> (SPI, DC) {
        (self.spi, self.dc)
    }
}
