//! Recording fakes for whole-frame tests.
//!
//! Every fake shares one [`Log`], so the order of pin edges, delays and bus
//! writes can be checked across devices. [`Log::events`] folds the raw
//! stream into commands with their data phase attached.
#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal::spi::{self, ErrorKind, Operation, SpiDevice};

use st77xx_tft::config::Geometry;
use st77xx_tft::{PanelConfig, PanelModel, St77xx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Raw {
    Dc(bool),
    Rst(bool),
    Write(Vec<u8>),
    DelayMs(u32),
    Duty(u16),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Rst(bool),
    Delay(u32),
    Cmd(u8, Vec<u8>),
    Backlight(u16),
}

#[derive(Clone, Default)]
pub struct Log {
    raw: Rc<RefCell<Vec<Raw>>>,
    fail_writes: Rc<RefCell<bool>>,
}

impl Log {
    pub fn push(&self, r: Raw) {
        self.raw.borrow_mut().push(r);
    }

    pub fn raw(&self) -> Vec<Raw> {
        self.raw.borrow().clone()
    }

    pub fn clear(&self) {
        self.raw.borrow_mut().clear();
    }

    /// Make every following bus write fail.
    pub fn break_bus(&self, broken: bool) {
        *self.fail_writes.borrow_mut() = broken;
    }

    /// Bus writes only, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.raw
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Raw::Write(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        let mut out = Vec::new();
        let mut dc = false;
        for r in self.raw.borrow().iter() {
            match r {
                Raw::Dc(level) => dc = *level,
                Raw::Rst(level) => out.push(Event::Rst(*level)),
                Raw::DelayMs(ms) => out.push(Event::Delay(*ms)),
                Raw::Duty(d) => out.push(Event::Backlight(*d)),
                Raw::Write(bytes) if !dc => {
                    out.extend(bytes.iter().map(|&op| Event::Cmd(op, Vec::new())));
                }
                Raw::Write(bytes) => match out.last_mut() {
                    Some(Event::Cmd(_, data)) => data.extend_from_slice(bytes),
                    _ => panic!("data phase without a command: {:?}", bytes),
                },
            }
        }
        out
    }

    /// Commands only, delays and pin edges dropped.
    pub fn commands(&self) -> Vec<(u8, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Cmd(op, data) => Some((op, data)),
                _ => None,
            })
            .collect()
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.commands().into_iter().map(|(op, _)| op).collect()
    }

    /// Every RAMWR data phase concatenated and read back as big-endian
    /// RGB565 words.
    pub fn wire_pixels(&self) -> Vec<u16> {
        let bytes: Vec<u8> = self
            .commands()
            .into_iter()
            .filter(|(op, _)| *op == 0x2C)
            .flat_map(|(_, data)| data)
            .collect();
        bytes
            .chunks_exact(2)
            .map(|p| u16::from_be_bytes([p[0], p[1]]))
            .collect()
    }
}

pub struct FakeSpi(pub Log);

impl spi::ErrorType for FakeSpi {
    type Error = ErrorKind;
}

impl SpiDevice<u8> for FakeSpi {
    fn transaction(&mut self, ops: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        if *self.0.fail_writes.borrow() {
            return Err(ErrorKind::Other);
        }
        for op in ops {
            if let Operation::Write(buf) = op {
                self.0.push(Raw::Write(buf.to_vec()));
            }
        }
        Ok(())
    }
}

pub struct FakeDc(pub Log);

impl digital::ErrorType for FakeDc {
    type Error = Infallible;
}

impl OutputPin for FakeDc {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.push(Raw::Dc(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.push(Raw::Dc(true));
        Ok(())
    }
}

pub struct FakeRst(pub Log);

impl digital::ErrorType for FakeRst {
    type Error = Infallible;
}

impl OutputPin for FakeRst {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.push(Raw::Rst(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.push(Raw::Rst(true));
        Ok(())
    }
}

pub struct FakeBacklight(pub Log);

impl pwm::ErrorType for FakeBacklight {
    type Error = Infallible;
}

impl SetDutyCycle for FakeBacklight {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.0.push(Raw::Duty(duty));
        Ok(())
    }
}

pub struct FakeDelay(pub Log);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.push(Raw::DelayMs(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.push(Raw::DelayMs(ms));
    }
}

pub type FakeDriver = St77xx<FakeSpi, FakeDc, FakeRst, FakeBacklight>;

pub fn driver(config: PanelConfig) -> (FakeDriver, Log) {
    let log = Log::default();
    let driver = St77xx::new(
        FakeSpi(log.clone()),
        FakeDc(log.clone()),
        Some(FakeRst(log.clone())),
        Some(FakeBacklight(log.clone())),
        config,
    )
    .expect("valid config");
    (driver, log)
}

/// 8x6 panel in three 2-line stripes, no offset.
pub fn tiny_config() -> PanelConfig {
    PanelConfig::new(PanelModel::St7796s)
        .with_geometry(Geometry::new(8, 6, 0, 0))
        .with_stripe_height(2)
}

/// Host-order pixels as they would sit in a raw frame file.
pub fn le_bytes(pixels: &[u16]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

/// `[w][h][zlib(pixels)]` image in the crate's compressed format.
pub fn zlib_image(width: u16, height: u16, pixels: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&miniz_oxide::deflate::compress_to_vec_zlib(&le_bytes(pixels), 6));
    out
}
