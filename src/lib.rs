#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod color;
pub mod config;
pub mod display;
pub mod double_buffer;
pub mod driver;
pub mod frames;
pub mod image;
pub mod interface;
pub mod memory;
pub mod protocol;
pub mod raster;
pub mod shared;
pub mod storage;
pub mod stripe;
pub mod text;
pub mod transfer;

#[cfg(feature = "esp32s3-board")]
pub mod board;

pub use config::{Geometry, PanelConfig, PanelModel};
pub use display::Display;
pub use driver::{DriverInfo, Error, NoPin, St77xx};
pub use protocol::{Orientation, Window};
