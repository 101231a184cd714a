//! ST77xx demo
//! ========================================
//! Build for the board with
//!   cargo run --release --features esp32s3-board
//! (add `panel-st7789` for the 135x240 module)
//! ========================================
//!
//! Brings the panel up, shows a compressed test image (full frame when PSRAM
//! is present, stripe by stripe otherwise), paints a banded frame through
//! stripe mode and then loops a double-buffered animation.

//% CHIPS: esp32s3
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Application descriptor checked by the ESP-IDF bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

use esp_backtrace as _;

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyle};
use embedded_graphics::text::Text;

use embedded_hal::delay::DelayNs;
use esp_hal::{delay::Delay, main, psram, Config};
use log::{error, info, warn};

use st77xx_tft::board::{setup_display, BoardAllocator, DisplayPins};
use st77xx_tft::color::{rgb888_to_rgb565, BLACK, WHITE};
use st77xx_tft::image::ZlibRgb565Decoder;
use st77xx_tft::memory::PixelAllocator;
use st77xx_tft::storage::MemStorage;
use st77xx_tft::text::{draw_text, FontLayout, GlyphTable};
use st77xx_tft::{Display, PanelConfig, PanelModel};

extern crate alloc;
use alloc::vec::Vec;

cfg_if::cfg_if! {
    if #[cfg(feature = "panel-st7789")] {
        const MODEL: PanelModel = PanelModel::St7789;
    } else {
        const MODEL: PanelModel = PanelModel::St7796s;
    }
}

const IMAGE_PATH: &str = "/spiffs/test.img";
const FONT_PATH: &str = "/spiffs/font.bin";

// Internal RAM on top of whatever PSRAM the allocator finds.
const INTERNAL_HEAP: usize = 96 * 1024;

/// A 240x160 diagonal gradient in the crate's compressed image format.
fn test_image() -> Vec<u8> {
    const W: u16 = 240;
    const H: u16 = 160;
    let mut raw = Vec::with_capacity(W as usize * H as usize * 2);
    for y in 0..H {
        for x in 0..W {
            let c = rgb888_to_rgb565((x * 255 / W) as u8, (y * 255 / H) as u8, 128);
            raw.extend_from_slice(&c.to_le_bytes());
        }
    }
    let mut out = Vec::new();
    out.extend_from_slice(&W.to_le_bytes());
    out.extend_from_slice(&H.to_le_bytes());
    out.extend_from_slice(&miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6));
    out
}

#[main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(Config::default());

    esp_alloc::heap_allocator!(size: INTERNAL_HEAP);
    esp_alloc::psram_allocator!(&peripherals.PSRAM, psram);

    let has_psram = esp_alloc::HEAP.free() > 2 * INTERNAL_HEAP;
    info!("heap free: {} bytes, psram: {}", esp_alloc::HEAP.free(), has_psram);

    let pins = DisplayPins {
        spi2: peripherals.SPI2,
        sck: peripherals.GPIO10,
        mosi: peripherals.GPIO11,
        cs: peripherals.GPIO9,
        dc: peripherals.GPIO8,
        rst: peripherals.GPIO14,
        bl: peripherals.GPIO2,
    };

    let config = match PanelConfig::new(MODEL).with_external_memory(has_psram).validate() {
        Ok(c) => c,
        Err(e) => halt(format_args!("bad panel config: {}", e)),
    };
    let driver = match setup_display(pins, config) {
        Ok(d) => d,
        Err(e) => halt(format_args!("display setup failed: {}", e)),
    };

    let mut delay = Delay::new();
    let mut display = Display::new(driver, BoardAllocator::new(has_psram));
    if let Err(e) = display.init(&mut delay) {
        error!("panel bring-up failed: {}", e);
    }
    if let Err(e) = display.driver().set_backlight(77) {
        warn!("backlight: {}", e);
    }

    let info = display.info();
    info!(
        "display: {} {}x{} @ {} MHz, psram: {}",
        info.controller,
        info.width,
        info.height,
        info.spi_hz / 1_000_000,
        info.external_memory
    );

    // ---- compressed image ----
    let mut storage = MemStorage::new();
    storage.insert(IMAGE_PATH, test_image());
    let mut decoder = ZlibRgb565Decoder;
    let shown = if has_psram {
        display.show_image_buffered(&mut storage, &mut decoder, IMAGE_PATH)
    } else {
        let free = display.allocator().free_bytes().unwrap_or(0);
        display.show_image_striped(&mut storage, &mut decoder, IMAGE_PATH, free)
    };
    match shown {
        Ok(()) => info!("image shown"),
        Err(e) => error!("image failed: {}", e),
    }
    storage.remove(IMAGE_PATH);
    delay.delay_ms(2000);

    // ---- stripe mode: one colored band per stripe ----
    let font = GlyphTable::load(&mut storage, FONT_PATH, FontLayout::DEFAULT);
    if display.init_stripe_mode().is_ok() {
        display.stripe().begin_frame();
        let count = display.stripe().stripe_count();
        loop {
            let band = display.stripe().cursor();
            let shade = (band as u32 * 255 / count.max(1) as u32) as u8;
            let stripe = display.stripe();
            stripe.fill(rgb888_to_rgb565(shade, 64, 255 - shade));
            stripe.fill_rect(4, 2, 12, 6, WHITE);
            match display.stripe_flush_next() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    error!("stripe flush: {}", e);
                    break;
                }
            }
        }
        display.cleanup_stripe_mode();
    }
    delay.delay_ms(2000);

    // ---- double buffering ----
    if let Err(e) = display.init_double_buffers() {
        halt(format_args!("double buffers: {}", e));
    }

    let (w, h) = (display.width() as i32, display.height() as i32);
    let style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
    let mut frame: u32 = 0;
    loop {
        if let Some(mut s) = display.draw_surface() {
            s.fill_screen(BLACK);
            let x = (frame as i32 * 3) % (w - 40).max(1);
            let y = (frame as i32 * 2) % (h - 40).max(1);
            s.fill_rect(x, y, 40, 40, rgb888_to_rgb565(255, 120, 0));
            let _ = Circle::new(Point::new(w - x - 30, h - y - 30), 30)
                .into_styled(PrimitiveStyle::with_fill(Rgb565::CYAN))
                .draw(&mut s);
            let _ = Text::new("st77xx", Point::new(8, h - 8), style).draw(&mut s);
            draw_text(&mut s, &font, "¡Hola!\n你", 8, 8, WHITE, 2);
        }
        if let Err(e) = display.swap_and_display() {
            error!("flush: {}", e);
        }
        frame = frame.wrapping_add(1);
        delay.delay_ms(16);
    }
}

fn halt(msg: core::fmt::Arguments<'_>) -> ! {
    error!("{}", msg);
    loop {
        core::hint::spin_loop();
    }
}
