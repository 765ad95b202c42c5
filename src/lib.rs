//! Double-buffered framebuffer and bit-banged refresh engine for chained
//! 1/4-scan HUB75 LED matrix panels.
//!
//! ## How 1/4-scan HUB75 panels work
//!
//! HUB75 RGB LED matrix panels are scanned, time-multiplexed displays that behave like a long
//! daisy-chained shift register rather than a random-access framebuffer.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** – Serial colour data for the two data lanes of the active scan row
//! - **CLK** – Shift-register clock; every rising edge pushes the six colour bits one stage along the chain
//! - **LAT / STB** – Latch; copies the shift-register contents to the LED drivers of the selected row group
//! - **OE** – Output-Enable (active LOW): LEDs are lit while OE is LOW and blanked when it is HIGH
//! - **A B C** – Row-address select lines (choose which row group is lit)
//!
//! ### Quarter scan
//! A 1/4-scan panel with `ROWS` rows only has `ROWS / 4` row-select codes. Each code lights four
//! physical rows at once, fed by two interleaved data lanes, so the shift chain of every panel is
//! twice as long as the panel is wide. For a scan row `r` the controller shifts, per panel, one
//! panel width of pixels from rows `r + ROWS/4` and `r + 3*ROWS/4` followed by one panel width from
//! rows `r` and `r + ROWS/2`.
//!
//! ### Row workflow
//! 1. Blank the panel (OE off) so nothing changes visibly while lines move.
//! 2. Drive the row address for scan row N.
//! 3. Shift the colour data for scan row N through the whole chain.
//! 4. Pulse LAT to move the shifted data to the output drivers.
//! 5. Re-enable OE at the configured brightness and hold for the row-visible time.
//!
//! Brightness is the OE duty cycle; colour depth is one bit per channel (8 colours).
//!
//! ## Crate layout
//!
//! - [`framebuffer::FrameBuffer`] – one physical-layout pixel buffer, as wired in the chain.
//! - [`tiling`] – maps a logical grid of panels onto the single physical chain.
//! - [`double_buffer::DoubleBuffer`] – front/back buffer pair, split into a producer
//!   [`double_buffer::Canvas`] and an engine-side [`double_buffer::Scanout`].
//! - [`refresh::Hub75`] – the row-scanning refresh engine.
//! - [`brightness::Brightness`] – shared brightness level applied through the OE duty cycle.
//! - [`bus`] – output line abstraction: batched set/clear masks over a GPIO port or individual pins.
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and emits lifecycle messages through
//! `defmt`.
//!
//! ### `log` Feature
//! Emits the same lifecycle messages through the `log` facade.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use bitfield::bitfield;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::pixelcolor::RgbColor;

pub mod brightness;
pub mod bus;
pub mod config;
pub mod double_buffer;
pub mod framebuffer;
pub mod refresh;
pub mod tiling;

#[cfg(test)]
mod mock;

pub use brightness::Brightness;
pub use config::{Config, ConfigError, EnablePolarity, Timing};
pub use double_buffer::{BufferBusy, Canvas, DoubleBuffer, Scanout};
pub use framebuffer::FrameBuffer;
pub use refresh::Hub75;

/// Color type accepted by the `embedded-graphics` integration
pub type Color = Rgb888;

bitfield! {
    /// A pixel with one bit per colour channel.
    ///
    /// The bit layout is as follows:
    /// - Bit 2: Blue
    /// - Bit 1: Green
    /// - Bit 0: Red
    #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct Rgb3(u8);
    impl Debug;
    /// Red channel
    pub red, set_red: 0;
    /// Green channel
    pub green, set_green: 1;
    /// Blue channel
    pub blue, set_blue: 2;
}

impl Rgb3 {
    /// All channels off
    pub const BLACK: Self = Self(0);
    /// Red only
    pub const RED: Self = Self(0b001);
    /// Green only
    pub const GREEN: Self = Self(0b010);
    /// Red and green
    pub const YELLOW: Self = Self(0b011);
    /// Blue only
    pub const BLUE: Self = Self(0b100);
    /// Red and blue
    pub const MAGENTA: Self = Self(0b101);
    /// Green and blue
    pub const CYAN: Self = Self(0b110);
    /// All channels on
    pub const WHITE: Self = Self(0b111);

    /// Build a pixel from its three channels.
    #[must_use]
    pub const fn new(red: bool, green: bool, blue: bool) -> Self {
        Self((red as u8) | (green as u8) << 1 | (blue as u8) << 2)
    }

    /// Build a pixel from a packed value; bits above bit 2 are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// The packed 3-bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when no channel is lit.
    #[must_use]
    pub const fn is_black(self) -> bool {
        self.0 == 0
    }
}

/// A channel is lit when its 8-bit value is at least half scale.
impl From<Rgb888> for Rgb3 {
    fn from(color: Rgb888) -> Self {
        Self::new(color.r() >= 0x80, color.g() >= 0x80, color.b() >= 0x80)
    }
}

impl From<Rgb3> for Rgb888 {
    fn from(pixel: Rgb3) -> Self {
        let channel = |lit: bool| if lit { u8::MAX } else { 0 };
        Rgb888::new(
            channel(pixel.red()),
            channel(pixel.green()),
            channel(pixel.blue()),
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Rgb3 {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Rgb3({=u8:#x})", self.0)
    }
}

/// Computes the number of row-select codes for a 1/4-scan panel
///
/// # Arguments
///
/// * `rows` - Number of rows in a single panel
///
/// # Returns
///
/// Number of scan rows driven through the address lines
#[must_use]
pub const fn compute_scan_rows(rows: usize) -> usize {
    rows / 4
}

/// Computes the number of clock pulses needed to fill the whole chain for one scan row
///
/// Every physical panel takes two panel widths of data per scan row, one for each
/// interleaved half.
///
/// # Arguments
///
/// * `fb_cols` - Number of columns in the physical framebuffer (all panels of the chain)
#[must_use]
pub const fn compute_shift_cols(fb_cols: usize) -> usize {
    fb_cols * 2
}
