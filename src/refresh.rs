//! Row-scanning refresh engine for chained 1/4-scan panels.
//!
//! [`Hub75`] owns the output bus, the display-enable PWM channel and a delay
//! source. Each scan row runs the same sequence:
//!
//! 1. **Disable** – OE duty forced to "panel off".
//! 2. **Row select** – after the settle delay, the row number is driven on A, B, C.
//! 3. **Shift** – `COLS * 2` pixel pairs are clocked into the chain.
//! 4. **Latch** – LAT is pulsed.
//! 5. **Enable** – OE duty restored to the current [`Brightness`], then the row
//!    is held for the row-visible time.
//!
//! [`Hub75::run`] repeats this for every scan row, forever, taking a fresh
//! front buffer from the [`Scanout`] at the start of each pass.
//!
//! The engine is typed by the same [`PixelRemapper`] the producer draws with and
//! takes its panel width from it, so the shift order always matches the layout
//! the frame was drawn for.

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

use crate::brightness::Brightness;
use crate::bus::{Lines, OutputBus};
use crate::config::{check_remapper, Config, ConfigError, EnablePolarity};
use crate::double_buffer::Scanout;
use crate::framebuffer::FrameBuffer;
use crate::tiling::PixelRemapper;
use crate::{compute_scan_rows, compute_shift_cols};

/// Framebuffer positions feeding one clock pulse of the shift chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShiftSource {
    /// Framebuffer column
    pub x: usize,
    /// Framebuffer row driven on R1 G1 B1
    pub upper: usize,
    /// Framebuffer row driven on R2 G2 B2
    pub lower: usize,
}

/// Where the data for clock pulse `col` of scan row `row` comes from.
///
/// Every panel of the chain takes two panel widths of data: the first from
/// rows `row + scan_rows` / `row + 3 * scan_rows`, the second from rows `row` /
/// `row + 2 * scan_rows`.
#[inline]
#[must_use]
pub const fn shift_source(panel_cols: usize, scan_rows: usize, row: usize, col: usize) -> ShiftSource {
    let panel_index = col / panel_cols;
    let panel_in_chain = panel_index / 2;
    let x = panel_in_chain * panel_cols + col % panel_cols;
    let upper = if panel_index % 2 == 0 {
        row + scan_rows
    } else {
        row
    };
    ShiftSource {
        x,
        upper,
        lower: upper + 2 * scan_rows,
    }
}

/// Refresh engine for a chain of 1/4-scan HUB75 panels.
///
/// # Type Parameters
///
/// * `B` - Output bus for colour, address, clock and latch lines
/// * `OE` - PWM channel driving the display-enable line
/// * `D` - Delay source for the settle and row-visible times
/// * `M` - Pixel remapper of the buffers being scanned; supplies the panel width
/// * `ROWS` - Number of rows in a single panel
/// * `COLS` - Number of columns of the whole chain
pub struct Hub75<'a, B, OE, D, M, const ROWS: usize, const COLS: usize> {
    bus: B,
    oe: OE,
    delay: D,
    brightness: &'a Brightness,
    config: Config,
    frames: u32,
    _mapper: PhantomData<fn() -> M>,
}

impl<'a, B, OE, D, M, const ROWS: usize, const COLS: usize> Hub75<'a, B, OE, D, M, ROWS, COLS>
where
    B: OutputBus,
    OE: SetDutyCycle,
    D: DelayNs,
    M: PixelRemapper,
{
    const PANEL_COLS: usize = M::PANEL_COLS;
    const SCAN_ROWS: usize = compute_scan_rows(ROWS);
    const SHIFT_COLS: usize = compute_shift_cols(COLS);

    /// Create the engine, rejecting an invalid topology before any line moves.
    ///
    /// Clock and latch are driven low; the panel stays as it is until the first
    /// row is refreshed.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] found by [`check_remapper`]: `M` must lay out
    /// a `ROWS` x `COLS` framebuffer of whole panels.
    pub fn new(
        mut bus: B,
        oe: OE,
        delay: D,
        brightness: &'a Brightness,
        config: Config,
    ) -> Result<Self, ConfigError> {
        if let Err(e) = check_remapper::<M>(ROWS, COLS) {
            #[cfg(feature = "defmt")]
            defmt::warn!("rejected HUB75 topology: {}", e);
            #[cfg(feature = "log")]
            log::warn!("rejected HUB75 topology: {e}");
            return Err(e);
        }
        bus.set_low(Lines::CLOCK | Lines::LATCH);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "HUB75 chain: {} panels of {}x{}, {} scan rows, {} clocks per row",
            COLS / Self::PANEL_COLS,
            Self::PANEL_COLS,
            ROWS,
            Self::SCAN_ROWS,
            Self::SHIFT_COLS
        );
        #[cfg(feature = "log")]
        log::info!(
            "HUB75 chain: {} panels of {}x{}, {} scan rows, {} clocks per row",
            COLS / Self::PANEL_COLS,
            Self::PANEL_COLS,
            ROWS,
            Self::SCAN_ROWS,
            Self::SHIFT_COLS
        );

        Ok(Self {
            bus,
            oe,
            delay,
            brightness,
            config,
            frames: 0,
            _mapper: PhantomData,
        })
    }

    /// Number of completed scan passes, wrapping.
    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Give back the hardware.
    pub fn release(self) -> (B, OE, D) {
        (self.bus, self.oe, self.delay)
    }

    fn off_duty(&self) -> u16 {
        match self.config.polarity {
            EnablePolarity::Inverted => 0,
            EnablePolarity::Direct => self.oe.max_duty_cycle(),
        }
    }

    fn on_duty(&self) -> u16 {
        let max = self.oe.max_duty_cycle();
        let duty = self.brightness.duty(max);
        match self.config.polarity {
            EnablePolarity::Inverted => duty,
            EnablePolarity::Direct => max - duty,
        }
    }

    /// Refresh a single scan row from `frame`.
    ///
    /// # Errors
    ///
    /// Returns the display-enable channel's error.
    pub fn refresh_row(&mut self, frame: &FrameBuffer<ROWS, COLS>, row: usize) -> Result<(), OE::Error> {
        // disable
        self.oe.set_duty_cycle(self.off_duty())?;
        if self.config.timing.settle_ns > 0 {
            self.delay.delay_ns(self.config.timing.settle_ns);
        }

        // row select
        self.bus.write_group(Lines::ADDRESS, Lines::address(row as u8));

        // shift
        for col in 0..Self::SHIFT_COLS {
            let source = shift_source(Self::PANEL_COLS, Self::SCAN_ROWS, row, col);
            let upper = frame.pixel_or_black(source.x, source.upper);
            let lower = frame.pixel_or_black(source.x, source.lower);
            self.bus.write_group(Lines::COLORS, Lines::colors(upper, lower));
            self.bus.pulse(Lines::CLOCK);
        }

        // latch
        self.bus.pulse(Lines::LATCH);

        // enable
        self.oe.set_duty_cycle(self.on_duty())?;
        self.delay.delay_us(self.config.timing.row_visible_us);
        Ok(())
    }

    /// Refresh every scan row of `frame` once.
    ///
    /// # Errors
    ///
    /// Returns the display-enable channel's error.
    pub fn refresh_frame(&mut self, frame: &FrameBuffer<ROWS, COLS>) -> Result<(), OE::Error> {
        for row in 0..Self::SCAN_ROWS {
            self.refresh_row(frame, row)?;
        }
        self.frames = self.frames.wrapping_add(1);
        Ok(())
    }

    /// Refresh forever, taking the front buffer from `scanout` at the start of
    /// every pass.
    ///
    /// # Errors
    ///
    /// Only returns if the display-enable channel fails.
    pub fn run(&mut self, mut scanout: Scanout<'_, M, ROWS, COLS>) -> Result<Infallible, OE::Error> {
        #[cfg(feature = "defmt")]
        defmt::info!("HUB75 refresh started");
        #[cfg(feature = "log")]
        log::info!("HUB75 refresh started");

        loop {
            let frame = scanout.front();
            self.refresh_frame(frame)?;
        }
    }
}
