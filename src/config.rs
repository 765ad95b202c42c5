//! Startup configuration for the refresh engine.
//!
//! The panel topology is fixed at compile time through const generics; the
//! values here cover timing and output polarity. Everything is validated once
//! by [`Hub75::new`](crate::Hub75::new) before any line is driven.

use crate::compute_scan_rows;
use crate::tiling::PixelRemapper;

/// Highest scan row count the three address lines (A, B, C) can select.
pub const MAX_SCAN_ROWS: usize = 8;

/// Configuration faults detected before the refresh engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A panel or chain dimension is zero.
    ZeroDimension,
    /// The panel height is not a multiple of four, as 1/4 scan requires.
    RowsNotMultipleOfFour {
        /// Configured panel height
        rows: usize,
    },
    /// The panel height needs more scan rows than the address lines can encode.
    TooManyScanRows {
        /// Scan rows the panel height would need
        scan_rows: usize,
    },
    /// The chain width is not a whole number of panels.
    PartialPanel {
        /// Columns of the physical framebuffer
        cols: usize,
        /// Columns of a single panel
        panel_cols: usize,
    },
    /// The pixel remapper lays out a framebuffer of a different size.
    RemapperMismatch {
        /// Framebuffer rows of the remapper
        fb_rows: usize,
        /// Framebuffer columns of the remapper
        fb_cols: usize,
    },
    /// A GPIO number does not fit the output port.
    InvalidPin {
        /// Offending GPIO number
        pin: u8,
    },
    /// The same GPIO number is assigned to two lines.
    DuplicatePin {
        /// Offending GPIO number
        pin: u8,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "panel dimensions must be non-zero"),
            Self::RowsNotMultipleOfFour { rows } => {
                write!(f, "panel height {rows} is not a multiple of 4")
            }
            Self::TooManyScanRows { scan_rows } => write!(
                f,
                "{scan_rows} scan rows exceed the {MAX_SCAN_ROWS} selectable by the address lines"
            ),
            Self::PartialPanel { cols, panel_cols } => write!(
                f,
                "chain width {cols} is not a multiple of the panel width {panel_cols}"
            ),
            Self::RemapperMismatch { fb_rows, fb_cols } => write!(
                f,
                "pixel remapper lays out {fb_cols}x{fb_rows}, not the engine's framebuffer"
            ),
            Self::InvalidPin { pin } => write!(f, "GPIO {pin} is outside the output port"),
            Self::DuplicatePin { pin } => write!(f, "GPIO {pin} is assigned to more than one line"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Validate a chain topology.
///
/// # Arguments
///
/// * `rows` - Number of rows in a single panel
/// * `cols` - Number of columns of the whole chain
/// * `panel_cols` - Number of columns in a single panel
///
/// # Errors
///
/// Returns the first [`ConfigError`] the topology violates.
pub const fn check_topology(rows: usize, cols: usize, panel_cols: usize) -> Result<(), ConfigError> {
    if rows == 0 || cols == 0 || panel_cols == 0 {
        return Err(ConfigError::ZeroDimension);
    }
    if rows % 4 != 0 {
        return Err(ConfigError::RowsNotMultipleOfFour { rows });
    }
    let scan_rows = compute_scan_rows(rows);
    if scan_rows > MAX_SCAN_ROWS {
        return Err(ConfigError::TooManyScanRows { scan_rows });
    }
    if cols % panel_cols != 0 {
        return Err(ConfigError::PartialPanel { cols, panel_cols });
    }
    Ok(())
}

/// Validate the chain described by a pixel remapper for a `rows` x `cols` engine.
///
/// The remapper must lay out exactly that framebuffer, and its panel width then
/// goes through [`check_topology`].
///
/// # Errors
///
/// [`ConfigError::RemapperMismatch`], or the error from [`check_topology`].
pub fn check_remapper<M: PixelRemapper>(rows: usize, cols: usize) -> Result<(), ConfigError> {
    if M::FB_ROWS != rows || M::FB_COLS != cols {
        return Err(ConfigError::RemapperMismatch {
            fb_rows: M::FB_ROWS,
            fb_cols: M::FB_COLS,
        });
    }
    check_topology(rows, cols, M::PANEL_COLS)
}

/// How the display-enable PWM output relates to the panel's OE input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnablePolarity {
    /// The PWM output is inverted in hardware, so duty is the time the LEDs are lit.
    #[default]
    Inverted,
    /// The PWM drives the active-low OE input directly, so duty is the time the LEDs are blanked.
    Direct,
}

/// Refresh timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Pause between blanking the panel and changing the row address, in nanoseconds.
    pub settle_ns: u32,
    /// Time each scan row stays lit, in microseconds.
    pub row_visible_us: u32,
}

impl Timing {
    /// Create a timing configuration
    #[must_use]
    pub const fn new(settle_ns: u32, row_visible_us: u32) -> Self {
        Self {
            settle_ns,
            row_visible_us,
        }
    }
}

impl Default for Timing {
    /// No settle pause and 50µs of visible time per row.
    fn default() -> Self {
        Self::new(0, 50)
    }
}

/// Refresh engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Per-row delays
    pub timing: Timing,
    /// Display-enable output polarity
    pub polarity: EnablePolarity,
}

impl Config {
    /// Create a configuration
    #[must_use]
    pub const fn new(timing: Timing, polarity: EnablePolarity) -> Self {
        Self { timing, polarity }
    }

    /// Replace the timing
    #[must_use]
    pub const fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the polarity
    #[must_use]
    pub const fn with_polarity(mut self, polarity: EnablePolarity) -> Self {
        self.polarity = polarity;
        self
    }
}
