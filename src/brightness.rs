//! Brightness control through the display-enable duty cycle.
//!
//! The level is shared: a control surface (button, remote command) calls
//! [`Brightness::set_brightness`] while the refresh engine reads the level at
//! every row's enable point, so a change shows up within one scan row.

use core::sync::atomic::{AtomicU8, Ordering};

/// Scale a 0-255 brightness level to a duty cycle of `max_duty`.
///
/// Level 0 maps to 0, level 255 maps to `max_duty`, and the result never
/// decreases as the level grows.
#[inline]
#[must_use]
pub const fn duty_for_level(level: u8, max_duty: u16) -> u16 {
    (max_duty as u32 * level as u32 / u8::MAX as u32) as u16
}

/// Shared brightness level.
#[derive(Debug)]
pub struct Brightness {
    level: AtomicU8,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new(u8::MAX)
    }
}

impl Brightness {
    /// Create a brightness level, usually in a `static`
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self {
            level: AtomicU8::new(level),
        }
    }

    /// Set the brightness level, taking effect at the next scan row.
    pub fn set_brightness(&self, level: u8) {
        self.level.store(level, Ordering::Relaxed);
    }

    /// The current brightness level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    /// Duty cycle for the current level on a channel with `max_duty` steps.
    #[must_use]
    pub fn duty(&self, max_duty: u16) -> u16 {
        duty_for_level(self.level(), max_duty)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Brightness {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Brightness({=u8})", self.level())
    }
}
