//! Output lines driven by the refresh engine.
//!
//! The engine talks to the panel through an [`OutputBus`]: every change is a
//! single "drive these lines high, those lines low" request expressed in the
//! canonical [`Lines`] layout. Two implementations are provided:
//!
//! - [`MaskedPort`] translates the request into set/clear bit masks for a GPIO
//!   port with write-one-to-set / write-one-to-clear registers (for example
//!   `GPIO.out_w1ts` / `GPIO.out_w1tc` on the ESP32), using a validated
//!   [`PinMap`]. All colour lines change with two register writes.
//! - [`PinBus`] drives individual [`embedded_hal::digital::OutputPin`]s one at a
//!   time, for boards where the lines are not on one port.
//!
//! The display-enable (OE) line is not part of the bus: it is a PWM channel
//! owned by the engine.

use core::convert::Infallible;
use core::ops::{BitAnd, BitOr, Not};

use bitfield::bitfield;
use embedded_hal::digital::OutputPin;

use crate::config::ConfigError;
use crate::Rgb3;

/// Number of lines in the canonical layout.
pub const LINE_COUNT: usize = 11;

bitfield! {
    /// 16-bit word naming a set of output lines.
    ///
    /// The bit layout is as follows:
    /// - Bit 10: Latch
    /// - Bit 9: Clock
    /// - Bits 8-6: Row address (A = bit 6, B = bit 7, C = bit 8)
    /// - Bit 5: Blue channel for the lower lane
    /// - Bit 4: Green channel for the lower lane
    /// - Bit 3: Red channel for the lower lane
    /// - Bit 2: Blue channel for the upper lane
    /// - Bit 1: Green channel for the upper lane
    /// - Bit 0: Red channel for the upper lane
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Lines(u16);
    impl Debug;
    pub latch, set_latch: 10;
    pub clock, set_clock: 9;
    pub u8, addr, set_addr: 8, 6;
    pub blu2, set_blu2: 5;
    pub grn2, set_grn2: 4;
    pub red2, set_red2: 3;
    pub blu1, set_blu1: 2;
    pub grn1, set_grn1: 1;
    pub red1, set_red1: 0;
}

impl Lines {
    /// No lines
    pub const NONE: Self = Self(0);
    /// The six colour lines
    pub const COLORS: Self = Self(0b000_0011_1111);
    /// The three row address lines
    pub const ADDRESS: Self = Self(0b001_1100_0000);
    /// Shift clock
    pub const CLOCK: Self = Self(1 << 9);
    /// Latch
    pub const LATCH: Self = Self(1 << 10);
    /// Every line of the bus
    pub const ALL: Self = Self((1 << LINE_COUNT) - 1);

    /// Create an empty set of lines
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// The raw line bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Lines from raw bits; bits outside the layout are ignored.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Colour lines that are lit for an upper and a lower lane pixel.
    #[must_use]
    pub const fn colors(upper: Rgb3, lower: Rgb3) -> Self {
        Self((upper.bits() | lower.bits() << 3) as u16)
    }

    /// Address lines that are high when selecting scan row `row`.
    #[must_use]
    pub const fn address(row: u8) -> Self {
        Self(((row & 0b111) as u16) << 6)
    }

    /// True when no line is named.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the bit positions of the named lines, lowest first.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..LINE_COUNT).filter(move |i| self.0 & (1 << i) != 0)
    }
}

impl BitOr for Lines {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Lines {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Lines {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Lines {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Lines({=u16:#x})", self.0)
    }
}

/// Capability to change a group of output lines at once.
///
/// Implementations must not fail: a refresh that cannot drive its lines has no
/// way to recover.
pub trait OutputBus {
    /// Drive every line in `set` high and every line in `clear` low.
    ///
    /// Callers never name a line in both sets.
    fn modify(&mut self, set: Lines, clear: Lines);

    /// Drive `lines` high.
    #[inline]
    fn set_high(&mut self, lines: Lines) {
        self.modify(lines, Lines::NONE);
    }

    /// Drive `lines` low.
    #[inline]
    fn set_low(&mut self, lines: Lines) {
        self.modify(Lines::NONE, lines);
    }

    /// Drive exactly the lines in `high` high and the rest of `group` low.
    #[inline]
    fn write_group(&mut self, group: Lines, high: Lines) {
        let high = high & group;
        self.modify(high, group & !high);
    }

    /// Pulse `lines` high then low.
    #[inline]
    fn pulse(&mut self, lines: Lines) {
        self.set_high(lines);
        self.set_low(lines);
    }
}

impl<T: OutputBus + ?Sized> OutputBus for &mut T {
    #[inline]
    fn modify(&mut self, set: Lines, clear: Lines) {
        (**self).modify(set, clear);
    }
}

/// Write-one-to-set / write-one-to-clear output port.
///
/// On an ESP32 this is a thin wrapper writing the masks to the `out_w1ts` and
/// `out_w1tc` registers.
pub trait PortRegister {
    /// Drive every pin whose bit is set in `mask` high.
    fn write_set(&mut self, mask: u32);
    /// Drive every pin whose bit is set in `mask` low.
    fn write_clear(&mut self, mask: u32);
}

/// GPIO number of every bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct PinMap {
    pub r1: u8,
    pub g1: u8,
    pub b1: u8,
    pub r2: u8,
    pub g2: u8,
    pub b2: u8,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub clk: u8,
    pub lat: u8,
}

impl Default for PinMap {
    /// ESP32 wiring: R1 2, G1 4, B1 5, R2 18, G2 19, B2 25, A 15, B 26, C 23,
    /// CLK 13, LAT 12.
    fn default() -> Self {
        Self {
            r1: 2,
            g1: 4,
            b1: 5,
            r2: 18,
            g2: 19,
            b2: 25,
            a: 15,
            b: 26,
            c: 23,
            clk: 13,
            lat: 12,
        }
    }
}

impl PinMap {
    /// GPIO numbers in [`Lines`] bit order.
    #[must_use]
    pub const fn in_line_order(&self) -> [u8; LINE_COUNT] {
        [
            self.r1, self.g1, self.b1, self.r2, self.g2, self.b2, self.a, self.b, self.c,
            self.clk, self.lat,
        ]
    }

    /// Check every GPIO number fits a 32-bit port and none is used twice.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPin`] or [`ConfigError::DuplicatePin`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut used = 0u32;
        for pin in self.in_line_order() {
            if pin >= 32 {
                return Err(ConfigError::InvalidPin { pin });
            }
            let bit = 1 << pin;
            if used & bit != 0 {
                return Err(ConfigError::DuplicatePin { pin });
            }
            used |= bit;
        }
        Ok(())
    }
}

/// [`OutputBus`] over a set/clear register port.
///
/// Port masks are looked up per line group from tables built once in
/// [`MaskedPort::new`].
pub struct MaskedPort<P> {
    port: P,
    // indexed by the colour bits of a `Lines`
    colors: [u32; 64],
    // indexed by the row address
    address: [u32; 8],
    clock: u32,
    latch: u32,
}

/// Port masks for every combination of the `log2(N)` lines starting at line `first`.
fn group_masks<const N: usize>(pins: &[u8; LINE_COUNT], first: usize) -> [u32; N] {
    core::array::from_fn(|combination| {
        (0..N.trailing_zeros() as usize)
            .filter(|bit| combination & (1 << bit) != 0)
            .fold(0, |mask, bit| mask | 1u32 << pins[first + bit])
    })
}

impl<P: PortRegister> MaskedPort<P> {
    /// Wrap `port`, routing lines to the GPIOs named by `pins`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`PinMap::validate`].
    pub fn new(port: P, pins: PinMap) -> Result<Self, ConfigError> {
        if let Err(e) = pins.validate() {
            #[cfg(feature = "defmt")]
            defmt::warn!("rejected pin map: {}", e);
            #[cfg(feature = "log")]
            log::warn!("rejected pin map: {e}");
            return Err(e);
        }
        let pins = pins.in_line_order();
        Ok(Self {
            port,
            colors: group_masks(&pins, 0),
            address: group_masks(&pins, 6),
            clock: 1 << pins[9],
            latch: 1 << pins[10],
        })
    }

    /// Port bit mask for a set of lines.
    #[inline]
    #[must_use]
    pub fn mask(&self, lines: Lines) -> u32 {
        let mut mask = self.colors[usize::from(lines.bits() & Lines::COLORS.bits())]
            | self.address[usize::from(lines.addr())];
        if lines.clock() {
            mask |= self.clock;
        }
        if lines.latch() {
            mask |= self.latch;
        }
        mask
    }

    /// Give back the wrapped port.
    pub fn release(self) -> P {
        self.port
    }
}

impl<P: PortRegister> OutputBus for MaskedPort<P> {
    #[inline]
    fn modify(&mut self, set: Lines, clear: Lines) {
        if !set.is_empty() {
            let mask = self.mask(set);
            self.port.write_set(mask);
        }
        if !clear.is_empty() {
            let mask = self.mask(clear);
            self.port.write_clear(mask);
        }
    }
}

/// [`OutputBus`] over one [`OutputPin`] per line.
///
/// Pins must be infallible, as GPIO outputs on microcontrollers are.
pub struct PinBus<R1, G1, B1, R2, G2, B2, A, B, C, CLK, LAT> {
    r1: R1,
    g1: G1,
    b1: B1,
    r2: R2,
    g2: G2,
    b2: B2,
    a: A,
    b: B,
    c: C,
    clk: CLK,
    lat: LAT,
}

#[inline]
fn drive<P: OutputPin<Error = Infallible>>(pin: &mut P, bit: u16, set: Lines, clear: Lines) {
    let result = if set.0 & bit != 0 {
        pin.set_high()
    } else if clear.0 & bit != 0 {
        pin.set_low()
    } else {
        Ok(())
    };
    result.unwrap_or_else(|e| match e {});
}

impl<R1, G1, B1, R2, G2, B2, A, B, C, CLK, LAT> PinBus<R1, G1, B1, R2, G2, B2, A, B, C, CLK, LAT>
where
    R1: OutputPin<Error = Infallible>,
    G1: OutputPin<Error = Infallible>,
    B1: OutputPin<Error = Infallible>,
    R2: OutputPin<Error = Infallible>,
    G2: OutputPin<Error = Infallible>,
    B2: OutputPin<Error = Infallible>,
    A: OutputPin<Error = Infallible>,
    B: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    CLK: OutputPin<Error = Infallible>,
    LAT: OutputPin<Error = Infallible>,
{
    /// Create a bus from its pins
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        r1: R1,
        g1: G1,
        b1: B1,
        r2: R2,
        g2: G2,
        b2: B2,
        a: A,
        b: B,
        c: C,
        clk: CLK,
        lat: LAT,
    ) -> Self {
        Self {
            r1,
            g1,
            b1,
            r2,
            g2,
            b2,
            a,
            b,
            c,
            clk,
            lat,
        }
    }
}

impl<R1, G1, B1, R2, G2, B2, A, B, C, CLK, LAT> OutputBus
    for PinBus<R1, G1, B1, R2, G2, B2, A, B, C, CLK, LAT>
where
    R1: OutputPin<Error = Infallible>,
    G1: OutputPin<Error = Infallible>,
    B1: OutputPin<Error = Infallible>,
    R2: OutputPin<Error = Infallible>,
    G2: OutputPin<Error = Infallible>,
    B2: OutputPin<Error = Infallible>,
    A: OutputPin<Error = Infallible>,
    B: OutputPin<Error = Infallible>,
    C: OutputPin<Error = Infallible>,
    CLK: OutputPin<Error = Infallible>,
    LAT: OutputPin<Error = Infallible>,
{
    fn modify(&mut self, set: Lines, clear: Lines) {
        drive(&mut self.r1, 1 << 0, set, clear);
        drive(&mut self.g1, 1 << 1, set, clear);
        drive(&mut self.b1, 1 << 2, set, clear);
        drive(&mut self.r2, 1 << 3, set, clear);
        drive(&mut self.g2, 1 << 4, set, clear);
        drive(&mut self.b2, 1 << 5, set, clear);
        drive(&mut self.a, 1 << 6, set, clear);
        drive(&mut self.b, 1 << 7, set, clear);
        drive(&mut self.c, 1 << 8, set, clear);
        drive(&mut self.clk, 1 << 9, set, clear);
        drive(&mut self.lat, 1 << 10, set, clear);
    }
}
