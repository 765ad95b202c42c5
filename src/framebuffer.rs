//! Physical-layout pixel storage.
//!
//! A [`FrameBuffer`] is laid out the way the panels are wired: `ROWS` is the
//! height of a single panel and `COLS` spans every panel of the chain end to
//! end. Use [`crate::tiling`] to draw into it with logical coordinates.

use embedded_graphics::prelude::{OriginDimensions, Size};

use crate::Rgb3;

/// Frame buffer for a chain of HUB75 panels, one [`Rgb3`] per LED.
///
/// # Type Parameters
///
/// * `ROWS` - Number of rows in a single panel
/// * `COLS` - Number of columns of the whole chain
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer<const ROWS: usize, const COLS: usize> {
    data: [[Rgb3; COLS]; ROWS],
}

impl<const ROWS: usize, const COLS: usize> Default for FrameBuffer<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> FrameBuffer<ROWS, COLS> {
    /// Create a new frame buffer with every pixel off
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [[Rgb3::BLACK; COLS]; ROWS],
        }
    }

    /// Clear the frame buffer to black.
    pub fn clear(&mut self) {
        self.fill(Rgb3::BLACK);
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgb3) {
        for row in &mut self.data {
            row.fill(color);
        }
    }

    /// True when `(x, y)` lies inside the buffer.
    #[inline]
    #[must_use]
    pub const fn contains(x: usize, y: usize) -> bool {
        x < COLS && y < ROWS
    }

    /// Get a pixel, `None` when out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb3> {
        self.data.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Get a mutable reference to a pixel, `None` when out of bounds.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Rgb3> {
        self.data.get_mut(y).and_then(|row| row.get_mut(x))
    }

    /// Get a pixel, treating anything out of bounds as black.
    #[inline]
    #[must_use]
    pub fn pixel_or_black(&self, x: usize, y: usize) -> Rgb3 {
        self.get(x, y).unwrap_or(Rgb3::BLACK)
    }

    /// Set a pixel; out of bounds writes are dropped.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Rgb3) {
        if let Some(pixel) = self.get_mut(x, y) {
            *pixel = color;
        }
    }

    /// A full row of the chain.
    ///
    /// # Panics
    ///
    /// Panics if `y >= ROWS`.
    #[must_use]
    pub fn row(&self, y: usize) -> &[Rgb3; COLS] {
        &self.data[y]
    }

    /// Iterate every pixel in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Rgb3> + '_ {
        self.data.iter().flatten().copied()
    }
}

impl<const ROWS: usize, const COLS: usize> OriginDimensions for FrameBuffer<ROWS, COLS> {
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl<const ROWS: usize, const COLS: usize> core::fmt::Debug for FrameBuffer<ROWS, COLS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("rows", &ROWS)
            .field("cols", &COLS)
            .field("size", &core::mem::size_of_val(&self.data))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize> defmt::Format for FrameBuffer<ROWS, COLS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer<{}, {}>", ROWS, COLS);
        defmt::write!(f, " size: {}", core::mem::size_of_val(&self.data));
    }
}
