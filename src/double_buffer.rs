//! Front/back buffer pair shared between a drawing producer and the refresh engine.
//!
//! [`DoubleBuffer::split`] hands out exactly two handles:
//!
//! - [`Canvas`] for the producer. It draws into the *back* buffer with logical
//!   coordinates and publishes finished frames with [`Canvas::swap_buffers`].
//! - [`Scanout`] for the refresh engine. [`Scanout::front`] returns the *front*
//!   buffer for one complete scan pass.
//!
//! The only shared state is one atomic byte holding the index of the front
//! buffer and the index of the buffer the engine is scanning. A swap flips the
//! front index and never blocks. The engine picks up the new front buffer at the
//! start of its next pass; until then the old front buffer is still being
//! scanned. Drawing into the new back buffer before that pass begins fails with
//! [`BufferBusy`] and changes nothing, so the engine always scans a complete
//! frame and the producer never writes into the buffer being scanned.
//!
//! A producer that would rather wait polls [`Canvas::back_ready`] (yielding to
//! its executor between polls) or calls [`Canvas::back_mut`], which spins. Both
//! only make progress while the engine keeps starting passes.
//!
//! ```
//! use hub75_chain::tiling::{compute_tiled_cols, ChainRowMajor};
//! use hub75_chain::{DoubleBuffer, Rgb3};
//!
//! const ROWS: usize = 32;
//! const PANEL_COLS: usize = 64;
//! const COLS: usize = compute_tiled_cols(PANEL_COLS, 3, 2);
//! type Grid = ChainRowMajor<ROWS, PANEL_COLS, 2, 3>;
//!
//! let mut buffers = DoubleBuffer::<ROWS, COLS>::new();
//! let (mut canvas, mut scanout) = buffers.split::<Grid>();
//!
//! canvas.clear_back_buffer().unwrap();
//! canvas.set_pixel(64, 32, Rgb3::RED).unwrap();
//! canvas.swap_buffers();
//!
//! // normally done by the refresh engine on another core or task
//! let front = scanout.front();
//! assert_eq!(front.get(4 * 64, 0), Some(Rgb3::RED));
//! ```

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::prelude::{OriginDimensions, Size};
use embedded_graphics::Pixel;

use crate::framebuffer::FrameBuffer;
use crate::tiling::PixelRemapper;
use crate::{Color, Rgb3};

/// Bit holding the index of the front buffer.
const FRONT: u8 = 0b01;
/// Bit holding the index of the buffer the engine is scanning.
const SCANNING: u8 = 0b10;

/// The back buffer is still being scanned by the refresh engine.
///
/// Returned by drawing operations between [`Canvas::swap_buffers`] and the
/// start of the engine's next scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferBusy;

impl core::fmt::Display for BufferBusy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "back buffer is still being scanned")
    }
}

impl core::error::Error for BufferBusy {}

#[inline]
const fn front_index(state: u8) -> usize {
    (state & FRONT) as usize
}

#[inline]
const fn scanning_index(state: u8) -> usize {
    ((state & SCANNING) >> 1) as usize
}

/// Two physical-layout frame buffers with exchangeable front/back roles.
///
/// Both buffers start out black with buffer 0 in the front role. The pair can
/// live in a `static` (see [`DoubleBuffer::new`]) and is used through the
/// handles returned by [`DoubleBuffer::split`].
///
/// # Type Parameters
///
/// * `ROWS` - Number of rows in a single panel
/// * `COLS` - Number of columns of the whole chain
pub struct DoubleBuffer<const ROWS: usize, const COLS: usize> {
    buffers: [UnsafeCell<FrameBuffer<ROWS, COLS>>; 2],
    state: AtomicU8,
}

// SAFETY: the buffers are only reached through `Canvas` and `Scanout`, of
// which at most one each exists per `split` borrow. `Canvas` only touches the
// back buffer once the engine has stopped scanning it, and `Scanout` only reads
// the buffer it published as scanning.
unsafe impl<const ROWS: usize, const COLS: usize> Sync for DoubleBuffer<ROWS, COLS> {}

impl<const ROWS: usize, const COLS: usize> Default for DoubleBuffer<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> DoubleBuffer<ROWS, COLS> {
    /// Create a zeroed buffer pair
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: [
                UnsafeCell::new(FrameBuffer::new()),
                UnsafeCell::new(FrameBuffer::new()),
            ],
            state: AtomicU8::new(0),
        }
    }

    /// Split into the producer and the refresh engine handles.
    ///
    /// `M` is the mapping from the logical drawing grid onto the chain; its
    /// framebuffer size must be `ROWS` x `COLS`, which is checked at compile
    /// time.
    pub fn split<M: PixelRemapper>(
        &mut self,
    ) -> (Canvas<'_, M, ROWS, COLS>, Scanout<'_, M, ROWS, COLS>) {
        let () = Canvas::<M, ROWS, COLS>::SIZE_CHECK;
        let this = &*self;
        (
            Canvas {
                buffers: this,
                ready: false,
                _mapper: PhantomData,
            },
            Scanout {
                buffers: this,
                _mapper: PhantomData,
            },
        )
    }

    /// Index of the buffer currently holding the front role.
    #[must_use]
    pub fn front_index(&self) -> usize {
        front_index(self.state.load(Ordering::Acquire))
    }
}

impl<const ROWS: usize, const COLS: usize> core::fmt::Debug for DoubleBuffer<ROWS, COLS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.load(Ordering::Relaxed);
        f.debug_struct("DoubleBuffer")
            .field("rows", &ROWS)
            .field("cols", &COLS)
            .field("front", &front_index(state))
            .field("scanning", &scanning_index(state))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize> defmt::Format for DoubleBuffer<ROWS, COLS> {
    fn format(&self, f: defmt::Formatter) {
        let state = self.state.load(Ordering::Relaxed);
        defmt::write!(
            f,
            "DoubleBuffer<{}, {}> front: {} scanning: {}",
            ROWS,
            COLS,
            front_index(state),
            scanning_index(state)
        );
    }
}

/// Producer handle: draws into the back buffer with logical coordinates.
///
/// Implements [`DrawTarget`] so `embedded-graphics` primitives, fonts and
/// images can be drawn directly; every pixel goes through
/// [`Canvas::set_pixel`]. Drawing returns [`BufferBusy`] while the engine
/// still scans the back buffer.
pub struct Canvas<'a, M, const ROWS: usize, const COLS: usize> {
    buffers: &'a DoubleBuffer<ROWS, COLS>,
    // the engine has moved off the back buffer since the last swap
    ready: bool,
    _mapper: PhantomData<fn() -> M>,
}

impl<M: PixelRemapper, const ROWS: usize, const COLS: usize> Canvas<'_, M, ROWS, COLS> {
    const SIZE_CHECK: () = assert!(
        M::FB_ROWS == ROWS && M::FB_COLS == COLS,
        "pixel remapper does not match the framebuffer size"
    );

    #[inline]
    fn back_index(&self) -> usize {
        // only this handle changes the front bit
        front_index(self.buffers.state.load(Ordering::Relaxed)) ^ 1
    }

    #[inline]
    fn acquire(&mut self) -> bool {
        if !self.ready {
            let state = self.buffers.state.load(Ordering::Acquire);
            self.ready = scanning_index(state) != front_index(state) ^ 1;
        }
        self.ready
    }

    fn back_ptr(&mut self) -> *mut FrameBuffer<ROWS, COLS> {
        while !self.acquire() {
            core::hint::spin_loop();
        }
        self.buffers.buffers[self.back_index()].get()
    }

    /// True once the engine has moved off the back buffer, so drawing succeeds.
    ///
    /// Stays true until the next [`Canvas::swap_buffers`].
    pub fn back_ready(&mut self) -> bool {
        self.acquire()
    }

    /// The back buffer, waiting for the engine to leave it if needed.
    ///
    /// # Blocking
    ///
    /// Spins until the engine starts a scan pass on the current front buffer.
    /// Never returns if the engine has stopped or cannot run while the caller
    /// spins; use [`Canvas::back_ready`] in that case.
    pub fn back(&mut self) -> &FrameBuffer<ROWS, COLS> {
        let ptr = self.back_ptr();
        // SAFETY: `acquire` confirmed the engine is not scanning the back
        // buffer, and it cannot start until the next swap, which needs `&mut self`.
        unsafe { &*ptr }
    }

    /// The back buffer for writing, waiting for the engine to leave it if needed.
    ///
    /// # Blocking
    ///
    /// Same as [`Canvas::back`].
    pub fn back_mut(&mut self) -> &mut FrameBuffer<ROWS, COLS> {
        let ptr = self.back_ptr();
        // SAFETY: see `back`.
        unsafe { &mut *ptr }
    }

    /// The back buffer for writing, or `None` while the engine is still scanning it.
    pub fn try_back_mut(&mut self) -> Option<&mut FrameBuffer<ROWS, COLS>> {
        if !self.acquire() {
            return None;
        }
        let ptr = self.buffers.buffers[self.back_index()].get();
        // SAFETY: see `back`.
        Some(unsafe { &mut *ptr })
    }

    /// Write `color` at logical `(x, y)` of the back buffer.
    ///
    /// Coordinates outside the logical grid are ignored.
    ///
    /// # Errors
    ///
    /// [`BufferBusy`] if the engine has not yet moved off the back buffer since
    /// the last swap; nothing is written.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb3) -> Result<(), BufferBusy> {
        let Some((fb_x, fb_y)) = M::remap(x, y) else {
            return Ok(());
        };
        debug_assert!(
            FrameBuffer::<ROWS, COLS>::contains(fb_x, fb_y),
            "({x}, {y}) mapped outside the framebuffer to ({fb_x}, {fb_y})"
        );
        self.try_back_mut().ok_or(BufferBusy)?.set(fb_x, fb_y, color);
        Ok(())
    }

    /// Set every pixel of the back buffer to black.
    ///
    /// # Errors
    ///
    /// [`BufferBusy`], as for [`Canvas::set_pixel`].
    pub fn clear_back_buffer(&mut self) -> Result<(), BufferBusy> {
        self.try_back_mut().ok_or(BufferBusy)?.clear();
        Ok(())
    }

    /// Exchange the front and back roles.
    ///
    /// The drawn frame becomes visible from the engine's next scan pass. The new
    /// back buffer holds the frame from two swaps ago.
    pub fn swap_buffers(&mut self) {
        self.buffers.state.fetch_xor(FRONT, Ordering::Release);
        self.ready = false;
        #[cfg(feature = "defmt")]
        defmt::trace!("front buffer is now {}", self.buffers.front_index());
        #[cfg(feature = "log")]
        log::trace!("front buffer is now {}", self.buffers.front_index());
    }
}

impl<M: PixelRemapper, const ROWS: usize, const COLS: usize> OriginDimensions
    for Canvas<'_, M, ROWS, COLS>
{
    fn size(&self) -> Size {
        Size::new(M::VIRT_COLS as u32, M::VIRT_ROWS as u32)
    }
}

impl<M: PixelRemapper, const ROWS: usize, const COLS: usize> DrawTarget
    for Canvas<'_, M, ROWS, COLS>
{
    type Color = Color;
    type Error = BufferBusy;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, color) in pixels {
            self.set_pixel(p.x, p.y, color.into())?;
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        // the mapping covers every physical pixel exactly once
        self.try_back_mut().ok_or(BufferBusy)?.fill(color.into());
        Ok(())
    }
}

/// Refresh engine handle: reads the front buffer one scan pass at a time.
///
/// Carries the remapper `M` the producer draws with, so the engine can only be
/// run with the panel layout the buffers were drawn for.
pub struct Scanout<'a, M, const ROWS: usize, const COLS: usize> {
    buffers: &'a DoubleBuffer<ROWS, COLS>,
    _mapper: PhantomData<fn() -> M>,
}

impl<M, const ROWS: usize, const COLS: usize> Scanout<'_, M, ROWS, COLS> {
    /// Start a scan pass and return the front buffer to scan.
    ///
    /// The buffer is fixed for as long as the returned reference lives; a swap
    /// made meanwhile is picked up by the next call.
    pub fn front(&mut self) -> &FrameBuffer<ROWS, COLS> {
        let state = &self.buffers.state;
        let previous = match state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            let front = s & FRONT;
            Some(front | front << 1)
        }) {
            Ok(s) | Err(s) => s,
        };
        let index = front_index(previous);
        // SAFETY: the producer never touches the buffer published as scanning.
        unsafe { &*self.buffers.buffers[index].get() }
    }
}
