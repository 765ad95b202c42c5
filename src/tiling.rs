//! For tiling multiple panels together into one logical drawing surface.
//!
//! The panels are laid out as a rectangular grid but wired as a single long
//! chain, so the physical [`FrameBuffer`](crate::FrameBuffer) is one panel high
//! and every panel of the grid wide. A [`PixelRemapper`] translates logical
//! grid coordinates into that physical chain.
//!
//! Currently supported layouts:
//! - [`ChainRowMajor`]
//!
//! To draw through a remapper use [`Canvas`](crate::Canvas).

/// Computes the number of columns needed if the panels are being tiled together.
/// # Arguments
///
/// * `cols` - Number of columns per panel
/// * `num_panels_wide` - Number of panels tiled horizontally
/// * `num_panels_high` - Number of panels tiled vertically
///
/// # Returns
///
/// Number of columns needed for the physical [`FrameBuffer`](crate::FrameBuffer)
#[must_use]
pub const fn compute_tiled_cols(
    cols: usize,
    num_panels_wide: usize,
    num_panels_high: usize,
) -> usize {
    cols * num_panels_wide * num_panels_high
}

/// Trait for pixel re-mappers
///
/// Implementors of this trait will remap x,y coordinates from a
/// virtual panel to the actual framebuffer used to drive the panels
pub trait PixelRemapper {
    /// Number of rows in the virtual panel
    const VIRT_ROWS: usize;
    /// Number of columns in the virtual panel
    const VIRT_COLS: usize;
    /// Number of rows in the actual framebuffer
    const FB_ROWS: usize;
    /// Number of columns in the actual framebuffer
    const FB_COLS: usize;
    /// Number of columns of one physical panel in the chain
    const PANEL_COLS: usize;

    /// Remap an in-range x,y coordinate to a framebuffer pixel
    fn remap_xy(x: usize, y: usize) -> (usize, usize);

    /// Remap a virtual coordinate, `None` if it lies outside the virtual panel
    #[inline]
    #[must_use]
    fn remap(x: i32, y: i32) -> Option<(usize, usize)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= Self::VIRT_COLS || y >= Self::VIRT_ROWS {
            return None;
        }
        Some(Self::remap_xy(x, y))
    }

    /// Size of the virtual panel
    #[inline]
    #[must_use]
    fn virtual_size() -> (usize, usize) {
        (Self::VIRT_ROWS, Self::VIRT_COLS)
    }

    /// Size of the framebuffer that this remaps to
    #[inline]
    #[must_use]
    fn fb_size() -> (usize, usize) {
        (Self::FB_ROWS, Self::FB_COLS)
    }
}

/// Chaining strategy for tiled panels
///
/// The logical grid is linearised row by row: the top row of panels comes
/// first in the chain from left to right, followed by the second row of panels
/// from left to right, and so on. Every panel keeps its orientation.
///
/// For a logical pixel `(x, y)`:
/// - `chain_index = (y / PANEL_ROWS) * TILE_COLS + x / PANEL_COLS`
/// - `fb_x = chain_index * PANEL_COLS + x % PANEL_COLS`
/// - `fb_y = y % PANEL_ROWS`
///
/// # Type Parameters
///
/// * `PANEL_ROWS` - Number of rows in a single panel
/// * `PANEL_COLS` - Number of columns in a single panel
/// * `TILE_ROWS` - Number of panels stacked vertically
/// * `TILE_COLS` - Number of panels stacked horizontally
pub struct ChainRowMajor<
    const PANEL_ROWS: usize,
    const PANEL_COLS: usize,
    const TILE_ROWS: usize,
    const TILE_COLS: usize,
> {}

impl<
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const TILE_ROWS: usize,
        const TILE_COLS: usize,
    > ChainRowMajor<PANEL_ROWS, PANEL_COLS, TILE_ROWS, TILE_COLS>
{
    /// Position of the panel holding the virtual pixel `(x, y)` within the chain.
    #[inline]
    #[must_use]
    pub const fn chain_index(x: usize, y: usize) -> usize {
        (y / PANEL_ROWS) * TILE_COLS + x / PANEL_COLS
    }
}

impl<
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const TILE_ROWS: usize,
        const TILE_COLS: usize,
    > PixelRemapper for ChainRowMajor<PANEL_ROWS, PANEL_COLS, TILE_ROWS, TILE_COLS>
{
    const VIRT_ROWS: usize = PANEL_ROWS * TILE_ROWS;
    const VIRT_COLS: usize = PANEL_COLS * TILE_COLS;
    const FB_ROWS: usize = PANEL_ROWS;
    const FB_COLS: usize = compute_tiled_cols(PANEL_COLS, TILE_COLS, TILE_ROWS);
    const PANEL_COLS: usize = PANEL_COLS;

    #[inline]
    fn remap_xy(x: usize, y: usize) -> (usize, usize) {
        (
            Self::chain_index(x, y) * PANEL_COLS + x % PANEL_COLS,
            y % PANEL_ROWS,
        )
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;

    use super::*;

    // Three panels wide, two panels high, 64x32 each.
    type Grid = ChainRowMajor<32, 64, 2, 3>;

    #[test]
    fn test_virtual_size_function() {
        assert_eq!(Grid::virtual_size(), (64, 192));
    }

    #[test]
    fn test_virtual_size_function_with_single_column() {
        type PanelChain = ChainRowMajor<32, 64, 3, 1>;
        assert_eq!(PanelChain::virtual_size(), (96, 64));
    }

    #[test]
    fn test_fb_size_function() {
        assert_eq!(Grid::fb_size(), (32, 64 * 6));
    }

    #[test]
    fn test_fb_size_function_with_single_panel() {
        type PanelChain = ChainRowMajor<16, 32, 1, 1>;
        assert_eq!(PanelChain::fb_size(), (16, 32));
        assert_eq!(PanelChain::virtual_size(), (16, 32));
    }

    #[test]
    fn test_panel_cols() {
        assert_eq!(<Grid as PixelRemapper>::PANEL_COLS, 64);
        assert_eq!(<ChainRowMajor<16, 32, 4, 1> as PixelRemapper>::PANEL_COLS, 32);
    }

    #[test]
    fn test_compute_tiled_cols() {
        assert_eq!(192, compute_tiled_cols(32, 3, 2));
        assert_eq!(384, compute_tiled_cols(64, 3, 2));
    }

    #[test]
    fn test_remap_origin() {
        assert_eq!(Grid::remap(0, 0), Some((0, 0)));
    }

    #[test]
    fn test_remap_first_panel_of_second_row() {
        // panel_row = 1, panel_col = 1 -> chain index 1 * 3 + 1 = 4
        assert_eq!(Grid::chain_index(64, 32), 4);
        assert_eq!(Grid::remap(64, 32), Some((4 * 64, 0)));
    }

    #[test]
    fn test_remap_panel_edges() {
        assert_eq!(Grid::remap(63, 0), Some((63, 0)));
        assert_eq!(Grid::remap(64, 0), Some((64, 0)));
        assert_eq!(Grid::remap(0, 31), Some((0, 31)));
        assert_eq!(Grid::remap(0, 32), Some((192, 0)));
        assert_eq!(Grid::remap(191, 63), Some((383, 31)));
    }

    #[test]
    fn test_remap_inside_panel() {
        // x = 100 -> panel_col 1, local 36; y = 40 -> panel_row 1, local 8
        assert_eq!(Grid::remap(100, 40), Some((4 * 64 + 36, 8)));
    }

    #[test]
    fn test_remap_rejects_out_of_range() {
        assert_eq!(Grid::remap(-1, 5), None);
        assert_eq!(Grid::remap(5, -1), None);
        assert_eq!(Grid::remap(192, 0), None);
        assert_eq!(Grid::remap(0, 64), None);
        assert_eq!(Grid::remap(i32::MAX, i32::MAX), None);
        assert_eq!(Grid::remap(i32::MIN, 0), None);
    }

    #[test]
    fn test_remap_is_a_bijection() {
        fn check<M: PixelRemapper>() {
            let (rows, cols) = M::fb_size();
            let mut seen = vec![false; rows * cols];
            let (virt_rows, virt_cols) = M::virtual_size();
            assert_eq!(virt_rows * virt_cols, rows * cols);

            for y in 0..virt_rows {
                for x in 0..virt_cols {
                    let (fb_x, fb_y) = M::remap(x as i32, y as i32).expect("in range");
                    assert!(fb_x < cols && fb_y < rows, "({x}, {y}) left the buffer");
                    let index = fb_y * cols + fb_x;
                    assert!(!seen[index], "({x}, {y}) collides at ({fb_x}, {fb_y})");
                    seen[index] = true;
                }
            }
            assert!(seen.iter().all(|&hit| hit));
        }

        check::<ChainRowMajor<32, 64, 2, 3>>();
        check::<ChainRowMajor<8, 16, 3, 2>>();
        check::<ChainRowMajor<4, 4, 1, 5>>();
        check::<ChainRowMajor<16, 32, 4, 1>>();
    }
}
