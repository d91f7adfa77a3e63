//! Relative thresholding of a processed scan.

use nvision_core::{AllocError, Grid, Mask};

/// Absolute cut for a relative `threshold` in `[0, 1]`: `threshold × max(grid)`.
#[inline]
pub fn threshold_cut(grid: &Grid, threshold: f64) -> f64 {
    threshold * grid.max()
}

/// Mark every cell strictly above `threshold × max(grid)`.
///
/// A grid whose maximum is zero yields an all-false mask.
pub fn binarize(grid: &Grid, threshold: f64) -> Result<Mask, AllocError> {
    let cut = threshold_cut(grid, threshold);
    let w = grid.width();
    let data = grid.as_slice();
    Mask::from_fn(w, grid.height(), |x, y| data[y * w + x] > cut)
}
