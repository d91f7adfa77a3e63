//! Slowly varying background estimation and removal.
//!
//! The background is a separable Gaussian blur of the scan. Edges are handled
//! the same way as in [`crate::median`]: indices are clamped to the nearest
//! valid cell. Subtraction is one-sided, negative residuals are clipped to
//! zero so corrected intensities stay non-negative.

use nvision_core::{try_alloc, AllocError, Grid};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Kernel support in standard deviations on each side of the centre.
const TRUNCATE: f64 = 4.0;

/// Tails longer than this many taps are integrated instead of summed.
const SUMMED_TAIL: usize = 1 << 16;

/// Normalized 1D Gaussian kernel of radius `⌊TRUNCATE·sigma + 0.5⌋`, folded to
/// at most `max_radius` taps per side.
///
/// Taps beyond `max_radius` are added onto the outermost tap: along an axis of
/// `max_radius + 1` cells with clamped edges they all read the same cell, so
/// the folded kernel convolves exactly like the full one. `sigma` must be
/// positive and finite.
pub fn gaussian_kernel(sigma: f64, max_radius: usize) -> Result<Vec<f64>, AllocError> {
    let radius = (TRUNCATE * sigma + 0.5).floor() as usize;
    let reach = radius.min(max_radius);
    let len = reach.saturating_mul(2).saturating_add(1);
    let mut kernel = try_alloc(len, 0.0f64)?;
    let inv_two_var = 0.5 / (sigma * sigma);
    for (i, w) in kernel.iter_mut().enumerate() {
        let d = i as f64 - reach as f64;
        *w = (-d * d * inv_two_var).exp();
    }
    if reach < radius {
        let tail = tail_sum(reach, radius, inv_two_var);
        kernel[0] = tail;
        kernel[len - 1] = tail;
    }
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    Ok(kernel)
}

/// Unnormalized Gaussian weight summed over the taps `from..=to`.
fn tail_sum(from: usize, to: usize, inv_two_var: f64) -> f64 {
    let f = |d: f64| (-d * d * inv_two_var).exp();
    if to - from <= SUMMED_TAIL {
        return (from..=to).map(|d| f(d as f64)).sum();
    }
    // Euler-Maclaurin with a Simpson integral; the kernel is smooth at this scale.
    let (a, b) = (from as f64, to as f64);
    let h = (b - a) / SUMMED_TAIL as f64;
    let mut integral = f(a) + f(b);
    for i in 1..SUMMED_TAIL {
        let coeff = if i % 2 == 1 { 4.0 } else { 2.0 };
        integral += coeff * f(a + h * i as f64);
    }
    integral *= h / 3.0;
    let df = |d: f64| -2.0 * d * inv_two_var * f(d);
    integral + 0.5 * (f(a) + f(b)) + (df(b) - df(a)) / 12.0
}

/// Low-pass estimate of the scan background.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(grid), fields(width = grid.width(), height = grid.height()))
)]
pub fn estimate_background(grid: &Grid, sigma: f64) -> Result<Grid, AllocError> {
    let (w, h) = (grid.width(), grid.height());
    let kx = gaussian_kernel(sigma, w - 1)?;
    let ky = gaussian_kernel(sigma, h - 1)?;
    let (rx, ry) = ((kx.len() / 2) as isize, (ky.len() / 2) as isize);

    // Horizontal pass into a scratch buffer, vertical pass into the output.
    let mut rows = try_alloc(grid.len(), 0.0f64)?;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kx.iter().enumerate() {
                acc += weight * grid.at_clamped(x as isize + k as isize - rx, y as isize);
            }
            rows[y * w + x] = acc;
        }
    }

    Grid::from_fn(w, h, |x, y| {
        let mut acc = 0.0;
        for (k, weight) in ky.iter().enumerate() {
            let sy = (y as isize + k as isize - ry).clamp(0, h as isize - 1) as usize;
            acc += weight * rows[sy * w + x];
        }
        acc
    })
}

/// `max(grid - background, 0)` cell by cell.
///
/// # Panics
///
/// Panics if the two grids differ in shape.
pub fn subtract_background(grid: &Grid, background: &Grid) -> Result<Grid, AllocError> {
    assert_eq!(
        (grid.width(), grid.height()),
        (background.width(), background.height()),
        "background shape mismatch"
    );
    let (src, bg) = (grid.as_slice(), background.as_slice());
    let w = grid.width();
    Grid::from_fn(w, grid.height(), |x, y| {
        let i = y * w + x;
        (src[i] - bg[i]).max(0.0)
    })
}

/// Estimate the background with `sigma` and subtract it.
pub fn remove_background(grid: &Grid, sigma: f64) -> Result<Grid, AllocError> {
    let background = estimate_background(grid, sigma)?;
    subtract_background(grid, &background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(2.0, usize::MAX).expect("alloc");
        assert_eq!(kernel.len(), 17);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..kernel.len() / 2 {
            assert_relative_eq!(kernel[i], kernel[kernel.len() - 1 - i]);
        }
        assert!(kernel[8] > kernel[7]);
    }

    #[test]
    fn constant_grid_has_constant_background() {
        let grid = Grid::filled(12, 9, 4.0).expect("grid");
        let bg = estimate_background(&grid, 3.0).expect("alloc");
        for &v in bg.as_slice() {
            assert_relative_eq!(v, 4.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn linear_ramp_is_preserved_away_from_edges() {
        let grid = Grid::from_fn(40, 40, |x, _| x as f64).expect("alloc");
        let bg = estimate_background(&grid, 2.0).expect("alloc");
        for x in 10..30 {
            assert_relative_eq!(bg.get(x, 20).expect("in bounds"), x as f64, epsilon = 1e-9);
        }
    }

    fn unfolded_background(grid: &Grid, sigma: f64) -> Grid {
        let radius = (TRUNCATE * sigma + 0.5).floor() as isize;
        let taps: Vec<f64> = (-radius..=radius)
            .map(|d| (-(d * d) as f64 / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = taps.iter().sum();
        let blur = |g: &Grid, horizontal: bool| {
            Grid::from_fn(g.width(), g.height(), |x, y| {
                let (x, y) = (x as isize, y as isize);
                (-radius..=radius)
                    .zip(&taps)
                    .map(|(d, w)| {
                        let v = if horizontal {
                            g.at_clamped(x + d, y)
                        } else {
                            g.at_clamped(x, y + d)
                        };
                        w / sum * v
                    })
                    .sum()
            })
            .expect("alloc")
        };
        blur(&blur(grid, true), false)
    }

    #[test]
    fn folded_kernel_keeps_weight_on_outer_taps() {
        let full = gaussian_kernel(3.0, usize::MAX).expect("alloc");
        let folded = gaussian_kernel(3.0, 2).expect("alloc");
        assert_eq!(full.len(), 25);
        assert_eq!(folded.len(), 5);
        assert_relative_eq!(folded.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(folded[0], full[..11].iter().sum::<f64>(), epsilon = 1e-12);
        assert_relative_eq!(folded[2], full[12], epsilon = 1e-12);
        assert_eq!(gaussian_kernel(3.0, 0).expect("alloc"), vec![1.0]);
    }

    #[test]
    fn sigma_wider_than_grid_matches_full_kernel() {
        let grid = Grid::from_fn(5, 3, |x, y| ((x * 7 + y * 3) % 5) as f64).expect("alloc");
        for sigma in [1.5, 3.0, 8.0] {
            let bg = estimate_background(&grid, sigma).expect("alloc");
            let expected = unfolded_background(&grid, sigma);
            for (a, b) in bg.as_slice().iter().zip(expected.as_slice()) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn enormous_sigma_stays_bounded() {
        let grid = Grid::from_fn(6, 4, |x, y| (x + y) as f64).expect("alloc");
        let bg = estimate_background(&grid, 1e12).expect("alloc");
        let mean = grid.as_slice().iter().sum::<f64>() / grid.len() as f64;
        for &v in bg.as_slice() {
            // The estimate flattens to the edge-weighted average of the scan.
            assert!((0.0..=8.0).contains(&v), "v={v}");
            assert_relative_eq!(v, mean, epsilon = 1e-3);
        }
    }

    #[test]
    fn subtraction_clips_negative_residuals() {
        let grid = Grid::from_rows(vec![vec![1.0, 5.0, 2.0]]).expect("grid");
        let bg = Grid::from_rows(vec![vec![3.0, 1.0, 2.0]]).expect("grid");
        let out = subtract_background(&grid, &bg).expect("alloc");
        assert_eq!(out.as_slice(), &[0.0, 4.0, 0.0]);
    }

    #[test]
    fn narrow_spot_survives_background_removal() {
        let mut data = vec![1.0; 31 * 31];
        data[15 * 31 + 15] = 11.0;
        let grid = Grid::from_vec(31, 31, data).expect("grid");
        let out = remove_background(&grid, 10.0).expect("alloc");
        let peak = out.get(15, 15).expect("in bounds");
        assert!(peak > 9.9 && peak < 10.0, "peak={peak}");
        assert!(out.as_slice().iter().all(|&v| v >= 0.0));
    }
}
