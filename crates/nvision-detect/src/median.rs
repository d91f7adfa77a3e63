//! Sliding-window median smoothing.

use nvision_core::{try_alloc, AllocError, Grid};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Median of each `size × size` window centred on a cell.
///
/// Window indices falling outside the grid are clamped to the nearest valid
/// cell, so every window holds exactly `size²` samples. `size = 1` returns a
/// copy of the input. Windows wider than the grid cost no more than windows
/// spanning it.
///
/// # Panics
///
/// Panics if `size` is zero or even.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(grid), fields(width = grid.width(), height = grid.height()))
)]
pub fn median_filter(grid: &Grid, size: usize) -> Result<Grid, AllocError> {
    assert!(size % 2 == 1, "median window must be odd, got {size}");
    let half = size / 2;
    if half < grid.width() && half < grid.height() {
        window_median(grid, half)
    } else {
        folded_window_median(grid, half)
    }
}

fn window_median(grid: &Grid, half: usize) -> Result<Grid, AllocError> {
    let size = 2 * half + 1;
    let mid = size * size / 2;
    let half = half as isize;
    let mut window = try_alloc(size * size, 0.0f64)?;

    Grid::from_fn(grid.width(), grid.height(), |x, y| {
        let (cx, cy) = (x as isize, y as isize);
        let mut n = 0;
        for dy in -half..=half {
            for dx in -half..=half {
                window[n] = grid.at_clamped(cx + dx, cy + dy);
                n += 1;
            }
        }
        let (_, median, _) = window.select_nth_unstable_by(mid, f64::total_cmp);
        *median
    })
}

/// Offsets along one axis with their multiplicities.
///
/// Offsets at or beyond `len - 1` clamp to the same edge cell for every
/// centre, so they collapse onto the outermost offset.
fn axis_taps(half: usize, len: usize) -> Vec<(isize, u128)> {
    let reach = half.min(len - 1);
    if reach == 0 {
        return vec![(0, 2 * half as u128 + 1)];
    }
    let edge = (half - reach) as u128 + 1;
    let reach = reach as isize;
    (-reach..=reach)
        .map(|d| (d, if d.abs() == reach { edge } else { 1 }))
        .collect()
}

/// Weighted median over the collapsed window of a window wider than the grid.
fn folded_window_median(grid: &Grid, half: usize) -> Result<Grid, AllocError> {
    let xs = axis_taps(half, grid.width());
    let ys = axis_taps(half, grid.height());
    let side = 2 * half as u128 + 1;
    let mid = side * side / 2;
    let mut window = try_alloc(xs.len() * ys.len(), (0.0f64, 0u128))?;

    Grid::from_fn(grid.width(), grid.height(), |x, y| {
        let (cx, cy) = (x as isize, y as isize);
        let mut n = 0;
        for &(dy, wy) in &ys {
            for &(dx, wx) in &xs {
                window[n] = (grid.at_clamped(cx + dx, cy + dy), wx * wy);
                n += 1;
            }
        }
        window.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        let mut seen = 0u128;
        for &(value, weight) in window.iter() {
            seen += weight;
            if seen > mid {
                return value;
            }
        }
        window[n - 1].0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[f64]]) -> Grid {
        Grid::from_rows(rows.iter().map(|r| r.to_vec()).collect()).expect("grid")
    }

    #[test]
    fn window_of_one_is_identity() {
        let g = grid(&[&[1.0, 5.0, 2.0], &[0.0, 9.0, 3.0]]);
        assert_eq!(median_filter(&g, 1).expect("alloc"), g);
    }

    #[test]
    fn removes_isolated_spike() {
        let g = grid(&[&[1.0, 1.0, 1.0], &[1.0, 50.0, 1.0], &[1.0, 1.0, 1.0]]);
        let out = median_filter(&g, 3).expect("alloc");
        assert!(out.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn edges_replicate_nearest_cell() {
        // Corner (0,0) window with clamping: 4x 0.0 (corner replicated),
        // 2x 1.0 and 2x 2.0 along the edges, 1x 3.0.
        let g = grid(&[&[0.0, 1.0], &[2.0, 3.0]]);
        let out = median_filter(&g, 3).expect("alloc");
        assert_eq!(out.get(0, 0), Some(1.0));
        assert_eq!(out.get(1, 1), Some(2.0));
    }

    #[test]
    fn step_edge_is_a_fixed_point() {
        let g = Grid::from_fn(8, 6, |x, _| if x < 4 { 2.0 } else { 7.0 }).expect("alloc");
        let once = median_filter(&g, 3).expect("alloc");
        let twice = median_filter(&once, 3).expect("alloc");
        assert_eq!(once, g);
        assert_eq!(twice, once);
    }

    fn brute_force(grid: &Grid, size: usize) -> Grid {
        let half = (size / 2) as isize;
        Grid::from_fn(grid.width(), grid.height(), |x, y| {
            let mut window = Vec::new();
            for dy in -half..=half {
                for dx in -half..=half {
                    window.push(grid.at_clamped(x as isize + dx, y as isize + dy));
                }
            }
            window.sort_by(f64::total_cmp);
            window[window.len() / 2]
        })
        .expect("alloc")
    }

    #[test]
    fn window_wider_than_grid_matches_full_window() {
        let g = grid(&[&[9.0, 0.0, 4.0], &[1.0, 7.0, 2.0]]);
        for size in [3, 5, 7, 9, 11] {
            assert_eq!(
                median_filter(&g, size).expect("alloc"),
                brute_force(&g, size),
                "size {size}"
            );
        }
        let column = grid(&[&[3.0], &[8.0], &[1.0], &[5.0]]);
        for size in [5, 9, 13] {
            assert_eq!(
                median_filter(&column, size).expect("alloc"),
                brute_force(&column, size),
                "size {size}"
            );
        }
    }

    #[test]
    fn enormous_window_is_bounded_by_grid() {
        let g = Grid::filled(3, 3, 1.0).expect("grid");
        let out = median_filter(&g, usize::MAX).expect("alloc");
        assert_eq!(out, g);

        // Past a few grid widths the ranking no longer depends on the size.
        let row = grid(&[&[0.0, 5.0, 6.0, 1.0, 2.0]]);
        let out = median_filter(&row, usize::MAX).expect("alloc");
        assert_eq!(out, brute_force(&row, 101));
        assert_eq!(out.as_slice(), &[0.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "median window must be odd")]
    fn even_window_panics() {
        let g = grid(&[&[1.0]]);
        let _ = median_filter(&g, 4);
    }
}
