//! Intensity grids and boolean masks.
//!
//! Both types are row-major, at least `1 × 1`, and immutable once built.
//! They serialize as nested row arrays (`[[f64, ...], ...]` and
//! `[[bool, ...], ...]`), which is the layout used by scan files and
//! detection reports.

use serde::{Deserialize, Serialize};

/// Reasons a scan cannot be turned into a [`Grid`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("`scan_data` is missing")]
    MissingScanData,
    #[error("`scan_data` is not an array of rows")]
    NotAnArray,
    #[error("row {row} of `scan_data` is not an array")]
    RowNotAnArray { row: usize },
    #[error("value at (x={x}, y={y}) is not a number")]
    NonNumeric { x: usize, y: usize },
    #[error("scan grid is empty")]
    Empty,
    #[error("row {row} has {got} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("value at (x={x}, y={y}) is not finite")]
    NonFinite { x: usize, y: usize },
    #[error("buffer of {got} values does not match {width}x{height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        got: usize,
    },
}

/// A working buffer could not be allocated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("failed to allocate {bytes} bytes")]
pub struct AllocError {
    pub bytes: usize,
}

/// Allocate `len` copies of `value`, reporting allocation failure instead of aborting.
pub fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>, AllocError> {
    let mut buf = reserve::<T>(len)?;
    buf.resize(len, value);
    Ok(buf)
}

fn reserve<T>(len: usize) -> Result<Vec<T>, AllocError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| AllocError {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    Ok(buf)
}

fn check_rows<T>(rows: &[Vec<T>]) -> Result<usize, InputError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return Err(InputError::Empty);
    }
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(InputError::RaggedRows {
                row,
                expected: width,
                got: values.len(),
            });
        }
    }
    Ok(width)
}

/// Rectangular grid of finite intensity values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Grid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Build a grid from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, InputError> {
        let width = check_rows(&rows)?;
        let height = rows.len();
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Self::from_vec(width, height, data)
    }

    /// Build a grid from a row-major buffer.
    pub fn from_vec(width: usize, height: usize, data: Vec<f64>) -> Result<Self, InputError> {
        if width == 0 || height == 0 {
            return Err(InputError::Empty);
        }
        if width.checked_mul(height) != Some(data.len()) {
            return Err(InputError::SizeMismatch {
                width,
                height,
                got: data.len(),
            });
        }
        if let Some(idx) = data.iter().position(|v| !v.is_finite()) {
            return Err(InputError::NonFinite {
                x: idx % width,
                y: idx / width,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Grid of `width × height` cells all set to `value`.
    pub fn filled(width: usize, height: usize, value: f64) -> Result<Self, InputError> {
        let len = width.checked_mul(height).ok_or(InputError::SizeMismatch {
            width,
            height,
            got: 0,
        })?;
        Self::from_vec(width, height, vec![value; len])
    }

    /// Build a grid by evaluating `f(x, y)` for every cell in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `f` yields a non-finite value.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self, AllocError>
    where
        F: FnMut(usize, usize) -> f64,
    {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        let mut data = reserve::<f64>(width.saturating_mul(height))?;
        for y in 0..height {
            for x in 0..width {
                let v = f(x, y);
                assert!(v.is_finite(), "non-finite value at ({x}, {y})");
                data.push(v);
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: grids hold at least one cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major cell values.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Value at `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Value at `(x, y)` with both indices clamped to the nearest valid cell.
    #[inline]
    pub fn at_clamped(&self, x: isize, y: isize) -> f64 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Largest cell value.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.width)
    }

    /// Copy into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for Grid {
    type Error = InputError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<f64>> {
    fn from(grid: Grid) -> Self {
        grid.to_rows()
    }
}

/// Boolean grid, typically the thresholded form of a [`Grid`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<bool>>", into = "Vec<Vec<bool>>")]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl Mask {
    /// Build a mask from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, InputError> {
        let width = check_rows(&rows)?;
        let height = rows.len();
        Ok(Self {
            width,
            height,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Build a mask by evaluating `f(x, y)` for every cell in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self, AllocError>
    where
        F: FnMut(usize, usize) -> bool,
    {
        assert!(width > 0 && height > 0, "mask dimensions must be non-zero");
        let mut data = reserve::<bool>(width.saturating_mul(height))?;
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Value at `(x, y)`, or `None` outside the mask.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// `true` when `(x, y)` is inside the mask and set.
    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.get(x, y).unwrap_or(false)
    }

    /// Number of set cells.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> + '_ {
        self.data.chunks_exact(self.width)
    }

    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.rows().map(<[bool]>::to_vec).collect()
    }
}

impl TryFrom<Vec<Vec<bool>>> for Mask {
    type Error = InputError;

    fn try_from(rows: Vec<Vec<bool>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Mask> for Vec<Vec<bool>> {
    fn from(mask: Mask) -> Self {
        mask.to_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_keeps_row_major_layout() {
        let grid = Grid::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).expect("grid");
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(2, 0), Some(3.0));
        assert_eq!(grid.get(0, 1), Some(4.0));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.get(0, 2), None);
        assert_eq!(grid.max(), 6.0);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(
            err,
            InputError::RaggedRows {
                row: 1,
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn empty_and_non_finite_inputs_are_rejected() {
        assert_eq!(Grid::from_rows(Vec::new()), Err(InputError::Empty));
        assert_eq!(Grid::from_rows(vec![Vec::new()]), Err(InputError::Empty));
        let err = Grid::from_rows(vec![vec![0.0, 1.0], vec![f64::NAN, 0.0]]).unwrap_err();
        assert_eq!(err, InputError::NonFinite { x: 0, y: 1 });
        let err = Grid::from_vec(2, 2, vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, InputError::SizeMismatch { got: 3, .. }));
    }

    #[test]
    fn clamped_access_replicates_edges() {
        let grid = Grid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("grid");
        assert_eq!(grid.at_clamped(-5, -5), 1.0);
        assert_eq!(grid.at_clamped(9, -1), 2.0);
        assert_eq!(grid.at_clamped(-1, 9), 3.0);
        assert_eq!(grid.at_clamped(9, 9), 4.0);
    }

    #[test]
    fn from_fn_evaluates_in_row_major_order() {
        let grid = Grid::from_fn(3, 2, |x, y| (y * 10 + x) as f64).expect("alloc");
        assert_eq!(grid.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn grid_serializes_as_nested_rows() {
        let grid = Grid::from_rows(vec![vec![0.5, 1.0], vec![1.5, 2.0]]).expect("grid");
        let json = serde_json::to_string(&grid).expect("serialize");
        assert_eq!(json, "[[0.5,1.0],[1.5,2.0]]");
        let back: Grid = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, grid);
        assert!(serde_json::from_str::<Grid>("[[1.0],[2.0,3.0]]").is_err());
    }

    #[test]
    fn mask_counts_and_serializes() {
        let mask = Mask::from_fn(3, 2, |x, y| x == y).expect("alloc");
        assert_eq!(mask.count(), 2);
        assert!(mask.is_set(1, 1));
        assert!(!mask.is_set(5, 5));
        let json = serde_json::to_string(&mask).expect("serialize");
        assert_eq!(json, "[[true,false,false],[false,true,false]]");
        let back: Mask = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, mask);
    }

    #[test]
    fn try_alloc_fills_buffer() {
        let buf = try_alloc(4, 7u32).expect("alloc");
        assert_eq!(buf, vec![7, 7, 7, 7]);
    }
}
