use rayon::prelude::*;
use thiserror::Error;

/// Side length of an MNIST-style digit grid.
pub const DEFAULT_DIM: usize = 28;

/// Largest side length a grid may have.
pub const MAX_DIM: usize = 256;

/// Value of an untouched (white) cell.
pub const BLANK: u8 = 255;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("expected {expected} values, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
    #[error("sharpen thresholds out of order (low {low} > high {high})")]
    InvalidThresholds { low: u8, high: u8 },
    #[error("grid side {dim} exceeds the maximum of {max}")]
    TooLarge { dim: usize, max: usize },
}

/// Number of cells in a `dim × dim` grid, refusing sides above [`MAX_DIM`].
fn cell_count(dim: usize) -> Result<usize, GridError> {
    dim.checked_mul(dim)
        .filter(|_| dim <= MAX_DIM)
        .ok_or(GridError::TooLarge { dim, max: MAX_DIM })
}

// ============================================================================
// GRID
// ============================================================================

/// Square `dim × dim` matrix stored contiguously.
///
/// Cell `(i, j)` is `grid[i][j]`: `i` selects the run of `dim` values and `j`
/// the position inside it. The brush drives `i` with the pointer X axis, so a
/// displayed grid holds columns of the picture; see [`crate::io`] for the
/// image mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    dim: usize,
    cells: Vec<T>,
}

/// Displayable grid. `u8` storage keeps every cell inside [0, 255].
pub type PixelGrid = Grid<u8>;

/// Grid of unclamped intensities as received from the generation service.
pub type RawGrid = Grid<f32>;

impl<T: Copy> Grid<T> {
    /// A `dim × dim` grid with every cell set to `value`.
    pub fn filled(dim: usize, value: T) -> Result<Self, GridError> {
        let len = cell_count(dim)?;
        Ok(Self {
            dim,
            cells: vec![value; len],
        })
    }

    /// Wrap an already laid out run of `dim * dim` cells (`grid[i][j]` at
    /// `i * dim + j`).
    pub fn from_cells(dim: usize, cells: Vec<T>) -> Result<Self, GridError> {
        let expected = cell_count(dim)?;
        if cells.len() != expected {
            return Err(GridError::InvalidDimension {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { dim, cells })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.cells[i * self.dim + j]
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        &mut self.cells[i * self.dim + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.cells[i * self.dim + j] = value;
    }

    /// Cells in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// Iterate over the `dim` runs (`grid[0]`, `grid[1]`, ...).
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics; an empty grid has no rows anyway.
        self.cells.chunks(self.dim.max(1))
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    /// Copy with the two indices swapped.
    pub fn transposed(&self) -> Self {
        let dim = self.dim;
        let cells = (0..dim)
            .flat_map(|i| (0..dim).map(move |j| self.get(j, i)))
            .collect();
        Self { dim, cells }
    }
}

impl<T: Copy + Send + Sync> Grid<T> {
    /// Apply `f` to every cell, producing a new grid of the same dimension.
    pub fn map<U, F>(&self, f: F) -> Grid<U>
    where
        U: Copy + Send,
        F: Fn(T) -> U + Sync,
    {
        Grid {
            dim: self.dim,
            cells: self.cells.par_iter().map(|&v| f(v)).collect(),
        }
    }
}

impl PixelGrid {
    /// Fresh white canvas.
    pub fn blank(dim: usize) -> Result<Self, GridError> {
        Self::filled(dim, BLANK)
    }
}

// ============================================================================
// SHARPEN THRESHOLDS
// ============================================================================

/// Pass-through band for the inbound sharpen stage. `low <= high` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharpenThresholds {
    low: u8,
    high: u8,
}

impl SharpenThresholds {
    pub const DEFAULT_LOW: u8 = 100;
    pub const DEFAULT_HIGH: u8 = 220;

    pub fn new(low: u8, high: u8) -> Result<Self, GridError> {
        if low > high {
            return Err(GridError::InvalidThresholds { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }
}

impl Default for SharpenThresholds {
    fn default() -> Self {
        Self {
            low: Self::DEFAULT_LOW,
            high: Self::DEFAULT_HIGH,
        }
    }
}

// ============================================================================
// SESSION STATE
// ============================================================================

/// Everything one drawing session owns: the displayed grid, the sharpen
/// thresholds used by the inbound pipeline, and the two UI-facing busy flags.
#[derive(Debug, Clone)]
pub struct CanvasState {
    pixels: PixelGrid,
    pub thresholds: SharpenThresholds,
    pub(crate) processing: bool,
    pub(crate) fetching: bool,
}

impl CanvasState {
    pub fn new(dim: usize, thresholds: SharpenThresholds) -> Result<Self, GridError> {
        Ok(Self::with_pixels(PixelGrid::blank(dim)?, thresholds))
    }

    fn with_pixels(pixels: PixelGrid, thresholds: SharpenThresholds) -> Self {
        Self {
            pixels,
            thresholds,
            processing: false,
            fetching: false,
        }
    }

    /// Replace the grid with a blank `dim × dim` canvas. An oversized `dim`
    /// leaves the current grid in place.
    pub fn reset(&mut self, dim: usize) -> Result<(), GridError> {
        self.pixels = PixelGrid::blank(dim)?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.pixels.dim()
    }

    pub fn pixels(&self) -> &PixelGrid {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut PixelGrid {
        &mut self.pixels
    }

    /// Swap in a whole new grid. A grid of another dimension is refused and
    /// the current one is kept.
    pub fn replace_pixels(&mut self, grid: PixelGrid) -> Result<(), GridError> {
        if grid.dim() != self.dim() {
            return Err(GridError::InvalidDimension {
                expected: self.dim() * self.dim(),
                actual: grid.dim() * grid.dim(),
            });
        }
        self.pixels = grid;
        Ok(())
    }

    /// True while the inbound pipeline is running.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// True while a request to the digit service is in flight.
    pub fn is_fetching(&self) -> bool {
        self.fetching
    }
}

impl Default for CanvasState {
    fn default() -> Self {
        let pixels = Grid {
            dim: DEFAULT_DIM,
            cells: vec![BLANK; DEFAULT_DIM * DEFAULT_DIM],
        };
        Self::with_pixels(pixels, SharpenThresholds::default())
    }
}
