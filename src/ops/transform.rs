// ============================================================================
// TRANSFORM OPERATIONS — axis swap and flat ⇄ grid layout
// ============================================================================
//
// `reshape` reads a flat vector as consecutive runs (run k → grid[k]), while
// `flatten` walks the grid with the *second* index outermost. The digit
// service consumes exactly this layout. The two are not inverses:
// `reshape(flatten(g)) == rotate(g)`.
// ============================================================================

use crate::canvas::{Grid, GridError};

/// Transpose: `out[i][j] = in[j][i]`. An axis swap, not a visual rotation.
pub fn rotate<T: Copy>(grid: &Grid<T>) -> Grid<T> {
    grid.transposed()
}

/// Split `flat` into `dim` runs of `dim` values, each run becoming `grid[k]`.
pub fn reshape<T: Copy>(flat: &[T], dim: usize) -> Result<Grid<T>, GridError> {
    Grid::from_cells(dim, flat.to_vec())
}

/// Serialize with the second index outermost: emits `grid[j][i]` for
/// `i` in 0..dim, then `j` in 0..dim.
pub fn flatten<T: Copy>(grid: &Grid<T>) -> Vec<T> {
    let dim = grid.dim();
    let mut flat = Vec::with_capacity(dim * dim);
    for i in 0..dim {
        for j in 0..dim {
            flat.push(grid.get(j, i));
        }
    }
    flat
}
