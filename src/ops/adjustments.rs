// ============================================================================
// ADJUSTMENT OPERATIONS — per-cell intensity transforms
// ============================================================================
//
// Pure functions: each returns a new grid and never touches its input.
// Cells are mapped in parallel via rayon (see `Grid::map`).
// ============================================================================

use crate::canvas::{PixelGrid, RawGrid};

/// Invert every cell: `v → 255 - v`.
pub fn invert(grid: &PixelGrid) -> PixelGrid {
    grid.map(|v| 255 - v)
}

/// Bring raw intensities into displayable range: clamp to [0, 255], then round.
/// NaN cells become 0.
pub fn scale(grid: &RawGrid) -> PixelGrid {
    grid.map(scale_value)
}

#[inline]
fn scale_value(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(0.0, 255.0).round() as u8
}

/// Threshold posterize with a pass-through band.
///
/// Cells above `top` become 255, cells below `bottom` become 0, everything in
/// `bottom..=top` is left as is.
pub fn sharpen(grid: &PixelGrid, top: u8, bottom: u8) -> PixelGrid {
    grid.map(|v| {
        if v > top {
            255
        } else if v < bottom {
            0
        } else {
            v
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Grid;

    fn gradient(dim: usize) -> PixelGrid {
        let cells = (0..dim * dim).map(|k| (k * 7 % 256) as u8).collect();
        Grid::from_cells(dim, cells).unwrap()
    }

    #[test]
    fn invert_maps_each_cell() {
        let grid = Grid::from_cells(2, vec![0u8, 255, 128, 20]).unwrap();
        assert_eq!(invert(&grid).as_slice(), &[255, 0, 127, 235]);
    }

    #[test]
    fn double_invert_is_identity() {
        let grid = gradient(28);
        assert_eq!(invert(&invert(&grid)), grid);
    }

    #[test]
    fn scale_clamps_and_rounds() {
        let raw = Grid::from_cells(3, vec![-4.0, 0.49, 0.5, 127.5, 254.6, 255.0, 300.0, f32::NAN, f32::INFINITY])
            .unwrap();
        assert_eq!(scale(&raw).as_slice(), &[0, 0, 1, 128, 255, 255, 255, 0, 255]);
    }

    #[test]
    fn sharpen_has_pass_through_band() {
        let grid = Grid::from_cells(2, vec![99u8, 100, 220, 221]).unwrap();
        assert_eq!(sharpen(&grid, 220, 100).as_slice(), &[0, 100, 220, 255]);
    }

    #[test]
    fn sharpen_only_produces_extremes_or_original() {
        let grid = gradient(28);
        let (high, low) = (180, 60);
        let out = sharpen(&grid, high, low);
        for (&before, &after) in grid.as_slice().iter().zip(out.as_slice()) {
            assert!(after == 0 || after == 255 || after == before);
            assert_eq!(after == 255, before > high);
            assert_eq!(after == 0, before < low);
        }
    }
}
