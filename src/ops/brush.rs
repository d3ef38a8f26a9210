// ============================================================================
// BRUSH ENGINE — pointer position → darkened grid cells
// ============================================================================
//
// The canvas is `canvas_width` units wide and covers `dim` cells, so each cell
// is `canvas_width / dim` units. A dab darkens every cell whose index lies in
// the bounding range of the brush disc by one fixed step, saturating at 0.
// ============================================================================

use serde::Deserialize;

use crate::canvas::PixelGrid;

/// Amount subtracted from a cell per dab.
pub const BRUSH_STEP: u8 = 20;

/// One pointer sample with the brush and canvas geometry it was taken under.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushStroke {
    pub x: f32,
    pub y: f32,
    pub diameter: f32,
    pub canvas_width: f32,
}

impl BrushStroke {
    pub fn apply(&self, grid: &mut PixelGrid) {
        draw(grid, self.x, self.y, self.diameter, self.canvas_width);
    }
}

/// A pointer position as stored in a stroke file.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
}

/// Darken the cells under a brush dab centred on `(mx, my)`.
///
/// `mx` drives the first grid index and `my` the second. The index range is
/// inclusive on both ends and may overshoot the grid by one cell; those cells
/// are skipped.
pub fn draw(grid: &mut PixelGrid, mx: f32, my: f32, diameter: f32, canvas_width: f32) {
    let n = grid.dim() as i64;
    if n == 0 || !(canvas_width.is_finite() && canvas_width > 0.0) {
        return;
    }
    let cell_size = canvas_width / n as f32;
    let r = diameter / 2.0;

    let start_x = (((mx - r) / cell_size).floor() as i64).max(0);
    let end_x = (((mx + r) / cell_size).ceil() as i64).min(n);
    let start_y = (((my - r) / cell_size).floor() as i64).max(0);
    let end_y = (((my + r) / cell_size).ceil() as i64).min(n);

    for i in start_x..=end_x {
        for j in start_y..=end_y {
            if i < 0 || i >= n || j < 0 || j >= n {
                continue;
            }
            let cell = grid.get_mut(i as usize, j as usize);
            *cell = cell.saturating_sub(BRUSH_STEP);
        }
    }
}

/// Replay a recorded path, one dab per point, in order.
pub fn draw_path(grid: &mut PixelGrid, points: &[StrokePoint], diameter: f32, canvas_width: f32) {
    for p in points {
        draw(grid, p.x, p.y, diameter, canvas_width);
    }
    log::debug!("brush: replayed {} points (d={}, w={})", points.len(), diameter, canvas_width);
}
