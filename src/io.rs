use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::error::{LimitError, LimitErrorKind};
use image::{GrayImage, ImageError, Luma};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::canvas::PixelGrid;

/// Glyph ramp for terminal previews, dark → light.
const ASCII_RAMP: &[u8] = b"@%#*+=-:. ";

/// Largest PNG blow-up factor `save_png` accepts.
pub const MAX_UPSCALE: u32 = 64;

fn dimension_limit() -> ImageError {
    ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError))
}

// ============================================================================
// GRID ⇄ IMAGE
// ============================================================================
//
// The brush writes pointer X into the first grid index, so image pixel (x, y)
// is grid[x][y].

/// Grayscale picture of a grid, one image pixel per cell.
pub fn grid_to_image(grid: &PixelGrid) -> GrayImage {
    let dim = grid.dim() as u32;
    GrayImage::from_fn(dim, dim, |x, y| Luma([grid.get(x as usize, y as usize)]))
}

/// Sample an arbitrary picture down (or up) to a `dim × dim` grid.
pub fn image_to_grid(image: &GrayImage, dim: usize) -> Result<PixelGrid, ImageError> {
    let mut grid = PixelGrid::blank(dim).map_err(|_| dimension_limit())?;
    let sized = if image.width() as usize == dim && image.height() as usize == dim {
        image.clone()
    } else {
        imageops::resize(image, dim as u32, dim as u32, FilterType::Triangle)
    };
    for (x, y, px) in sized.enumerate_pixels() {
        grid.set(x as usize, y as usize, px[0]);
    }
    Ok(grid)
}

// ============================================================================
// FILES
// ============================================================================

/// Load a drawing from disk as a `dim × dim` grid. Colour and alpha are
/// reduced to luminance.
pub fn load_grid(path: &Path, dim: usize) -> Result<PixelGrid, ImageError> {
    let image = image::open(path)?.to_luma8();
    image_to_grid(&image, dim)
}

/// Write a grid as a grayscale PNG, each cell blown up to `upscale × upscale`
/// pixels (nearest neighbour). Factors above [`MAX_UPSCALE`] are refused
/// before anything is allocated or written.
pub fn save_png(grid: &PixelGrid, path: &Path, upscale: u32) -> Result<(), ImageError> {
    let mut image = grid_to_image(grid);
    let upscale = upscale.max(1);
    if upscale > MAX_UPSCALE {
        return Err(dimension_limit());
    }
    if upscale > 1 {
        let side = image.width().checked_mul(upscale).ok_or_else(dimension_limit)?;
        image = imageops::resize(&image, side, side, FilterType::Nearest);
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new(&mut writer);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::L8,
    )?;
    log::info!("io: wrote {}x{} PNG to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Text preview, one line per picture row (grid second index).
pub fn render_ascii(grid: &PixelGrid) -> String {
    let dim = grid.dim();
    let last = (ASCII_RAMP.len() - 1) as u32;
    let mut out = String::with_capacity(dim * (dim * 2 + 1));
    for y in 0..dim {
        for x in 0..dim {
            let idx = (grid.get(x, y) as u32 * last + 127) / 255;
            let ch = ASCII_RAMP[idx as usize] as char;
            // Two glyphs per cell keep the aspect roughly square.
            out.push(ch);
            out.push(ch);
        }
        out.push('\n');
    }
    out
}
