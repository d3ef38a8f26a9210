// ============================================================================
// PIPELINE — fixed transform chains between the canvas and the digit service
// ============================================================================
//
// Outbound:  grid → invert → flatten → JSON array
// Inbound:   flat → reshape → scale → invert → rotate → sharpen → grid
//
// The order of both chains is part of the wire contract. A failing stage
// never reaches the session: the displayed grid is only replaced once the
// whole inbound chain has produced a result.
// ============================================================================

use thiserror::Error;

use crate::canvas::{CanvasState, GridError, PixelGrid, SharpenThresholds};
use crate::ops::adjustments::{invert, scale, sharpen};
use crate::ops::transform::{flatten, reshape, rotate};
use crate::service::{self, DigitService, GenerateMode, ServiceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Failed to encode sample: {0}")]
    Encode(#[from] serde_json::Error),
}

// ----------------------------------------------------------------------------
// Pure chains
// ----------------------------------------------------------------------------

/// Ink-high flat vector for the model: the brush darkens toward 0, the model
/// expects strokes as high values.
pub fn outbound(grid: &PixelGrid) -> Vec<u8> {
    flatten(&invert(grid))
}

pub fn serialize_flat(flat: &[u8]) -> Result<String, serde_json::Error> {
    serde_json::to_string(flat)
}

/// Displayable grid from a generated flat vector.
pub fn inbound(flat: &[f32], dim: usize, thresholds: SharpenThresholds) -> Result<PixelGrid, GridError> {
    let raw = reshape(flat, dim)?;
    let scaled = scale(&raw);
    let inverted = invert(&scaled);
    let rotated = rotate(&inverted);
    Ok(sharpen(&rotated, thresholds.high(), thresholds.low()))
}

// ----------------------------------------------------------------------------
// Session entry points
// ----------------------------------------------------------------------------

/// Serialized outbound payload for the session's current grid.
pub fn pixels_to_payload(state: &CanvasState) -> Result<String, PipelineError> {
    let flat = outbound(state.pixels());
    service::validate_sample(&flat, state.dim())?;
    Ok(serialize_flat(&flat)?)
}

/// Run the inbound chain and publish the result as the displayed grid.
/// On failure the current grid stays as it was.
pub fn apply_generated(state: &mut CanvasState, flat: &[f32]) -> Result<(), GridError> {
    state.processing = true;
    let result = inbound(flat, state.dim(), state.thresholds);
    state.processing = false;

    let grid = result.inspect_err(|e| log::warn!("pipeline: generated sample rejected: {}", e))?;
    state.replace_pixels(grid)
}

/// Ask the service what digit the session's grid shows.
pub fn request_prediction(state: &mut CanvasState, service: &dyn DigitService) -> Result<u8, PipelineError> {
    let payload = pixels_to_payload(state)?;

    state.fetching = true;
    let result = service.predict(&payload);
    state.fetching = false;

    let digit = result?;
    log::info!("pipeline: predicted {}", digit);
    Ok(digit)
}

/// Fetch a generated `label` and display it.
pub fn request_generated(
    state: &mut CanvasState,
    service: &dyn DigitService,
    label: i64,
    mode: GenerateMode,
) -> Result<(), PipelineError> {
    let label = service::validate_label(label)?;

    state.fetching = true;
    let result = service.generate(label, mode);
    state.fetching = false;

    let flat = result?;
    apply_generated(state, &flat)?;
    log::info!("pipeline: displayed generated {} ({})", label, mode.label());
    Ok(())
}
