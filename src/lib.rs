//! DigitPad: draw a digit on a small grid, ask a remote model what it is, and
//! display digits the model generates.
//!
//! The core is the grid transform pipeline:
//!
//! - [`canvas`] owns the session grid and its flags,
//! - [`ops::brush`] turns pointer samples into darkened cells,
//! - [`ops::adjustments`] and [`ops::transform`] are the pure per-grid
//!   transforms,
//! - [`ops::pipeline`] chains them for the outbound (grid → JSON) and inbound
//!   (generated vector → grid) directions,
//! - [`service`] is the request/response boundary to the model.

pub mod canvas;
pub mod cli;
pub mod io;
pub mod logger;
pub mod ops;
pub mod service;
pub mod settings;

pub use canvas::{CanvasState, Grid, GridError, PixelGrid, RawGrid, SharpenThresholds};
pub use ops::adjustments::{invert, scale, sharpen};
pub use ops::brush::{BrushStroke, StrokePoint, draw};
pub use ops::pipeline::{PipelineError, apply_generated, inbound, outbound, pixels_to_payload, request_generated, request_prediction};
pub use ops::transform::{flatten, reshape, rotate};
pub use service::{DigitService, GenerateMode, HttpDigitService, ServiceError};
pub use settings::AppSettings;
