//! broderie-pipeline: Pure raster-to-embroidery conversion (sans-IO).
//!
//! Converts RGBA pixel buffers into machine-embroidery stitch patterns
//! through: palette quantization -> bitmap normalization -> Sobel edge
//! detection -> contour tracing -> stitch planning -> optimization.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and returns structured data. Serializing patterns into
//! machine file formats lives in `broderie-export`.

pub mod bitmap;
pub mod canvas;
pub mod contour;
pub mod edges;
pub mod optimize;
pub mod palette;
pub mod pipeline;
pub mod planner;
pub mod quantize;
pub mod settings;
pub mod types;

pub use contour::{ContourTracer, ContourTracerKind};
pub use palette::{ThreadColor, GRAYSCALE_ENTRIES, THREAD_PALETTE};
pub use pipeline::{Converter, Pending, Stage, MIN_STITCHES, STAGE_COUNT, STAGE_NAMES};
pub use types::{
    ColorMode, GrayImage, PatternDimensions, PatternMetadata, PipelineError, Point, Polyline,
    ProcessingSettings, RgbaImage, StitchPattern, StitchPoint, StitchType,
};

/// Convert an RGBA image into a stitch pattern with default reporting.
///
/// This is a convenience wrapper around [`Converter::convert`] with no
/// progress callback or cancellation flag attached.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] for empty or undersized
/// images, the edge-density errors from detection, and
/// [`PipelineError::InsufficientStitches`] when the result is too small
/// to run on a machine.
pub fn convert(
    image: &RgbaImage,
    settings: &ProcessingSettings,
) -> Result<StitchPattern, PipelineError> {
    Converter::new().convert(image, settings)
}
