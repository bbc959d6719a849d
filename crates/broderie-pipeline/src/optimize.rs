//! Stitch sequence cleanup: drop redundant stitches without disturbing
//! the planned geometry.
//!
//! Two reductions are applied in a single pass: consecutive penetrating
//! stitches at the same coordinate collapse to one, and runs of
//! consecutive jumps collapse to a single jump at the run's final
//! destination. The first and last positions of the sequence are always
//! preserved.

use log::debug;

use crate::types::{PipelineError, StitchPoint, StitchType};

/// Coordinates closer than this (in millimeters) count as the same
/// needle position.
pub const DUPLICATE_EPSILON: f64 = 1e-6;

/// Remove redundant stitches from a planned sequence.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidCoordinates`] when any stitch has a
/// NaN or infinite coordinate.
pub fn optimize_stitches(stitches: Vec<StitchPoint>) -> Result<Vec<StitchPoint>, PipelineError> {
    if let Some(bad) = stitches.iter().position(|s| !s.position.is_finite()) {
        return Err(PipelineError::InvalidCoordinates(format!(
            "stitch {bad} has a non-finite coordinate",
        )));
    }

    let before = stitches.len();
    let mut result: Vec<StitchPoint> = Vec::with_capacity(before);

    for stitch in stitches {
        let len = result.len();
        match result.last_mut() {
            Some(prev)
                if prev.kind == StitchType::Normal
                    && stitch.kind == StitchType::Normal
                    && prev.position.distance(stitch.position) < DUPLICATE_EPSILON =>
            {
                // Duplicate penetration at the same spot.
            }
            // Extend a jump run to its final destination. The very
            // first stitch is never overwritten so the sequence's
            // opening position survives optimization.
            Some(prev)
                if len > 1 && prev.kind == StitchType::Jump && stitch.kind == StitchType::Jump =>
            {
                *prev = stitch;
            }
            _ => result.push(stitch),
        }
    }

    debug!("optimized {before} stitches down to {}", result.len());
    Ok(result)
}
