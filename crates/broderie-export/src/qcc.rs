//! Quilting QCC serializer.
//!
//! A chunked variant of the absolute stitch-list layout: a little-endian
//! total count, then runs of at most [`CHUNK_POINTS`] coordinate pairs,
//! each prefixed by its own 16-bit length, closed by an `0xFFFF`
//! sentinel.

use broderie_pipeline::StitchPattern;

use crate::{limits, ExportError};

/// Maximum points per chunk.
pub const CHUNK_POINTS: usize = 512;

/// Chunk-list terminator.
const SENTINEL: u16 = 0xFFFF;

/// Serialize a machine-coordinate pattern to QCC bytes.
///
/// # Errors
///
/// - [`ExportError::InvalidInput`] for an empty pattern.
/// - [`ExportError::Encoding`] when a coordinate does not fit the
///   16-bit field.
pub fn write(pattern: &StitchPattern) -> Result<Vec<u8>, ExportError> {
    if pattern.stitches.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no stitches".to_owned(),
        ));
    }

    let units = limits::machine_units(pattern);
    let mut out = Vec::with_capacity(4 + 4 * units.len() + 2 * units.len().div_ceil(CHUNK_POINTS));
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(units.len() as u32).to_le_bytes());

    for chunk in units.chunks(CHUNK_POINTS) {
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        for &(x, y) in chunk {
            let x = coordinate(x)?;
            let y = coordinate(y)?;
            out.extend_from_slice(&x.to_le_bytes());
            out.extend_from_slice(&y.to_le_bytes());
        }
    }

    out.extend_from_slice(&SENTINEL.to_le_bytes());
    Ok(out)
}

fn coordinate(v: i32) -> Result<u16, ExportError> {
    u16::try_from(v).map_err(|_| ExportError::Encoding {
        format: "qcc",
        message: format!("coordinate {v} does not fit a 16-bit field"),
    })
}
