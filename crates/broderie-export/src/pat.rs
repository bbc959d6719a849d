//! Gammill quilting PAT serializer.
//!
//! Quilting machines run a single continuous path, so the layout is an
//! absolute stitch list: a little-endian point count followed by one
//! unsigned 16-bit coordinate pair per stitch in machine units.

use broderie_pipeline::StitchPattern;

use crate::{limits, ExportError};

/// Serialize a machine-coordinate pattern to PAT bytes.
///
/// # Errors
///
/// - [`ExportError::InvalidInput`] for an empty pattern.
/// - [`ExportError::Encoding`] when a coordinate does not fit the
///   16-bit field (the dimension ceiling normally prevents this).
pub fn write(pattern: &StitchPattern) -> Result<Vec<u8>, ExportError> {
    if pattern.stitches.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no stitches".to_owned(),
        ));
    }

    let units = limits::machine_units(pattern);
    let mut out = Vec::with_capacity(4 + 4 * units.len());
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(units.len() as u32).to_le_bytes());

    for &(x, y) in &units {
        let x = coordinate(x)?;
        let y = coordinate(y)?;
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    Ok(out)
}

fn coordinate(v: i32) -> Result<u16, ExportError> {
    u16::try_from(v).map_err(|_| ExportError::Encoding {
        format: "pat",
        message: format!("coordinate {v} does not fit a 16-bit field"),
    })
}
