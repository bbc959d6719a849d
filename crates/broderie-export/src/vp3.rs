//! Pfaff VP3 serializer.
//!
//! Big-endian layout: the `%vsm%` magic, a length-prefixed producer
//! string, signed 16-bit extents, a stitch count, then one stitch block
//! of byte deltas with `0x80` escapes -- `0x80 0x01` prefixes a 16-bit
//! jump, `0x80 0x05` a color change and `0x80 0x00` ends the block.

use broderie_pipeline::{StitchPattern, StitchType};

use crate::{limits, ExportError};

/// Producer tag embedded in the file.
const PRODUCER: &str = "broderie";
/// Maximum delta per 1-byte record.
const MAX_DELTA: i32 = 127;

/// Serialize a machine-coordinate pattern to VP3 bytes.
///
/// # Errors
///
/// Returns [`ExportError::InvalidInput`] for an empty pattern.
pub fn write(pattern: &StitchPattern) -> Result<Vec<u8>, ExportError> {
    if pattern.stitches.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no stitches".to_owned(),
        ));
    }

    let units = limits::machine_units(pattern);
    let (max_x, max_y) = units
        .iter()
        .fold((0i32, 0i32), |(mx, my), &(x, y)| (mx.max(x), my.max(y)));

    let mut out = Vec::new();
    out.extend_from_slice(b"%vsm%");
    out.push(0x00);

    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(PRODUCER.len() as u16).to_be_bytes());
    out.extend_from_slice(PRODUCER.as_bytes());

    #[allow(clippy::cast_possible_truncation)]
    for extent in [0i32, 0, max_x, max_y] {
        out.extend_from_slice(&(extent as i16).to_be_bytes());
    }
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(pattern.stitches.len() as u32).to_be_bytes());

    let mut current_color = pattern.stitches[0].color.clone();
    let (mut cx, mut cy) = (0i32, 0i32);

    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&units) {
        if stitch.color != current_color || stitch.kind == StitchType::Stop {
            out.extend_from_slice(&[0x80, 0x05]);
            current_color.clone_from(&stitch.color);
        }

        let (dx, dy) = (nx - cx, ny - cy);
        if matches!(stitch.kind, StitchType::Jump | StitchType::Trim) {
            out.extend_from_slice(&[0x80, 0x01]);
            #[allow(clippy::cast_possible_truncation)]
            out.extend_from_slice(&(dx as i16).to_be_bytes());
            #[allow(clippy::cast_possible_truncation)]
            out.extend_from_slice(&(dy as i16).to_be_bytes());
        } else {
            for (sx, sy) in limits::split_delta(dx, dy, MAX_DELTA) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                out.extend_from_slice(&[sx as i8 as u8, sy as i8 as u8]);
            }
        }
        cx = nx;
        cy = ny;
    }

    out.extend_from_slice(&[0x80, 0x00]);
    Ok(out)
}
