//! Tajima DST serializer -- the reference format writer.
//!
//! A DST file is a 512-byte ASCII header followed by 3-byte stitch
//! records. Each record packs a delta movement in 0.1 mm units plus
//! control bits; the file is framed by a leading `(0, 0)` jump and a
//! trailing `(0, 0)` end record.
//!
//! The nibble packing used here OR-combines the high nibbles of `|dx|`
//! and `|dy|` into the same bits of the third byte. This diverges from
//! the canonical Tajima bit layout (which keeps per-axis bits separate)
//! but is preserved deliberately: files produced by this writer must be
//! byte-identical to the deployed encoder. Deltas with both axes under
//! 16 units are unaffected.

use broderie_pipeline::{StitchPattern, StitchType};
use log::debug;

use crate::ExportError;

/// Machine units per millimeter.
pub const PPMM: f64 = 10.0;
/// Maximum delta per stitch record, in 0.1 mm units.
pub const MAX_STITCH: i32 = 121;
/// Maximum delta per jump record, in 0.1 mm units.
pub const MAX_JUMP: i32 = 121;
/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 512;
/// Maximum stitch count the format accepts.
pub const MAX_STITCHES: usize = 999_999;
/// Maximum hoop dimension in millimeters.
pub const MAX_DIMENSION_MM: f64 = 400.0;

/// Control bit patterns OR'd into the third record byte.
const CONTROL_NORMAL: u8 = 0x03;
const CONTROL_JUMP: u8 = 0x83;
const CONTROL_STOP: u8 = 0xC3;
const CONTROL_END: u8 = 0xF3;

/// Serialize a pattern (in source millimeters) to DST bytes.
///
/// Coordinates are normalized internally: the pattern's minimum x/y
/// become the origin and positions are rounded to 0.1 mm units. Deltas
/// larger than [`MAX_STITCH`] are decomposed into equal jump segments.
///
/// # Errors
///
/// - [`ExportError::InvalidInput`] for an empty stitch list or
///   non-positive dimensions.
/// - [`ExportError::InvalidCoordinates`] for non-finite coordinates.
/// - [`ExportError::FormatLimit`] when the stitch count, a dimension,
///   or the rendered header exceeds the format's ceiling.
pub fn write(pattern: &StitchPattern) -> Result<Vec<u8>, ExportError> {
    if pattern.stitches.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no stitches".to_owned(),
        ));
    }
    if pattern.stitches.len() > MAX_STITCHES {
        return Err(ExportError::FormatLimit(format!(
            "{} stitches exceed the DST maximum of {MAX_STITCHES}",
            pattern.stitches.len(),
        )));
    }
    if !pattern.coordinates_finite() {
        return Err(ExportError::InvalidCoordinates(
            "pattern contains a non-finite stitch coordinate".to_owned(),
        ));
    }
    let dims = pattern.dimensions;
    if !(dims.width.is_finite() && dims.height.is_finite())
        || dims.width <= 0.0
        || dims.height <= 0.0
    {
        return Err(ExportError::InvalidInput(format!(
            "pattern dimensions are invalid ({} x {})",
            dims.width, dims.height,
        )));
    }
    if dims.width > MAX_DIMENSION_MM || dims.height > MAX_DIMENSION_MM {
        return Err(ExportError::FormatLimit(format!(
            "{} x {} mm exceeds the DST hoop maximum of {MAX_DIMENSION_MM} mm",
            dims.width, dims.height,
        )));
    }

    let Some((min_x, min_y, max_x, max_y)) = pattern.bounds() else {
        return Err(ExportError::Encoding {
            format: "dst",
            message: "bounding box of a non-empty pattern was empty".to_owned(),
        });
    };

    // Normalize to non-negative integer machine units.
    #[allow(clippy::cast_possible_truncation)]
    let coords: Vec<(i32, i32)> = pattern
        .stitches
        .iter()
        .map(|s| {
            (
                ((s.position.x - min_x) * PPMM).round() as i32,
                ((s.position.y - min_y) * PPMM).round() as i32,
            )
        })
        .collect();

    // Encode the body first so the header can carry the record count.
    let mut body = Vec::with_capacity(3 * (coords.len() + 2));
    push_record(&mut body, 0, 0, CONTROL_JUMP);

    let (mut cx, mut cy) = (0i32, 0i32);
    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&coords) {
        let dx = nx - cx;
        let dy = ny - cy;
        if dx.abs() > MAX_STITCH || dy.abs() > MAX_JUMP {
            for (sdx, sdy) in split_movement(dx, dy) {
                push_record(&mut body, sdx, sdy, CONTROL_JUMP);
            }
        } else {
            push_record(&mut body, dx, dy, control_bits(stitch.kind));
        }
        cx = nx;
        cy = ny;
    }
    push_record(&mut body, 0, 0, CONTROL_END);

    let records = body.len() / 3;
    debug!("dst: {} stitches encoded into {records} records", pattern.stitches.len());

    // Header: CRLF-terminated key:value lines, zero-padded to 512
    // bytes. ST excludes the trailing end record.
    #[allow(clippy::cast_possible_truncation)]
    let max_units_x = ((max_x - min_x) * PPMM).round() as i64;
    #[allow(clippy::cast_possible_truncation)]
    let max_units_y = ((max_y - min_y) * PPMM).round() as i64;
    let header_text = format!(
        "LA:Design Studio\r\n\
         ST:{}\r\n\
         CO:1\r\n\
         +X:{max_units_x}\r\n\
         -X:0\r\n\
         +Y:{max_units_y}\r\n\
         -Y:0\r\n\
         AX:+0\r\n\
         AY:+0\r\n\
         MX:+0\r\n\
         MY:+0\r\n\
         PD:******\r\n",
        records - 1,
    );
    if header_text.len() > HEADER_SIZE {
        return Err(ExportError::FormatLimit(format!(
            "DST header is {} bytes, exceeding the {HEADER_SIZE}-byte slot",
            header_text.len(),
        )));
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(header_text.as_bytes());
    out.resize(HEADER_SIZE, 0x00);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Control bits for a stitch kind. Trim carries no code of its own in
/// DST and is encoded as a jump.
const fn control_bits(kind: StitchType) -> u8 {
    match kind {
        StitchType::Normal => CONTROL_NORMAL,
        StitchType::Jump | StitchType::Trim => CONTROL_JUMP,
        StitchType::Stop => CONTROL_STOP,
        StitchType::End => CONTROL_END,
    }
}

/// Append one 3-byte record for the given delta and control bits.
fn push_record(body: &mut Vec<u8>, dx: i32, dy: i32, control: u8) {
    body.extend_from_slice(&encode_record(dx, dy, control));
}

/// Encode a delta movement into the 3-byte record layout.
///
/// Deltas are clamped to `±MAX_STITCH`. See the module docs for the
/// high-nibble packing caveat.
#[allow(clippy::cast_possible_truncation)]
fn encode_record(dx: i32, dy: i32, control: u8) -> [u8; 3] {
    let dx = dx.clamp(-MAX_STITCH, MAX_STITCH);
    let dy = dy.clamp(-MAX_STITCH, MAX_STITCH);
    let x = dx.unsigned_abs() as u8;
    let y = dy.unsigned_abs() as u8;

    let b0 = y & 0x0F;
    let b1 = x & 0x0F;
    let mut b2 = ((y & 0xF0) >> 4) | ((x & 0xF0) >> 4);
    if dx < 0 {
        b2 |= 0x20;
    }
    if dy < 0 {
        b2 |= 0x40;
    }
    b2 |= control;

    [b0, b1, b2]
}

/// Decompose a large movement into equal jump deltas, each within
/// `±MAX_JUMP`.
fn split_movement(dx: i32, dy: i32) -> Vec<(i32, i32)> {
    let steps = div_ceil_abs(dx, MAX_JUMP).max(div_ceil_abs(dy, MAX_JUMP)).max(1);

    let mut deltas = Vec::with_capacity(steps as usize);
    #[allow(clippy::cast_possible_truncation)]
    for i in 0..steps {
        let sub = |total: i32| -> i32 {
            let next = (f64::from(total) * f64::from(i + 1) / f64::from(steps)).round();
            let prev = (f64::from(total) * f64::from(i) / f64::from(steps)).round();
            (next - prev) as i32
        };
        deltas.push((sub(dx), sub(dy)));
    }
    deltas
}

/// `ceil(|value| / divisor)` for positive divisors.
const fn div_ceil_abs(value: i32, divisor: i32) -> i32 {
    (value.abs() + divisor - 1) / divisor
}
