//! Husqvarna/Viking HUS serializer.
//!
//! Little-endian header (magic, record and color counts, extents, three
//! section offsets), a needle table, then three parallel sections: one
//! attribute byte, one X delta byte and one Y delta byte per record.
//!
//! Production HUS files compress the three sections; this writer emits
//! them uncompressed, which the common readers accept when the section
//! offsets are consistent.

use broderie_pipeline::palette::THREAD_PALETTE;
use broderie_pipeline::{StitchPattern, StitchType};

use crate::{limits, ExportError};

/// File magic.
pub const MAGIC: u32 = 0x005B_FC5B;

/// Maximum delta per record.
const MAX_DELTA: i32 = 127;

/// Per-record attribute codes.
const ATTR_STITCH: u8 = 0x80;
const ATTR_JUMP: u8 = 0x81;
const ATTR_COLOR_CHANGE: u8 = 0x84;
const ATTR_END: u8 = 0x90;

/// Serialize a machine-coordinate pattern to HUS bytes.
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

    let records = build_records(pattern);
    let colors = color_runs(pattern);

    let units = limits::machine_units(pattern);
    let (max_x, max_y) = units
        .iter()
        .fold((0i32, 0i32), |(mx, my), &(x, y)| (mx.max(x), my.max(y)));

    // magic(4) + records(4) + colors(4) + extents(8) + offsets(12) +
    // pad(2) + 2 bytes per needle entry.
    #[allow(clippy::cast_possible_truncation)]
    let header_len = (34 + 2 * colors.len()) as u32;
    let attribute_offset = header_len;
    let x_offset = attribute_offset + records.len() as u32;
    let y_offset = x_offset + records.len() as u32;

    let mut out = Vec::with_capacity(y_offset as usize + records.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(colors.len() as u32).to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    for extent in [max_x, max_y, 0, 0] {
        out.extend_from_slice(&(extent as i16).to_le_bytes());
    }
    out.extend_from_slice(&attribute_offset.to_le_bytes());
    out.extend_from_slice(&x_offset.to_le_bytes());
    out.extend_from_slice(&y_offset.to_le_bytes());
    out.extend_from_slice(&[0x00, 0x00]);
    for color in &colors {
        out.extend_from_slice(&needle_code(color).to_le_bytes());
    }

    debug_assert_eq!(out.len(), attribute_offset as usize);
    out.extend(records.iter().map(|r| r.0));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    out.extend(records.iter().map(|r| r.1 as i8 as u8));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    out.extend(records.iter().map(|r| r.2 as i8 as u8));
    Ok(out)
}

/// Expand stitches into `(attribute, dx, dy)` records with large moves
/// split and an end record appended.
fn build_records(pattern: &StitchPattern) -> Vec<(u8, i32, i32)> {
    let units = limits::machine_units(pattern);
    let mut records = Vec::with_capacity(units.len() + 1);

    let mut current_color = pattern.stitches[0].color.clone();
    let (mut cx, mut cy) = (0i32, 0i32);

    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&units) {
        if stitch.color != current_color || stitch.kind == StitchType::Stop {
            records.push((ATTR_COLOR_CHANGE, 0, 0));
            current_color.clone_from(&stitch.color);
        }

        let attr = if matches!(stitch.kind, StitchType::Jump | StitchType::Trim) {
            ATTR_JUMP
        } else {
            ATTR_STITCH
        };
        for (dx, dy) in limits::split_delta(nx - cx, ny - cy, MAX_DELTA) {
            records.push((attr, dx, dy));
        }
        cx = nx;
        cy = ny;
    }

    records.push((ATTR_END, 0, 0));
    records
}

/// Distinct stitch colors in run order.
fn color_runs(pattern: &StitchPattern) -> Vec<String> {
    let mut colors: Vec<String> = Vec::new();
    for stitch in &pattern.stitches {
        if colors.last() != Some(&stitch.color) && !colors.contains(&stitch.color) {
            colors.push(stitch.color.clone());
        }
    }
    colors
}

/// Needle code for a thread color: its palette position (0 when
/// unknown).
#[allow(clippy::cast_possible_truncation)]
fn needle_code(hex: &str) -> u16 {
    THREAD_PALETTE
        .iter()
        .position(|t| t.hex() == hex)
        .map_or(0, |i| i as u16)
}
