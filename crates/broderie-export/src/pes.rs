//! Brother PES serializer (embedded PEC block).
//!
//! A minimal PES v1 container: the `#PES0001` magic and a 4-byte
//! little-endian offset to the PEC block, which holds everything a
//! machine needs -- the `LA:` label line, the thread index table and the
//! stitch data.
//!
//! PEC stitch encoding: deltas in `[-64, 63]` use a single 7-bit byte;
//! larger deltas use the 12-bit two's-complement long form with the
//! jump flag in the high bits. `0xFE 0xB0` marks a color change and
//! `0xFF` terminates the stitch section.

use broderie_pipeline::palette::THREAD_PALETTE;
use broderie_pipeline::{StitchPattern, StitchType};

use crate::{limits, ExportError};

/// Long-form delta ceiling (12-bit two's complement).
const MAX_DELTA: i32 = 2047;
/// Jump flag in the long-form first byte.
const FLAG_JUMP: u8 = 0x10;

/// Serialize a machine-coordinate pattern to PES bytes.
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

    let mut out = Vec::new();
    out.extend_from_slice(b"#PES0001");
    // PEC block starts right after the magic and this offset field.
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&((out.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(&pec_block(pattern));
    Ok(out)
}

/// Build the PEC section: label, thread table, stitch data.
fn pec_block(pattern: &StitchPattern) -> Vec<u8> {
    let mut out = Vec::new();

    // "LA:" + 16-character name + carriage return.
    let mut name: String = pattern
        .metadata
        .name
        .chars()
        .filter(char::is_ascii)
        .take(16)
        .collect();
    while name.len() < 16 {
        name.push(' ');
    }
    out.extend_from_slice(b"LA:");
    out.extend_from_slice(name.as_bytes());
    out.push(b'\r');

    out.extend_from_slice(&[0x20; 11]);
    out.extend_from_slice(&[0xFF, 0x00]); // no thumbnail
    out.extend_from_slice(&[0x06, 0x26]); // thumbnail cell dimensions

    let colors = color_runs(pattern);
    #[allow(clippy::cast_possible_truncation)]
    out.push((colors.len() - 1) as u8);
    for color in &colors {
        out.push(thread_index(color));
    }

    out.extend_from_slice(&encode_stitches(pattern));
    out
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

/// Palette index of a thread color (0 when unknown).
#[allow(clippy::cast_possible_truncation)]
fn thread_index(hex: &str) -> u8 {
    THREAD_PALETTE
        .iter()
        .position(|t| t.hex() == hex)
        .map_or(0, |i| i as u8)
}

fn encode_stitches(pattern: &StitchPattern) -> Vec<u8> {
    let units = limits::machine_units(pattern);
    let mut out = Vec::with_capacity(2 * units.len() + 1);

    let mut current_color = pattern.stitches[0].color.clone();
    let (mut cx, mut cy) = (0i32, 0i32);

    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&units) {
        if stitch.color != current_color || stitch.kind == StitchType::Stop {
            out.extend_from_slice(&[0xFE, 0xB0, 0x02]);
            current_color.clone_from(&stitch.color);
        }

        let jump = matches!(stitch.kind, StitchType::Jump | StitchType::Trim);
        for (dx, dy) in limits::split_delta(nx - cx, ny - cy, MAX_DELTA) {
            push_value(&mut out, dx, jump);
            push_value(&mut out, dy, jump);
        }
        cx = nx;
        cy = ny;
    }

    out.push(0xFF);
    out
}

/// Encode one axis delta: 7-bit short form when it fits and the stitch
/// is not a jump, 12-bit long form otherwise.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn push_value(out: &mut Vec<u8>, v: i32, jump: bool) {
    if !jump && (-64..=63).contains(&v) {
        out.push((v & 0x7F) as u8);
    } else {
        let v12 = v & 0x0FFF;
        let mut b0 = 0x80 | ((v12 >> 8) as u8 & 0x0F);
        if jump {
            b0 |= FLAG_JUMP;
        }
        out.push(b0);
        out.push((v12 & 0xFF) as u8);
    }
}
