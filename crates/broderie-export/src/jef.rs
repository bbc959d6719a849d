//! Janome JEF serializer.
//!
//! Little-endian header (stitch-block offset, version, creation date,
//! color and stitch counts, hoop code), a thread index table, then
//! 2-byte deltas with `0x80`-escaped function codes: `0x80 0x02` jump,
//! `0x80 0x01` color change, `0x80 0x10` end.

use broderie_pipeline::palette::THREAD_PALETTE;
use broderie_pipeline::{StitchPattern, StitchType};

use crate::{limits, ExportError};

/// Maximum delta per record.
const MAX_DELTA: i32 = 127;

/// Hoop selection codes, by hoop size.
const HOOP_110X110: i32 = 0;
const HOOP_50X50: i32 = 1;
const HOOP_140X200: i32 = 2;
const HOOP_200X200: i32 = 4;

/// Serialize a machine-coordinate pattern to JEF bytes.
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

    let colors = stitch_color_sequence(pattern);
    let stitch_block = encode_stitches(pattern);

    // offset(4) + version(4) + date(14) + pad(2) + colors(4) +
    // stitches(4) + hoop(4) + 4 bytes per thread index.
    #[allow(clippy::cast_possible_truncation)]
    let offset = (36 + 4 * colors.len()) as u32;

    let mut out = Vec::with_capacity(offset as usize + stitch_block.len());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(date_field(&pattern.metadata.date).as_bytes());
    out.extend_from_slice(&[0x00, 0x00]);
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(colors.len() as i32).to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(pattern.stitches.len() as i32).to_le_bytes());
    out.extend_from_slice(&hoop_code(pattern).to_le_bytes());
    for color in &colors {
        out.extend_from_slice(&thread_index(color).to_le_bytes());
    }

    debug_assert_eq!(out.len(), offset as usize);
    out.extend_from_slice(&stitch_block);
    Ok(out)
}

/// Distinct stitch colors in run order.
fn stitch_color_sequence(pattern: &StitchPattern) -> Vec<String> {
    let mut colors: Vec<String> = Vec::new();
    for stitch in &pattern.stitches {
        if colors.last() != Some(&stitch.color) && !colors.contains(&stitch.color) {
            colors.push(stitch.color.clone());
        }
    }
    colors
}

/// `YYYYMMDDHHMMSS` from the pattern's ISO-8601 date, epoch on parse
/// failure.
fn date_field(iso: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(iso)
        .map(|d| d.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|_| "19700101000000".to_owned())
}

/// Pick the smallest hoop the pattern dimensions (0.1 mm units) fit.
fn hoop_code(pattern: &StitchPattern) -> i32 {
    let w = pattern.dimensions.width / 10.0;
    let h = pattern.dimensions.height / 10.0;
    if w <= 50.0 && h <= 50.0 {
        HOOP_50X50
    } else if w <= 110.0 && h <= 110.0 {
        HOOP_110X110
    } else if w <= 140.0 && h <= 200.0 {
        HOOP_140X200
    } else {
        HOOP_200X200
    }
}

/// 1-based palette index of a thread color (0 when unknown).
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn thread_index(hex: &str) -> u32 {
    THREAD_PALETTE
        .iter()
        .position(|t| t.hex() == hex)
        .map_or(0, |i| i as u32 + 1)
}

fn encode_stitches(pattern: &StitchPattern) -> Vec<u8> {
    let units = limits::machine_units(pattern);
    let mut out = Vec::with_capacity(2 * units.len() + 2);

    let mut current_color = pattern.stitches[0].color.clone();
    let (mut cx, mut cy) = (0i32, 0i32);

    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&units) {
        if stitch.color != current_color || stitch.kind == StitchType::Stop {
            out.extend_from_slice(&[0x80, 0x01]);
            current_color.clone_from(&stitch.color);
        }

        let travels = matches!(stitch.kind, StitchType::Jump | StitchType::Trim);
        for (dx, dy) in limits::split_delta(nx - cx, ny - cy, MAX_DELTA) {
            if travels {
                out.extend_from_slice(&[0x80, 0x02]);
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            out.extend_from_slice(&[dx as i8 as u8, dy as i8 as u8]);
        }
        cx = nx;
        cy = ny;
    }

    out.extend_from_slice(&[0x80, 0x10]);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use broderie_pipeline::{PatternDimensions, PatternMetadata, Point, StitchPoint};

    use super::*;

    fn pattern(stitches: Vec<StitchPoint>) -> StitchPattern {
        StitchPattern {
            stitches,
            colors: vec!["#000000".to_owned()],
            dimensions: PatternDimensions {
                width: 1000.0,
                height: 1000.0,
            },
            metadata: PatternMetadata {
                name: "test".to_owned(),
                date: "2026-08-02T10:20:30Z".to_owned(),
                format: "internal".to_owned(),
            },
        }
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(
            write(&pattern(vec![])),
            Err(ExportError::InvalidInput(_)),
        ));
    }

    #[test]
    fn header_offset_points_at_stitch_block() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::normal(Point::new(5.0, 0.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        let offset = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        // One color: 36 + 4.
        assert_eq!(offset, 40);
        // First stitch record is the zero delta.
        assert_eq!(&bytes[offset..offset + 2], &[0, 0]);
    }

    #[test]
    fn date_is_compacted() {
        assert_eq!(date_field("2026-08-02T10:20:30Z"), "20260802102030");
        assert_eq!(date_field("garbage"), "19700101000000");
    }

    #[test]
    fn hoop_is_chosen_from_dimensions() {
        let mut p = pattern(vec![StitchPoint::normal(Point::new(0.0, 0.0), "#000000")]);
        p.dimensions = PatternDimensions {
            width: 400.0,
            height: 400.0,
        };
        assert_eq!(hoop_code(&p), HOOP_50X50);
        p.dimensions = PatternDimensions {
            width: 1000.0,
            height: 1000.0,
        };
        assert_eq!(hoop_code(&p), HOOP_110X110);
        p.dimensions = PatternDimensions {
            width: 1300.0,
            height: 1900.0,
        };
        assert_eq!(hoop_code(&p), HOOP_140X200);
        p.dimensions = PatternDimensions {
            width: 2600.0,
            height: 2600.0,
        };
        assert_eq!(hoop_code(&p), HOOP_200X200);
    }

    #[test]
    fn stitch_block_ends_with_end_code() {
        let p = pattern(vec![StitchPoint::normal(Point::new(0.0, 0.0), "#000000")]);
        let bytes = write(&p).unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0x80, 0x10]);
    }

    #[test]
    fn color_count_and_indexes_are_recorded() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::normal(Point::new(1.0, 0.0), "#FF0000"),
        ]);
        let bytes = write(&p).unwrap();
        let color_count = i32::from_le_bytes(bytes[24..28].try_into().unwrap());
        assert_eq!(color_count, 2);
        // Black is palette entry 1, red entry 6.
        let first = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
        let second = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(first, 1);
        assert_eq!(second, 6);
    }

    #[test]
    fn jumps_are_escaped() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::jump(Point::new(30.0, 0.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        let offset = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        assert_eq!(&bytes[offset + 2..offset + 6], &[0x80, 0x02, 30, 0]);
    }
}
