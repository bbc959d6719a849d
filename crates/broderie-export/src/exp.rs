//! Melco EXP serializer.
//!
//! The simplest of the supported layouts: a headerless stream of 2-byte
//! signed deltas in 0.1 mm units. Function codes are escaped with
//! `0x80` -- `0x80 0x04` prefixes a jump, `0x80 0x01` requests a color
//! change, and `0x80 0x80` terminates the stream.

use broderie_pipeline::{StitchPattern, StitchType};

use crate::{limits, ExportError};

/// Maximum delta per record.
const MAX_DELTA: i32 = 127;

/// Serialize a machine-coordinate pattern to EXP bytes.
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
    let mut out = Vec::with_capacity(2 * units.len() + 2);

    let mut current_color = pattern.stitches[0].color.clone();
    let (mut cx, mut cy) = (0i32, 0i32);

    for (stitch, &(nx, ny)) in pattern.stitches.iter().zip(&units) {
        if stitch.color != current_color || stitch.kind == StitchType::Stop {
            out.extend_from_slice(&[0x80, 0x01, 0x00, 0x00]);
            current_color.clone_from(&stitch.color);
        }

        let travels = matches!(
            stitch.kind,
            StitchType::Jump | StitchType::Trim | StitchType::Stop,
        );
        for (dx, dy) in limits::split_delta(nx - cx, ny - cy, MAX_DELTA) {
            if travels {
                out.extend_from_slice(&[0x80, 0x04]);
            }
            push_delta(&mut out, dx, dy);
        }
        cx = nx;
        cy = ny;
    }

    out.extend_from_slice(&[0x80, 0x80]);
    Ok(out)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn push_delta(out: &mut Vec<u8>, dx: i32, dy: i32) {
    out.push(dx as i8 as u8);
    out.push(dy as i8 as u8);
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
                date: "2026-08-02T00:00:00Z".to_owned(),
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
    fn stream_ends_with_terminator() {
        let p = pattern(vec![StitchPoint::normal(Point::new(0.0, 0.0), "#000000")]);
        let bytes = write(&p).unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0x80, 0x80]);
    }

    #[test]
    fn normal_stitches_are_bare_deltas() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::normal(Point::new(10.0, 3.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        // (0,0), (10,3), terminator.
        assert_eq!(bytes, vec![0, 0, 10, 3, 0x80, 0x80]);
    }

    #[test]
    fn negative_deltas_are_twos_complement() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(5.0, 5.0), "#000000"),
            StitchPoint::normal(Point::new(4.0, 2.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        assert_eq!(&bytes[2..4], &[0xFF, 0xFD]); // -1, -3
    }

    #[test]
    fn jumps_use_the_escape_prefix() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::jump(Point::new(20.0, 0.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        assert_eq!(&bytes[2..6], &[0x80, 0x04, 20, 0]);
    }

    #[test]
    fn large_moves_are_split() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::normal(Point::new(300.0, 0.0), "#000000"),
        ]);
        let bytes = write(&p).unwrap();
        // (0,0), then 300 split into 3×100, then terminator.
        assert_eq!(bytes, vec![0, 0, 100, 0, 100, 0, 100, 0, 0x80, 0x80]);
    }

    #[test]
    fn color_change_emits_function_code() {
        let p = pattern(vec![
            StitchPoint::normal(Point::new(0.0, 0.0), "#000000"),
            StitchPoint::normal(Point::new(1.0, 0.0), "#FF0000"),
        ]);
        let bytes = write(&p).unwrap();
        assert_eq!(&bytes[2..6], &[0x80, 0x01, 0x00, 0x00]);
    }
}
