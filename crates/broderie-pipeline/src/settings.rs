//! Settings sanitization: clamp and normalize user-supplied conversion
//! parameters into the documented ranges.
//!
//! Sanitization never fails -- every input is repaired to a usable value.
//! The list of adjusted field names is returned alongside the result so
//! callers can surface what was changed.

use crate::palette;
use crate::types::ProcessingSettings;

/// Canvas dimension range in millimeters.
pub const DIMENSION_RANGE: (f64, f64) = (10.0, 1000.0);
/// Fill density range in stitches per mm².
pub const DENSITY_RANGE: (f64, f64) = (1.0, 5.0);
/// Sobel magnitude cutoff range.
pub const EDGE_THRESHOLD_RANGE: (u8, u8) = (64, 192);
/// Pull compensation range in millimeters.
pub const PULL_COMPENSATION_RANGE: (f64, f64) = (0.0, 100.0);

/// Clamp and normalize every field of the given settings.
///
/// Returns the sanitized settings and the names of the fields that were
/// adjusted. Sanitization is idempotent: running it on its own output
/// changes nothing.
#[must_use]
pub fn sanitize(settings: &ProcessingSettings) -> (ProcessingSettings, Vec<&'static str>) {
    let mut out = settings.clone();
    let mut adjusted = Vec::new();

    if clamp_field(&mut out.width, DIMENSION_RANGE, ProcessingSettings::DEFAULT_WIDTH) {
        adjusted.push("width");
    }
    if clamp_field(&mut out.height, DIMENSION_RANGE, ProcessingSettings::DEFAULT_HEIGHT) {
        adjusted.push("height");
    }
    if clamp_field(&mut out.density, DENSITY_RANGE, ProcessingSettings::DEFAULT_DENSITY) {
        adjusted.push("density");
    }

    let threshold = out
        .edge_threshold
        .clamp(EDGE_THRESHOLD_RANGE.0, EDGE_THRESHOLD_RANGE.1);
    if threshold != out.edge_threshold {
        out.edge_threshold = threshold;
        adjusted.push("edge_threshold");
    }

    let angle = if out.fill_angle.is_finite() {
        out.fill_angle.rem_euclid(360.0)
    } else {
        ProcessingSettings::DEFAULT_FILL_ANGLE
    };
    #[allow(clippy::float_cmp)]
    if angle != out.fill_angle {
        out.fill_angle = angle;
        adjusted.push("fill_angle");
    }

    if clamp_field(
        &mut out.pull_compensation,
        PULL_COMPENSATION_RANGE,
        ProcessingSettings::DEFAULT_PULL_COMPENSATION,
    ) {
        adjusted.push("pull_compensation");
    }

    if palette::parse_hex(&out.color).is_none() {
        out.color = ProcessingSettings::DEFAULT_COLOR.to_owned();
        adjusted.push("color");
    }

    (out, adjusted)
}

/// Clamp `value` into `range`, falling back to `default` for NaN.
/// Infinities clamp to the range ends. Returns `true` when the value
/// changed.
fn clamp_field(value: &mut f64, range: (f64, f64), default: f64) -> bool {
    let repaired = if value.is_nan() {
        default
    } else {
        value.clamp(range.0, range.1)
    };
    #[allow(clippy::float_cmp)]
    let changed = repaired != *value;
    *value = repaired;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColorMode;

    #[test]
    fn defaults_pass_through_unchanged() {
        let settings = ProcessingSettings::default();
        let (sanitized, adjusted) = sanitize(&settings);
        assert_eq!(sanitized, settings);
        assert!(adjusted.is_empty(), "adjusted: {adjusted:?}");
    }

    #[test]
    fn dimensions_are_clamped() {
        let settings = ProcessingSettings {
            width: 5.0,
            height: 5000.0,
            ..ProcessingSettings::default()
        };
        let (sanitized, adjusted) = sanitize(&settings);
        assert!((sanitized.width - 10.0).abs() < f64::EPSILON);
        assert!((sanitized.height - 1000.0).abs() < f64::EPSILON);
        assert!(adjusted.contains(&"width"));
        assert!(adjusted.contains(&"height"));
    }

    #[test]
    fn density_is_clamped() {
        let settings = ProcessingSettings {
            density: 9.0,
            ..ProcessingSettings::default()
        };
        let (sanitized, adjusted) = sanitize(&settings);
        assert!((sanitized.density - 5.0).abs() < f64::EPSILON);
        assert_eq!(adjusted, vec!["density"]);
    }

    #[test]
    fn edge_threshold_is_clamped() {
        let low = ProcessingSettings {
            edge_threshold: 10,
            ..ProcessingSettings::default()
        };
        assert_eq!(sanitize(&low).0.edge_threshold, 64);

        let high = ProcessingSettings {
            edge_threshold: 255,
            ..ProcessingSettings::default()
        };
        assert_eq!(sanitize(&high).0.edge_threshold, 192);
    }

    #[test]
    fn fill_angle_wraps_into_range() {
        let settings = ProcessingSettings {
            fill_angle: 450.0,
            ..ProcessingSettings::default()
        };
        let (sanitized, _) = sanitize(&settings);
        assert!((sanitized.fill_angle - 90.0).abs() < 1e-9);

        let negative = ProcessingSettings {
            fill_angle: -45.0,
            ..ProcessingSettings::default()
        };
        let (sanitized, _) = sanitize(&negative);
        assert!((sanitized.fill_angle - 315.0).abs() < 1e-9);
    }

    #[test]
    fn exact_full_turn_maps_to_zero() {
        let settings = ProcessingSettings {
            fill_angle: 360.0,
            ..ProcessingSettings::default()
        };
        let (sanitized, _) = sanitize(&settings);
        assert!(sanitized.fill_angle.abs() < 1e-9);
    }

    #[test]
    fn invalid_color_falls_back_to_black() {
        for bad in ["", "black", "#12345", "#12345G", "123456"] {
            let settings = ProcessingSettings {
                color: bad.to_owned(),
                ..ProcessingSettings::default()
            };
            let (sanitized, adjusted) = sanitize(&settings);
            assert_eq!(sanitized.color, "#000000", "input {bad:?}");
            assert!(adjusted.contains(&"color"));
        }
    }

    #[test]
    fn valid_color_is_preserved() {
        let settings = ProcessingSettings {
            color: "#AbCdEf".to_owned(),
            color_mode: ColorMode::Color,
            ..ProcessingSettings::default()
        };
        let (sanitized, adjusted) = sanitize(&settings);
        assert_eq!(sanitized.color, "#AbCdEf");
        assert!(adjusted.is_empty());
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let settings = ProcessingSettings {
            width: f64::NAN,
            density: f64::INFINITY,
            fill_angle: f64::NEG_INFINITY,
            ..ProcessingSettings::default()
        };
        let (sanitized, adjusted) = sanitize(&settings);
        assert!((sanitized.width - ProcessingSettings::DEFAULT_WIDTH).abs() < f64::EPSILON);
        assert!((sanitized.density - 5.0).abs() < f64::EPSILON);
        assert!(sanitized.fill_angle.abs() < f64::EPSILON);
        assert!(adjusted.contains(&"width"));
        assert!(adjusted.contains(&"density"));
        assert!(adjusted.contains(&"fill_angle"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let settings = ProcessingSettings {
            width: 0.5,
            height: 2500.0,
            density: -3.0,
            edge_threshold: 7,
            fill_angle: 725.0,
            use_underlay: false,
            pull_compensation: 200.0,
            color: "nope".to_owned(),
            color_mode: ColorMode::Color,
        };
        let (once, _) = sanitize(&settings);
        let (twice, adjusted) = sanitize(&once);
        assert_eq!(once, twice);
        assert!(adjusted.is_empty(), "second pass adjusted {adjusted:?}");
    }
}
