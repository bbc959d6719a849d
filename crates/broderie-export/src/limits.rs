//! Per-format ceilings, palette snapping and machine-coordinate
//! conversion.
//!
//! Every format a commercial machine reads has hard limits on stitch
//! count, simultaneous thread colors and hoop dimensions. The table
//! here is enforced before any writer runs, so writers can assume a
//! pattern that fits.

use broderie_pipeline::palette::{self, ThreadColor};
use broderie_pipeline::{ColorMode, PatternDimensions, Point, StitchPattern};

use crate::{EmbroideryFormat, ExportError};

/// Machine units per millimeter (0.1 mm resolution).
pub const UNITS_PER_MM: f64 = 10.0;

/// Hard ceilings for one format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatLimits {
    /// Maximum stitch count.
    pub max_stitches: usize,
    /// Maximum number of distinct thread colors used by stitches.
    pub max_colors: usize,
    /// Maximum width/height in millimeters.
    pub max_dimension_mm: f64,
}

/// The ceiling table for each supported format.
#[must_use]
pub const fn limits_for(format: EmbroideryFormat) -> FormatLimits {
    match format {
        EmbroideryFormat::Dst => FormatLimits {
            max_stitches: 999_999,
            max_colors: 1,
            max_dimension_mm: 400.0,
        },
        EmbroideryFormat::Pes => FormatLimits {
            max_stitches: 100_000,
            max_colors: 99,
            max_dimension_mm: 260.0,
        },
        EmbroideryFormat::Jef => FormatLimits {
            max_stitches: 65_535,
            max_colors: 99,
            max_dimension_mm: 260.0,
        },
        EmbroideryFormat::Exp => FormatLimits {
            max_stitches: 999_999,
            max_colors: 1,
            max_dimension_mm: 400.0,
        },
        EmbroideryFormat::Vp3 => FormatLimits {
            max_stitches: 100_000,
            max_colors: 99,
            max_dimension_mm: 260.0,
        },
        EmbroideryFormat::Hus => FormatLimits {
            max_stitches: 100_000,
            max_colors: 99,
            max_dimension_mm: 260.0,
        },
        EmbroideryFormat::Pat => FormatLimits {
            max_stitches: 999_999,
            max_colors: 1,
            max_dimension_mm: 400.0,
        },
        EmbroideryFormat::Qcc => FormatLimits {
            max_stitches: 999_999,
            max_colors: 1,
            max_dimension_mm: 400.0,
        },
    }
}

/// Check a pattern against the format's ceilings.
///
/// The color ceiling counts distinct colors across the *stitches* (the
/// number of thread changes a machine must support), not the pattern's
/// descriptive color list.
///
/// # Errors
///
/// Returns [`ExportError::FormatLimit`] naming the violated ceiling.
pub fn check(pattern: &StitchPattern, format: EmbroideryFormat) -> Result<(), ExportError> {
    let limits = limits_for(format);

    if pattern.stitches.len() > limits.max_stitches {
        return Err(ExportError::FormatLimit(format!(
            "{} stitches exceed the {format} maximum of {}",
            pattern.stitches.len(),
            limits.max_stitches,
        )));
    }

    let color_count = distinct_stitch_colors(pattern);
    if color_count > limits.max_colors {
        return Err(ExportError::FormatLimit(format!(
            "{color_count} thread colors exceed the {format} maximum of {}",
            limits.max_colors,
        )));
    }

    let dims = pattern.dimensions;
    if dims.width > limits.max_dimension_mm || dims.height > limits.max_dimension_mm {
        return Err(ExportError::FormatLimit(format!(
            "{} x {} mm exceeds the {format} hoop maximum of {} mm",
            dims.width, dims.height, limits.max_dimension_mm,
        )));
    }

    Ok(())
}

/// Number of distinct colors across the stitch sequence.
#[must_use]
pub fn distinct_stitch_colors(pattern: &StitchPattern) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for stitch in &pattern.stitches {
        if !seen.contains(&stitch.color.as_str()) {
            seen.push(&stitch.color);
        }
    }
    seen.len()
}

/// Snap every color in the pattern to its nearest thread-palette entry.
///
/// Both the stitch colors and the descriptive color list are replaced;
/// the color list is deduplicated preserving first-appearance order.
/// Unparseable hex strings snap from black.
#[must_use]
pub fn snap_to_palette(pattern: &StitchPattern) -> StitchPattern {
    let mut snapped = pattern.clone();

    for stitch in &mut snapped.stitches {
        stitch.color = nearest_hex(&stitch.color);
    }

    let mut colors: Vec<String> = Vec::new();
    for color in &pattern.colors {
        let hex = nearest_hex(color);
        if !colors.contains(&hex) {
            colors.push(hex);
        }
    }
    snapped.colors = colors;
    snapped
}

fn nearest_hex(color: &str) -> String {
    let rgb = palette::parse_hex(color).unwrap_or([0, 0, 0]);
    let thread: &ThreadColor = palette::nearest_thread(rgb, ColorMode::Color);
    thread.hex()
}

/// Convert a pattern to machine coordinates: multiply by
/// [`UNITS_PER_MM`], translate so the minimum coordinate is zero and
/// round to integer units. Dimensions are scaled the same way.
#[must_use]
pub fn to_machine(pattern: &StitchPattern) -> StitchPattern {
    let (min_x, min_y) = pattern
        .bounds()
        .map_or((0.0, 0.0), |(min_x, min_y, _, _)| (min_x, min_y));

    let mut machine = pattern.clone();
    for stitch in &mut machine.stitches {
        let p = stitch.position;
        stitch.position = Point::new(
            ((p.x - min_x) * UNITS_PER_MM).round(),
            ((p.y - min_y) * UNITS_PER_MM).round(),
        );
    }
    machine.dimensions = PatternDimensions {
        width: pattern.dimensions.width * UNITS_PER_MM,
        height: pattern.dimensions.height * UNITS_PER_MM,
    };
    machine
}

/// Integer positions of an already machine-converted pattern.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn machine_units(pattern: &StitchPattern) -> Vec<(i32, i32)> {
    pattern
        .stitches
        .iter()
        .map(|s| (s.position.x.round() as i32, s.position.y.round() as i32))
        .collect()
}

/// Decompose a delta into equal sub-deltas, each within `±cap` on both
/// axes. Returns a single element when the delta already fits.
pub(crate) fn split_delta(dx: i32, dy: i32, cap: i32) -> Vec<(i32, i32)> {
    let steps_for = |v: i32| (v.abs() + cap - 1) / cap;
    let steps = steps_for(dx).max(steps_for(dy)).max(1);

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
