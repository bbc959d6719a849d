//! Stitch planning: turn millimeter-space contours into an ordered
//! stitch sequence.
//!
//! Planning proceeds in layers. An optional underlay (a sparse fill
//! perpendicular to the main fill direction) stabilizes the fabric,
//! then the main angled scanline fill covers the contour region, then
//! outline stitches retrace each contour. A uniform pull-compensation
//! offset is applied last.
//!
//! The scanline fill is geometric: parallel lines are cast across the
//! contour bounding box, their intersections with contour edges are
//! paired off, and each pair becomes a jump plus a run of evenly spaced
//! penetrating stitches. Traversal alternates direction on successive
//! lines (boustrophedon) to keep jump distances short.

use log::debug;

use crate::types::{contour_bounds, Point, Polyline, ProcessingSettings, StitchPoint};

/// Hard cap on the planned stitch count for a fill.
pub const MAX_TARGET_STITCHES: u32 = 15_000;
/// Minimum stitch spacing in millimeters.
pub const MIN_SPACING_MM: f64 = 0.3;

/// Compute the fill stitch spacing in millimeters for the given
/// settings.
///
/// `target = min(15000, ceil(area × density))`, `base = sqrt(area /
/// target)`, and the result is `max(0.3, base / density)`.
#[must_use]
pub fn fill_spacing(settings: &ProcessingSettings) -> f64 {
    let area = settings.width * settings.height;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let target = ((area * settings.density).ceil() as u32).min(MAX_TARGET_STITCHES);
    let base = (area / f64::from(target)).sqrt();
    (base / settings.density).max(MIN_SPACING_MM)
}

/// Plan the stitch sequence for a set of contours.
///
/// The contours must already be in millimeter canvas space (see
/// [`crate::canvas::fit_to_canvas`]). All stitches carry the settings'
/// thread color. Returns an empty sequence when the contours contain no
/// points.
#[must_use]
pub fn generate_stitches(
    contours: &[Polyline],
    settings: &ProcessingSettings,
) -> Vec<StitchPoint> {
    let spacing = fill_spacing(settings);
    let color = settings.color.as_str();
    let mut stitches = Vec::new();

    // Position the needle at the first contour point before any fill.
    if let Some(first) = contours.iter().find_map(Polyline::first) {
        stitches.push(StitchPoint::jump(*first, color));
    }

    if settings.use_underlay {
        let underlay_angle = (settings.fill_angle + 90.0).rem_euclid(360.0);
        scanline_fill(contours, underlay_angle, spacing * 2.0, color, &mut stitches);
    }

    scanline_fill(contours, settings.fill_angle, spacing, color, &mut stitches);

    outline_stitches(contours, spacing, color, &mut stitches);

    if let Some(last) = stitches.last() {
        stitches.push(StitchPoint::jump(last.position, color));
    }

    if settings.pull_compensation > 0.0 {
        let offset = settings.pull_compensation;
        for stitch in &mut stitches {
            stitch.position = stitch.position.translated(offset, offset);
        }
    }

    debug!(
        "planned {} stitches ({} contours, spacing {spacing:.2} mm)",
        stitches.len(),
        contours.len(),
    );
    stitches
}

/// Fill the contour region with parallel stitch rows at the given angle.
///
/// Appends to `out`. Rows with an odd number of edge intersections are
/// skipped -- an odd count means the row grazed a vertex or an open
/// contour end and cannot be paired into inside spans.
fn scanline_fill(
    contours: &[Polyline],
    angle_degrees: f64,
    spacing: f64,
    color: &str,
    out: &mut Vec<StitchPoint>,
) {
    let Some((min_x, min_y, max_x, max_y)) = contour_bounds(contours) else {
        return;
    };

    let diagonal = (max_x - min_x).hypot(max_y - min_y);
    if diagonal <= 0.0 || spacing <= 0.0 {
        return;
    }
    let center = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    let theta = angle_degrees.to_radians();
    let dir = Point::new(theta.cos(), theta.sin());
    let normal = Point::new(-theta.sin(), theta.cos());

    #[allow(clippy::cast_possible_truncation)]
    let num_lines = (diagonal / spacing).ceil() as i64;

    let mut reverse = false;
    for i in -num_lines..=num_lines {
        #[allow(clippy::cast_precision_loss)]
        let offset = i as f64 * spacing;
        let line_center = Point::new(
            normal.x.mul_add(offset, center.x),
            normal.y.mul_add(offset, center.y),
        );
        let a = Point::new(
            dir.x.mul_add(-diagonal, line_center.x),
            dir.y.mul_add(-diagonal, line_center.y),
        );
        let b = Point::new(
            dir.x.mul_add(diagonal, line_center.x),
            dir.y.mul_add(diagonal, line_center.y),
        );

        let mut hits: Vec<Point> = Vec::new();
        for contour in contours {
            for edge in contour.points().windows(2) {
                if let Some(p) = segment_intersection(a, b, edge[0], edge[1]) {
                    hits.push(p);
                }
            }
        }

        // Sort along the fill direction, flipping on alternate rows.
        hits.sort_by(|p, q| {
            let tp = p.x * dir.x + p.y * dir.y;
            let tq = q.x * dir.x + q.y * dir.y;
            tp.partial_cmp(&tq).unwrap_or(std::cmp::Ordering::Equal)
        });
        if reverse {
            hits.reverse();
        }
        reverse = !reverse;

        if hits.len() % 2 != 0 {
            continue;
        }

        for pair in hits.chunks_exact(2) {
            let (start, end) = (pair[0], pair[1]);
            out.push(StitchPoint::jump(start, color));
            interpolate_run(start, end, spacing, color, out);
        }
    }
}

/// Retrace each contour with evenly spaced penetrating stitches.
///
/// Each contour begins with a jump to its start; segments shorter than
/// the spacing are skipped.
fn outline_stitches(
    contours: &[Polyline],
    spacing: f64,
    color: &str,
    out: &mut Vec<StitchPoint>,
) {
    for contour in contours {
        let Some(start) = contour.first() else {
            continue;
        };
        out.push(StitchPoint::jump(*start, color));

        for segment in contour.points().windows(2) {
            let (a, b) = (segment[0], segment[1]);
            if a.distance(b) < spacing {
                continue;
            }
            interpolate_run(a, b, spacing, color, out);
        }
    }
}

/// Emit `ceil(dist / spacing)` evenly spaced normal stitches from just
/// past `start` through `end`.
fn interpolate_run(start: Point, end: Point, spacing: f64, color: &str, out: &mut Vec<StitchPoint>) {
    let dist = start.distance(end);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = (dist / spacing).ceil() as usize;
    #[allow(clippy::cast_precision_loss)]
    for k in 1..=n {
        let t = k as f64 / n as f64;
        let p = Point::new(
            (end.x - start.x).mul_add(t, start.x),
            (end.y - start.y).mul_add(t, start.y),
        );
        out.push(StitchPoint::normal(p, color));
    }
}

/// Parametric segment-segment intersection.
///
/// Returns the intersection point when both parameters fall in
/// `[0, 1]`; parallel or non-crossing segments return `None`.
fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let denom = (b2.y - b1.y) * (a2.x - a1.x) - (b2.x - b1.x) * (a2.y - a1.y);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let ua = ((b2.x - b1.x) * (a1.y - b1.y) - (b2.y - b1.y) * (a1.x - b1.x)) / denom;
    let ub = ((a2.x - a1.x) * (a1.y - b1.y) - (a2.y - a1.y) * (a1.x - b1.x)) / denom;
    if !(0.0..=1.0).contains(&ua) || !(0.0..=1.0).contains(&ub) {
        return None;
    }
    Some(Point::new(
        (a2.x - a1.x).mul_add(ua, a1.x),
        (a2.y - a1.y).mul_add(ua, a1.y),
    ))
}
