//! Shared types for the broderie conversion pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// source pixel buffer without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in millimeters (source space) or pixels (raster space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Translate by the given offsets.
    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// `true` when both coordinates are finite (no NaN, no infinities).
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A sequence of connected points forming a contour segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Compute the axis-aligned bounding box of all points across polylines.
///
/// Returns `(min_x, min_y, max_x, max_y)`, or `None` when every polyline
/// is empty.
#[must_use]
pub fn contour_bounds(contours: &[Polyline]) -> Option<(f64, f64, f64, f64)> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for contour in contours {
        for p in contour.points() {
            let (min_x, min_y, max_x, max_y) =
                bounds.get_or_insert((p.x, p.y, p.x, p.y));
            *min_x = min_x.min(p.x);
            *min_y = min_y.min(p.y);
            *max_x = max_x.max(p.x);
            *max_y = max_y.max(p.y);
        }
    }
    bounds
}

/// The action the machine performs at a stitch coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StitchType {
    /// Needle penetrates the fabric at the destination.
    Normal,
    /// Needle lifts and moves without stitching.
    Jump,
    /// Cut the thread tail.
    Trim,
    /// Pause for a color change.
    Stop,
    /// Terminate the file.
    End,
}

/// A single entry in a stitch sequence: a position, an action, and the
/// thread color in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchPoint {
    /// Needle position.
    pub position: Point,
    /// What the machine does here.
    pub kind: StitchType,
    /// Thread color as a `#RRGGBB` hex string.
    pub color: String,
}

impl StitchPoint {
    /// Create a stitch of the given kind.
    #[must_use]
    pub fn new(position: Point, kind: StitchType, color: impl Into<String>) -> Self {
        Self {
            position,
            kind,
            color: color.into(),
        }
    }

    /// Shorthand for a penetrating stitch.
    #[must_use]
    pub fn normal(position: Point, color: impl Into<String>) -> Self {
        Self::new(position, StitchType::Normal, color)
    }

    /// Shorthand for a travel move.
    #[must_use]
    pub fn jump(position: Point, color: impl Into<String>) -> Self {
        Self::new(position, StitchType::Jump, color)
    }
}

/// Compute the bounding box over stitch positions.
///
/// Returns `(min_x, min_y, max_x, max_y)`, or `None` for an empty slice.
#[must_use]
pub fn stitch_bounds(stitches: &[StitchPoint]) -> Option<(f64, f64, f64, f64)> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for s in stitches {
        let p = s.position;
        let (min_x, min_y, max_x, max_y) = bounds.get_or_insert((p.x, p.y, p.x, p.y));
        *min_x = min_x.min(p.x);
        *min_y = min_y.min(p.y);
        *max_x = max_x.max(p.x);
        *max_y = max_y.max(p.y);
    }
    bounds
}

/// Physical pattern dimensions in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternDimensions {
    /// Width in millimeters.
    pub width: f64,
    /// Height in millimeters.
    pub height: f64,
}

/// Descriptive metadata attached to a finished pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// Human-readable design name.
    pub name: String,
    /// Creation timestamp, ISO 8601.
    pub date: String,
    /// Format tag: `"internal"` for pipeline output, or the target
    /// format's extension after serialization.
    pub format: String,
}

/// An ordered machine-embroidery stitch sequence plus the palette and
/// physical envelope it was planned for.
///
/// Created by the pipeline and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchPattern {
    /// Ordered stitch sequence (non-empty for a valid pattern).
    pub stitches: Vec<StitchPoint>,
    /// Distinct hex colors used by the stitches, in order of first
    /// appearance.
    pub colors: Vec<String>,
    /// Physical envelope in millimeters.
    pub dimensions: PatternDimensions,
    /// Name, date and format tag.
    pub metadata: PatternMetadata,
}

impl StitchPattern {
    /// Bounding box over all stitch positions, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        stitch_bounds(&self.stitches)
    }

    /// `true` when every stitch coordinate is finite.
    #[must_use]
    pub fn coordinates_finite(&self) -> bool {
        self.stitches.iter().all(|s| s.position.is_finite())
    }
}

/// Which palette subset pixel colors are matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// Luminance matching against the five gray palette entries.
    #[default]
    Grayscale,
    /// Direct RGB matching against the full palette.
    Color,
}

/// User-facing conversion parameters.
///
/// Values outside the documented ranges are clamped by
/// [`sanitize`](crate::settings::sanitize) before the pipeline runs; the
/// ranges here document the post-sanitization contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Target canvas width in millimeters, `[10, 1000]`.
    pub width: f64,
    /// Target canvas height in millimeters, `[10, 1000]`.
    pub height: f64,
    /// Fill density in stitches per mm², `[1, 5]`.
    pub density: f64,
    /// Sobel magnitude cutoff, `[64, 192]`.
    pub edge_threshold: u8,
    /// Scanline fill direction in degrees, normalized to `[0, 360)`.
    pub fill_angle: f64,
    /// Whether to lay a sparse perpendicular underlay before the fill.
    pub use_underlay: bool,
    /// Uniform stitch offset in millimeters, `[0, 100]`.
    pub pull_compensation: f64,
    /// Outline thread color as `#RRGGBB`; invalid input falls back to
    /// black.
    pub color: String,
    /// Palette subset used for quantization.
    pub color_mode: ColorMode,
}

impl ProcessingSettings {
    /// Default canvas width in millimeters.
    pub const DEFAULT_WIDTH: f64 = 100.0;
    /// Default canvas height in millimeters.
    pub const DEFAULT_HEIGHT: f64 = 100.0;
    /// Default fill density in stitches per mm².
    pub const DEFAULT_DENSITY: f64 = 2.0;
    /// Default Sobel magnitude cutoff.
    pub const DEFAULT_EDGE_THRESHOLD: u8 = 128;
    /// Default fill angle in degrees.
    pub const DEFAULT_FILL_ANGLE: f64 = 0.0;
    /// Default pull compensation in millimeters.
    pub const DEFAULT_PULL_COMPENSATION: f64 = 0.0;
    /// Fallback thread color.
    pub const DEFAULT_COLOR: &'static str = "#000000";
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            density: Self::DEFAULT_DENSITY,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            fill_angle: Self::DEFAULT_FILL_ANGLE,
            use_underlay: true,
            pull_compensation: Self::DEFAULT_PULL_COMPENSATION,
            color: Self::DEFAULT_COLOR.to_owned(),
            color_mode: ColorMode::default(),
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing or malformed image data or settings.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Edge detection produced no or too few edges.
    #[error("insufficient edges: {0}")]
    InsufficientEdges(String),

    /// More than half of the interior pixels are edges.
    #[error("too many edges: {0}")]
    TooManyEdges(String),

    /// Contour tracing returned no contours.
    #[error("no contours found in the image")]
    NoContours,

    /// The optimized pattern has fewer stitches than a machine can
    /// meaningfully run.
    #[error("insufficient stitches: {0}")]
    InsufficientStitches(String),

    /// A NaN or infinite coordinate was detected.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// The conversion was cancelled between stages.
    #[error("conversion cancelled")]
    Cancelled,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_translated() {
        let p = Point::new(1.0, 2.0).translated(0.5, -0.5);
        assert_eq!(p, Point::new(1.5, 1.5));
    }

    #[test]
    fn point_finiteness() {
        assert!(Point::new(1.0, 2.0).is_finite());
        assert!(!Point::new(f64::NAN, 2.0).is_finite());
        assert!(!Point::new(1.0, f64::INFINITY).is_finite());
    }

    // --- Polyline tests ---

    #[test]
    fn polyline_accessors() {
        let pl = Polyline::new(vec![
            Point::new(1.0, 2.0),
            Point::new(3.0, 4.0),
            Point::new(5.0, 6.0),
        ]);
        assert_eq!(pl.len(), 3);
        assert!(!pl.is_empty());
        assert_eq!(pl.first(), Some(&Point::new(1.0, 2.0)));
        assert_eq!(pl.last(), Some(&Point::new(5.0, 6.0)));
    }

    #[test]
    fn empty_polyline() {
        let pl = Polyline::new(vec![]);
        assert!(pl.is_empty());
        assert!(pl.first().is_none());
    }

    // --- Bounds ---

    #[test]
    fn contour_bounds_spans_all_polylines() {
        let contours = vec![
            Polyline::new(vec![Point::new(-1.0, 0.0), Point::new(2.0, 3.0)]),
            Polyline::new(vec![Point::new(5.0, -4.0)]),
        ];
        assert_eq!(contour_bounds(&contours), Some((-1.0, -4.0, 5.0, 3.0)));
    }

    #[test]
    fn contour_bounds_empty_is_none() {
        assert_eq!(contour_bounds(&[]), None);
        assert_eq!(contour_bounds(&[Polyline::new(vec![])]), None);
    }

    #[test]
    fn stitch_bounds_tracks_positions() {
        let stitches = vec![
            StitchPoint::jump(Point::new(0.0, 10.0), "#000000"),
            StitchPoint::normal(Point::new(4.0, -2.0), "#000000"),
        ];
        assert_eq!(stitch_bounds(&stitches), Some((0.0, -2.0, 4.0, 10.0)));
    }

    // --- Pattern helpers ---

    fn pattern_with(stitches: Vec<StitchPoint>) -> StitchPattern {
        StitchPattern {
            stitches,
            colors: vec!["#000000".to_owned()],
            dimensions: PatternDimensions {
                width: 100.0,
                height: 100.0,
            },
            metadata: PatternMetadata {
                name: "test".to_owned(),
                date: "2026-01-01T00:00:00Z".to_owned(),
                format: "internal".to_owned(),
            },
        }
    }

    #[test]
    fn pattern_coordinates_finite() {
        let ok = pattern_with(vec![StitchPoint::normal(Point::new(1.0, 1.0), "#000000")]);
        assert!(ok.coordinates_finite());

        let bad = pattern_with(vec![StitchPoint::normal(
            Point::new(f64::NAN, 1.0),
            "#000000",
        )]);
        assert!(!bad.coordinates_finite());
    }

    // --- Settings ---

    #[test]
    fn settings_defaults() {
        let s = ProcessingSettings::default();
        assert!((s.width - 100.0).abs() < f64::EPSILON);
        assert!((s.height - 100.0).abs() < f64::EPSILON);
        assert!((s.density - 2.0).abs() < f64::EPSILON);
        assert_eq!(s.edge_threshold, 128);
        assert!((s.fill_angle).abs() < f64::EPSILON);
        assert!(s.use_underlay);
        assert!((s.pull_compensation).abs() < f64::EPSILON);
        assert_eq!(s.color, "#000000");
        assert_eq!(s.color_mode, ColorMode::Grayscale);
    }

    #[test]
    fn settings_deserialize_with_missing_fields() {
        // Old configs without newer fields should still deserialize,
        // falling back to the defaults.
        let json = r#"{ "width": 50.0, "height": 60.0 }"#;
        let s: ProcessingSettings = serde_json::from_str(json).unwrap();
        assert!((s.width - 50.0).abs() < f64::EPSILON);
        assert!((s.height - 60.0).abs() < f64::EPSILON);
        assert_eq!(s.edge_threshold, 128);
        assert_eq!(s.color_mode, ColorMode::Grayscale);
    }

    #[test]
    fn settings_serde_round_trip() {
        let s = ProcessingSettings {
            width: 200.0,
            height: 150.0,
            density: 4.0,
            edge_threshold: 90,
            fill_angle: 45.0,
            use_underlay: false,
            pull_compensation: 1.5,
            color: "#FF0000".to_owned(),
            color_mode: ColorMode::Color,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: ProcessingSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    // --- Errors ---

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::NoContours.to_string(),
            "no contours found in the image",
        );
        assert_eq!(
            PipelineError::Cancelled.to_string(),
            "conversion cancelled",
        );
        assert_eq!(
            PipelineError::InvalidInput("image is empty".to_owned()).to_string(),
            "invalid input: image is empty",
        );
    }
}
