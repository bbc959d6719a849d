//! Incremental conversion pipeline: advance stage-by-stage from an RGBA
//! buffer to a finished [`StitchPattern`].
//!
//! Each stage method consumes `self` and returns the next pipeline
//! state, carrying the intermediates computed so far. The [`Stage`]
//! enum wraps all states for uniform loop-driving, and [`Converter`]
//! layers progress reporting and cooperative cancellation on top:
//!
//! ```rust
//! # use broderie_pipeline::{Converter, ProcessingSettings};
//! # use image::RgbaImage;
//! let image = RgbaImage::from_fn(64, 64, |x, _| {
//!     if x < 32 { image::Rgba([0, 0, 0, 255]) } else { image::Rgba([255, 255, 255, 255]) }
//! });
//! let converter = Converter::new()
//!     .with_progress(|stage, percent| eprintln!("{stage}: {percent}%"));
//! let pattern = converter.convert(&image, &ProcessingSettings::default());
//! # let _ = pattern;
//! ```
//!
//! Progress fires at each stage boundary -- `(name, 0)` on entry and
//! `(name, 100)` on exit -- and the cancellation flag is checked between
//! stages only; a running stage is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use log::debug;

use crate::contour::{ContourTracer, ContourTracerKind};
use crate::types::{
    PatternDimensions, PatternMetadata, PipelineError, Polyline, ProcessingSettings,
    StitchPattern, StitchPoint,
};

/// Total number of processing stages.
pub const STAGE_COUNT: usize = 6;

/// Minimum number of stitches an optimized pattern must contain.
pub const MIN_STITCHES: usize = 10;

/// Stage names in execution order, as reported to progress callbacks.
pub const STAGE_NAMES: [&str; STAGE_COUNT] = [
    "processing",
    "bitmap",
    "edges",
    "contours",
    "generating",
    "optimizing",
];

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing -- call .quantize() to continue"]
pub struct Pending {
    settings: ProcessingSettings,
    image: RgbaImage,
}

impl Pending {
    /// Start a pipeline over the given image with already-sanitized
    /// settings.
    pub fn new(image: RgbaImage, settings: ProcessingSettings) -> Self {
        Self { settings, image }
    }

    /// Quantize every pixel against the thread palette.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] when the image has a
    /// zero dimension.
    pub fn quantize(self) -> Result<Quantized, PipelineError> {
        let (image, used_colors) = crate::quantize::quantize(&self.image, self.settings.color_mode)?;
        Ok(Quantized {
            settings: self.settings,
            image,
            used_colors,
        })
    }
}

// ───────────────────────── Stage 1: Quantized ────────────────────────

/// Pipeline state after palette quantization.
#[must_use = "pipeline stages are consumed by advancing -- call .normalize() to continue"]
pub struct Quantized {
    settings: ProcessingSettings,
    image: RgbaImage,
    used_colors: Vec<String>,
}

impl Quantized {
    /// The thread colors used so far, in order of first appearance.
    #[must_use]
    pub fn used_colors(&self) -> &[String] {
        &self.used_colors
    }

    /// Equalize, grayscale and repair the bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for images under 3×3.
    pub fn normalize(self) -> Result<Normalized, PipelineError> {
        let image = crate::bitmap::normalize(&self.image)?;
        Ok(Normalized {
            settings: self.settings,
            image,
            used_colors: self.used_colors,
        })
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after bitmap normalization.
#[must_use = "pipeline stages are consumed by advancing -- call .detect_edges() to continue"]
pub struct Normalized {
    settings: ProcessingSettings,
    image: RgbaImage,
    used_colors: Vec<String>,
}

impl Normalized {
    /// Run Sobel edge detection with the settings' threshold.
    ///
    /// # Errors
    ///
    /// Propagates [`PipelineError::InsufficientEdges`] and
    /// [`PipelineError::TooManyEdges`] from the detector.
    pub fn detect_edges(self) -> Result<EdgesDetected, PipelineError> {
        let edges = crate::edges::detect_edges(&self.image, self.settings.edge_threshold)?;
        Ok(EdgesDetected {
            settings: self.settings,
            edges,
            used_colors: self.used_colors,
        })
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
#[must_use = "pipeline stages are consumed by advancing -- call .trace_contours() to continue"]
pub struct EdgesDetected {
    settings: ProcessingSettings,
    edges: GrayImage,
    used_colors: Vec<String>,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Trace contours and scale them onto the millimeter canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoContours`] if the edge map produces
    /// no traceable contours.
    pub fn trace_contours(self) -> Result<ContoursTraced, PipelineError> {
        let traced = ContourTracerKind::default().trace(&self.edges);
        if traced.is_empty() {
            return Err(PipelineError::NoContours);
        }
        let contours = crate::canvas::fit_to_canvas(
            traced,
            self.edges.width(),
            self.edges.height(),
            self.settings.width,
            self.settings.height,
        );
        Ok(ContoursTraced {
            settings: self.settings,
            contours,
            used_colors: self.used_colors,
        })
    }
}

// ───────────────────────── Stage 4: ContoursTraced ───────────────────

/// Pipeline state after contour tracing, in canvas millimeters.
#[must_use = "pipeline stages are consumed by advancing -- call .plan() to continue"]
pub struct ContoursTraced {
    settings: ProcessingSettings,
    contours: Vec<Polyline>,
    used_colors: Vec<String>,
}

impl ContoursTraced {
    /// The traced contour polylines in canvas space.
    #[must_use]
    pub fn contours(&self) -> &[Polyline] {
        &self.contours
    }

    /// Plan underlay, fill and outline stitches.
    pub fn plan(self) -> Planned {
        let stitches = crate::planner::generate_stitches(&self.contours, &self.settings);
        Planned {
            settings: self.settings,
            stitches,
            used_colors: self.used_colors,
        }
    }
}

// ───────────────────────── Stage 5: Planned ──────────────────────────

/// Pipeline state after stitch planning.
#[must_use = "pipeline stages are consumed by advancing -- call .optimize() to continue"]
pub struct Planned {
    settings: ProcessingSettings,
    stitches: Vec<StitchPoint>,
    used_colors: Vec<String>,
}

impl Planned {
    /// The planned (unoptimized) stitch sequence.
    #[must_use]
    pub fn stitches(&self) -> &[StitchPoint] {
        &self.stitches
    }

    /// Remove redundant stitches and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCoordinates`] for non-finite
    /// coordinates and [`PipelineError::InsufficientStitches`] when
    /// fewer than [`MIN_STITCHES`] remain.
    pub fn optimize(self) -> Result<Optimized, PipelineError> {
        let stitches = crate::optimize::optimize_stitches(self.stitches)?;
        if stitches.len() < MIN_STITCHES {
            return Err(PipelineError::InsufficientStitches(format!(
                "{} stitches after optimization (need {MIN_STITCHES})",
                stitches.len(),
            )));
        }
        Ok(Optimized {
            settings: self.settings,
            stitches,
            used_colors: self.used_colors,
        })
    }
}

// ───────────────────────── Stage 6: Optimized ────────────────────────

/// Final pipeline state: an optimized stitch sequence ready to become a
/// pattern.
#[must_use = "call .into_pattern() to obtain the finished StitchPattern"]
pub struct Optimized {
    settings: ProcessingSettings,
    stitches: Vec<StitchPoint>,
    used_colors: Vec<String>,
}

impl Optimized {
    /// The optimized stitch sequence.
    #[must_use]
    pub fn stitches(&self) -> &[StitchPoint] {
        &self.stitches
    }

    /// Assemble the immutable [`StitchPattern`].
    ///
    /// The color list is the quantizer's first-appearance set; any
    /// stitch color missing from it (the outline color) is appended so
    /// every stitch color is represented.
    #[must_use]
    pub fn into_pattern(self) -> StitchPattern {
        let mut colors = self.used_colors;
        for stitch in &self.stitches {
            if !colors.contains(&stitch.color) {
                colors.push(stitch.color.clone());
            }
        }

        StitchPattern {
            stitches: self.stitches,
            colors,
            dimensions: PatternDimensions {
                width: self.settings.width,
                height: self.settings.height,
            },
            metadata: PatternMetadata {
                name: "broderie design".to_owned(),
                date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                format: "internal".to_owned(),
            },
        }
    }
}

// ──────────────────── Stage enum + uniform driving ───────────────────

/// Enum wrapping all pipeline stages for uniform, loopable access.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Quantized`].
    Quantized(Quantized),
    /// See [`Normalized`].
    Normalized(Normalized),
    /// See [`EdgesDetected`].
    EdgesDetected(EdgesDetected),
    /// See [`ContoursTraced`].
    ContoursTraced(ContoursTraced),
    /// See [`Planned`].
    Planned(Planned),
    /// See [`Optimized`].
    Optimized(Optimized),
}

impl Stage {
    /// Name of the stage the next [`advance`](Self::advance) will run,
    /// or `None` when the pipeline is complete.
    #[must_use]
    pub const fn next_stage_name(&self) -> Option<&'static str> {
        match self {
            Self::Pending(_) => Some(STAGE_NAMES[0]),
            Self::Quantized(_) => Some(STAGE_NAMES[1]),
            Self::Normalized(_) => Some(STAGE_NAMES[2]),
            Self::EdgesDetected(_) => Some(STAGE_NAMES[3]),
            Self::ContoursTraced(_) => Some(STAGE_NAMES[4]),
            Self::Planned(_) => Some(STAGE_NAMES[5]),
            Self::Optimized(_) => None,
        }
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Optimized(_))
    }

    /// Run one stage transition. A complete pipeline is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the failing stage's [`PipelineError`].
    pub fn advance(self) -> Result<Self, PipelineError> {
        Ok(match self {
            Self::Pending(s) => Self::Quantized(s.quantize()?),
            Self::Quantized(s) => Self::Normalized(s.normalize()?),
            Self::Normalized(s) => Self::EdgesDetected(s.detect_edges()?),
            Self::EdgesDetected(s) => Self::ContoursTraced(s.trace_contours()?),
            Self::ContoursTraced(s) => Self::Planned(s.plan()),
            Self::Planned(s) => Self::Optimized(s.optimize()?),
            Self::Optimized(s) => Self::Optimized(s),
        })
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

// ───────────────────────────── Converter ─────────────────────────────

/// Progress callback: stage name plus percent (0 on entry, 100 on
/// exit).
///
/// The converter invokes the callback from whichever thread drives it,
/// hence the `Send + Sync` bounds.
pub type ProgressFn = dyn Fn(&'static str, u8) + Send + Sync;

/// Drives the staged pipeline with progress reporting and cooperative
/// cancellation.
///
/// A converter owns no pipeline state and may be reused across
/// conversions, but a single conversion is strictly sequential -- do not
/// share one conversion's intermediate stages across threads.
#[derive(Default)]
pub struct Converter {
    on_progress: Option<Box<ProgressFn>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Converter {
    /// Create a converter with no progress reporting or cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(
        mut self,
        callback: impl Fn(&'static str, u8) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Attach a cancellation flag, checked between stages.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Convert an RGBA image into a stitch pattern.
    ///
    /// Settings are sanitized first; adjusted fields are logged. Stages
    /// then run in order, with progress reported at each boundary.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's [`PipelineError`], or
    /// [`PipelineError::Cancelled`] when the cancellation flag is set
    /// at a stage boundary. No partial pattern is ever returned.
    pub fn convert(
        &self,
        image: &RgbaImage,
        settings: &ProcessingSettings,
    ) -> Result<StitchPattern, PipelineError> {
        let (settings, adjusted) = crate::settings::sanitize(settings);
        if !adjusted.is_empty() {
            debug!("sanitized settings, adjusted fields: {adjusted:?}");
        }

        let mut stage: Stage = Pending::new(image.clone(), settings).into();
        while let Some(name) = stage.next_stage_name() {
            self.check_cancelled()?;
            self.report(name, 0);
            stage = stage.advance()?;
            self.report(name, 100);
        }
        self.check_cancelled()?;

        match stage {
            Stage::Optimized(done) => Ok(done.into_pattern()),
            // The loop above only exits once next_stage_name() is None,
            // which is the Optimized state.
            _ => Err(PipelineError::InvalidInput(
                "pipeline did not run to completion".to_owned(),
            )),
        }
    }

    fn report(&self, stage: &'static str, percent: u8) {
        if let Some(callback) = &self.on_progress {
            callback(stage, percent);
        }
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(PipelineError::Cancelled),
            _ => Ok(()),
        }
    }
}
