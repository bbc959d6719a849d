//! broderie-export: Pure embroidery format serializers (sans-IO).
//!
//! Converts [`StitchPattern`] values into machine file format bytes.
//! The DST writer is the reference serializer; the remaining formats
//! (PES, JEF, EXP, VP3, HUS, PAT, QCC) share the same
//! `write(&StitchPattern) -> Result<Vec<u8>, ExportError>` contract.
//!
//! Use [`convert_to_format`] as the entry point: it validates the
//! pattern, snaps colors to the thread palette, enforces the per-format
//! ceilings and converts coordinates before dispatching to the
//! format-specific writer.

pub mod dst;
pub mod exp;
pub mod hus;
pub mod jef;
pub mod limits;
pub mod pat;
pub mod pes;
pub mod qcc;
pub mod vp3;

use broderie_pipeline::StitchPattern;
use log::debug;

pub use limits::FormatLimits;

/// Target machine file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbroideryFormat {
    /// Tajima DST -- the reference format.
    Dst,
    /// Brother PES.
    Pes,
    /// Janome JEF.
    Jef,
    /// Melco EXP.
    Exp,
    /// Pfaff VP3.
    Vp3,
    /// Husqvarna/Viking HUS.
    Hus,
    /// Gammill quilting PAT.
    Pat,
    /// Quilting QCC.
    Qcc,
}

impl EmbroideryFormat {
    /// All supported formats, DST first.
    pub const ALL: [Self; 8] = [
        Self::Dst,
        Self::Pes,
        Self::Jef,
        Self::Exp,
        Self::Vp3,
        Self::Hus,
        Self::Pat,
        Self::Qcc,
    ];

    /// Conventional file extension (lowercase, no dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Dst => "dst",
            Self::Pes => "pes",
            Self::Jef => "jef",
            Self::Exp => "exp",
            Self::Vp3 => "vp3",
            Self::Hus => "hus",
            Self::Pat => "pat",
            Self::Qcc => "qcc",
        }
    }
}

impl std::fmt::Display for EmbroideryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors that can occur while serializing a pattern.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Missing or malformed pattern data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A NaN or infinite coordinate was detected.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// The pattern exceeds the format's stitch, color or dimension
    /// ceiling.
    #[error("format limit exceeded: {0}")]
    FormatLimit(String),

    /// Internal failure inside a writer.
    #[error("encoding failure in {format} writer: {message}")]
    Encoding {
        /// File extension of the failing writer.
        format: &'static str,
        /// What went wrong.
        message: String,
    },
}

/// Serialize a pattern into the given format's byte layout.
///
/// Pipeline order: validate the pattern, snap every color to the
/// nearest thread-palette entry, check the per-format ceilings, then
/// dispatch. The DST writer performs its own coordinate normalization
/// and receives the pattern in source millimeters; every other writer
/// receives machine coordinates (integer 0.1 mm units, non-negative
/// origin).
///
/// # Errors
///
/// - [`ExportError::InvalidInput`] for an empty pattern, an empty color
///   list or non-positive dimensions.
/// - [`ExportError::InvalidCoordinates`] for NaN or infinite stitch
///   coordinates.
/// - [`ExportError::FormatLimit`] when a ceiling from
///   [`limits::limits_for`] is exceeded.
/// - [`ExportError::Encoding`] for internal writer failures.
pub fn convert_to_format(
    pattern: &StitchPattern,
    format: EmbroideryFormat,
) -> Result<Vec<u8>, ExportError> {
    validate_pattern(pattern)?;

    let snapped = limits::snap_to_palette(pattern);
    limits::check(&snapped, format)?;

    debug!(
        "serializing {} stitches to {format}",
        snapped.stitches.len(),
    );

    // DST normalizes coordinates itself; every other writer receives
    // the machine-coordinate conversion.
    let machine = || limits::to_machine(&snapped);
    match format {
        EmbroideryFormat::Dst => dst::write(&snapped),
        EmbroideryFormat::Pes => pes::write(&machine()),
        EmbroideryFormat::Jef => jef::write(&machine()),
        EmbroideryFormat::Exp => exp::write(&machine()),
        EmbroideryFormat::Vp3 => vp3::write(&machine()),
        EmbroideryFormat::Hus => hus::write(&machine()),
        EmbroideryFormat::Pat => pat::write(&machine()),
        EmbroideryFormat::Qcc => qcc::write(&machine()),
    }
}

/// Shared structural validation applied before any format work.
fn validate_pattern(pattern: &StitchPattern) -> Result<(), ExportError> {
    if pattern.stitches.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no stitches".to_owned(),
        ));
    }
    if !pattern.coordinates_finite() {
        return Err(ExportError::InvalidCoordinates(
            "pattern contains a non-finite stitch coordinate".to_owned(),
        ));
    }
    if pattern.colors.is_empty() {
        return Err(ExportError::InvalidInput(
            "pattern has no colors".to_owned(),
        ));
    }
    let dims = pattern.dimensions;
    if !(dims.width.is_finite() && dims.height.is_finite()) || dims.width <= 0.0 || dims.height <= 0.0 {
        return Err(ExportError::InvalidInput(format!(
            "pattern dimensions are invalid ({} x {})",
            dims.width, dims.height,
        )));
    }
    Ok(())
}
