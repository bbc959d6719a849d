//! Contour tracing: extract ordered polylines from a binary edge map.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime. Tracing itself returns an empty
//! vector when nothing is found; the orchestrator upgrades that to
//! [`PipelineError::NoContours`](crate::types::PipelineError::NoContours).

use image::GrayImage;

use crate::types::{Point, Polyline};

/// Selects which contour tracing algorithm to use.
///
/// Ships with [`BorderFollowing`](Self::BorderFollowing) only. A
/// Moore-neighbor variant can be added without changing the pipeline
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// On 1-pixel-wide suppressed edges this produces doubled borders;
    /// the stitch planner's spacing-based interpolation collapses them
    /// in practice.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary edge map (white pixels = edges, black = background).
/// Output: disconnected ordered polylines, one per connected edge chain.
pub trait ContourTracer {
    /// Trace contours in the given binary edge map.
    fn trace(&self, edges: &GrayImage) -> Vec<Polyline>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, edges: &GrayImage) -> Vec<Polyline> {
        match *self {
            Self::BorderFollowing => trace_border_following(edges),
        }
    }
}

/// Suzuki-Abe border following via `imageproc::contours::find_contours`.
///
/// Converts `imageproc` contour points (integer grid coordinates) into
/// floating-point [`Point`]s. Degenerate single-point contours are
/// dropped -- a stitch segment needs two endpoints.
fn trace_border_following(edges: &GrayImage) -> Vec<Polyline> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(edges);

    contours
        .into_iter()
        .filter(|c| c.points.len() >= 2)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Polyline::new(points)
        })
        .collect()
}
