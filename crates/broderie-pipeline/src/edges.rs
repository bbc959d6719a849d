//! Sobel edge detection with density guards and non-maximum
//! suppression.
//!
//! Produces a binary edge map (255 = edge, 0 = background) from the
//! normalized bitmap. Two guards reject images that cannot produce a
//! usable stitch pattern: an empty edge map and an edge map covering
//! more than half of the interior. Non-maximum suppression then thins
//! the surviving edges by comparing Sobel magnitudes across the
//! 8-neighborhood.

use image::{GrayImage, RgbaImage};
use log::debug;

use crate::types::PipelineError;

/// Minimum image dimension accepted by the detector.
pub const MIN_DIMENSION: u32 = 3;
/// Minimum number of edge pixels that must survive suppression.
pub const MIN_EDGE_PIXELS: usize = 100;
/// Maximum fraction of interior pixels that may be edges.
pub const MAX_EDGE_RATIO: f64 = 0.5;

type Kernel3 = [[f64; 3]; 3];

const SOBEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Detect edges in an RGBA image.
///
/// The image is reduced to BT.601 luminance, convolved with the 3×3
/// Sobel kernels over its interior, and thresholded on gradient
/// magnitude. Surviving pixels are thinned by non-maximum suppression:
/// a pixel is kept only when its magnitude is at least that of every
/// 8-neighbor.
///
/// # Errors
///
/// - [`PipelineError::InvalidInput`] for images under 3×3.
/// - [`PipelineError::InsufficientEdges`] when thresholding yields no
///   edge pixels, or fewer than [`MIN_EDGE_PIXELS`] survive suppression.
/// - [`PipelineError::TooManyEdges`] when more than [`MAX_EDGE_RATIO`]
///   of the interior is edges.
pub fn detect_edges(image: &RgbaImage, threshold: u8) -> Result<GrayImage, PipelineError> {
    let (width, height) = (image.width(), image.height());
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(PipelineError::InvalidInput(format!(
            "image must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {width}x{height}",
        )));
    }

    let luma = luminance_plane(image);
    let magnitude = sobel_magnitude(&luma, width as usize, height as usize);

    let cutoff = f64::from(threshold);
    let mut edges = GrayImage::new(width, height);
    let mut edge_pixels = 0usize;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if magnitude[(y * width + x) as usize] > cutoff {
                edges.put_pixel(x, y, image::Luma([255]));
                edge_pixels += 1;
            }
        }
    }

    if edge_pixels == 0 {
        return Err(PipelineError::InsufficientEdges(
            "no pixels above the gradient threshold".to_owned(),
        ));
    }

    let interior = ((width - 2) * (height - 2)) as usize;
    #[allow(clippy::cast_precision_loss)]
    let ratio = edge_pixels as f64 / interior as f64;
    if ratio > MAX_EDGE_RATIO {
        return Err(PipelineError::TooManyEdges(format!(
            "{:.0}% of interior pixels are edges",
            ratio * 100.0,
        )));
    }

    let thinned = suppress_non_maxima(&edges, &magnitude);
    let remaining = thinned.pixels().filter(|p| p.0[0] > 0).count();
    debug!("detect_edges: {edge_pixels} edge pixels, {remaining} after suppression");

    if remaining < MIN_EDGE_PIXELS {
        return Err(PipelineError::InsufficientEdges(format!(
            "only {remaining} edge pixels after suppression (need {MIN_EDGE_PIXELS})",
        )));
    }

    Ok(thinned)
}

/// BT.601 luminance plane, row-major.
fn luminance_plane(image: &RgbaImage) -> Vec<f64> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0;
            0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
        })
        .collect()
}

/// Sobel gradient magnitude over interior pixels; the 1-pixel border is
/// left at zero.
fn sobel_magnitude(luma: &[f64], width: usize, height: usize) -> Vec<f64> {
    let mut magnitude = vec![0.0; width * height];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, (row_x, row_y)) in SOBEL_X.iter().zip(&SOBEL_Y).enumerate() {
                for kx in 0..3 {
                    let sample = luma[(y + ky - 1) * width + (x + kx - 1)];
                    gx += sample * row_x[kx];
                    gy += sample * row_y[kx];
                }
            }
            magnitude[y * width + x] = gx.hypot(gy);
        }
    }
    magnitude
}

/// Clear every edge pixel whose magnitude is exceeded by any of its
/// 8 neighbors.
fn suppress_non_maxima(edges: &GrayImage, magnitude: &[f64]) -> GrayImage {
    let (width, height) = (edges.width(), edges.height());
    GrayImage::from_fn(width, height, |x, y| {
        if edges.get_pixel(x, y).0[0] == 0 {
            return image::Luma([0]);
        }
        let own = magnitude[(y * width + x) as usize];
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = i64::from(x) + dx;
                let ny = i64::from(y) + dy;
                if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let neighbor = magnitude[(ny as u32 * width + nx as u32) as usize];
                if own < neighbor {
                    return image::Luma([0]);
                }
            }
        }
        image::Luma([255])
    })
}
