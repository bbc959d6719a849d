//! Bitmap normalization: histogram equalization, grayscale reduction
//! and a single adaptive repair pass.
//!
//! The normalizer prepares the quantized image for edge detection. It
//! always equalizes and converts to grayscale, then applies exactly one
//! of three repairs chosen from the gray statistics:
//!
//! - a flat image (value span < [`FLAT_SPAN`]) gets gamma contrast
//!   enhancement,
//! - a very dark or very bright image gets a multiplicative brightness
//!   correction toward mid-gray,
//! - everything else gets a 3×3 median denoise.

use image::RgbaImage;
use log::debug;

use crate::types::PipelineError;

/// Minimum image dimension accepted by the normalizer.
pub const MIN_DIMENSION: u32 = 3;

/// Gray value span below which the image is considered flat.
const FLAT_SPAN: u8 = 20;
/// Mean luminance below which the image is considered too dark.
const DARK_MEAN: f64 = 20.0;
/// Mean luminance above which the image is considered too bright.
const BRIGHT_MEAN: f64 = 235.0;
/// Gamma used by the contrast repair.
const CONTRAST_GAMMA: f64 = 1.2;
/// Brightness repair target mean.
const TARGET_MEAN: f64 = 128.0;

/// Normalize an RGBA image for edge detection.
///
/// See the module docs for the stage sequence. The output is a
/// grayscale image stored as RGBA (`R == G == B`, alpha preserved).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] for images smaller than
/// 3×3.
pub fn normalize(image: &RgbaImage) -> Result<RgbaImage, PipelineError> {
    if image.width() < MIN_DIMENSION || image.height() < MIN_DIMENSION {
        return Err(PipelineError::InvalidInput(format!(
            "image must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {}x{}",
            image.width(),
            image.height(),
        )));
    }

    let equalized = equalize_histogram(image);
    let gray = to_gray_bt709(&equalized);

    let (min, max, mean) = gray_stats(&gray);
    let span = max - min;

    let repaired = if span < FLAT_SPAN {
        debug!("normalize: span {span} < {FLAT_SPAN}, applying contrast enhancement");
        enhance_contrast(&gray, min, max)
    } else if mean < DARK_MEAN || mean > BRIGHT_MEAN {
        debug!("normalize: mean {mean:.1} out of range, applying brightness adjustment");
        adjust_brightness(&gray, mean)
    } else {
        median_denoise(&gray)
    };

    Ok(repaired)
}

/// Histogram-equalize all three channels by the cumulative distribution
/// of the channel-averaged intensity.
///
/// A 256-bin histogram of `(R + G + B) / 3` is accumulated into a CDF,
/// and every channel value `v` is remapped through
/// `round((CDF[v] − CDFmin) / (CDFmax − CDFmin) × 255)`. When the CDF is
/// degenerate (single occupied bin) the image is returned unchanged.
fn equalize_histogram(image: &RgbaImage) -> RgbaImage {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        let [r, g, b, _] = pixel.0;
        let avg = (u32::from(r) + u32::from(g) + u32::from(b)) / 3;
        histogram[avg as usize] += 1;
    }

    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (bin, &count) in histogram.iter().enumerate() {
        running += count;
        cdf[bin] = running;
    }

    let cdf_min = cdf
        .iter()
        .copied()
        .find(|&c| c > 0)
        .unwrap_or_default();
    let cdf_max = cdf[255];
    if cdf_max == cdf_min {
        return image.clone();
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let remap = |v: u8| -> u8 {
        let num = (cdf[v as usize].saturating_sub(cdf_min)) as f64;
        let den = (cdf_max - cdf_min) as f64;
        (num / den * 255.0).round().clamp(0.0, 255.0) as u8
    };

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        image::Rgba([remap(r), remap(g), remap(b), a])
    })
}

/// Reduce to grayscale with BT.709 weights, preserving alpha.
fn to_gray_bt709(image: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let y709 = 0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = y709.round().clamp(0.0, 255.0) as u8;
        image::Rgba([v, v, v, a])
    })
}

/// Min, max and mean of the gray values (red channel of a gray RGBA).
fn gray_stats(gray: &RgbaImage) -> (u8, u8, f64) {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum = 0u64;
    for pixel in gray.pixels() {
        let v = pixel.0[0];
        min = min.min(v);
        max = max.max(v);
        sum += u64::from(v);
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / f64::from(gray.width() * gray.height());
    (min, max, mean)
}

/// Gamma-stretch a flat image across the full range.
///
/// `out = round(((v − min) / span)^(1/γ) × 255)` with γ = 1.2. A zero
/// span maps every pixel to zero.
fn enhance_contrast(gray: &RgbaImage, min: u8, max: u8) -> RgbaImage {
    let span = f64::from(max) - f64::from(min);
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let [v, _, _, a] = gray.get_pixel(x, y).0;
        let normalized = if span > 0.0 {
            (f64::from(v) - f64::from(min)) / span
        } else {
            0.0
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let out = (normalized.powf(1.0 / CONTRAST_GAMMA) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8;
        image::Rgba([out, out, out, a])
    })
}

/// Scale brightness toward mid-gray by the factor `128 / mean`.
fn adjust_brightness(gray: &RgbaImage, mean: f64) -> RgbaImage {
    let factor = TARGET_MEAN / mean;
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let [v, _, _, a] = gray.get_pixel(x, y).0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let out = (f64::from(v) * factor).round().clamp(0.0, 255.0) as u8;
        image::Rgba([out, out, out, a])
    })
}

/// 3×3 median filter over the window clamped to the image bounds.
///
/// Border pixels take the median of their in-bounds neighbors only
/// (4 or 6 samples), not of a padded window.
fn median_denoise(gray: &RgbaImage) -> RgbaImage {
    let (width, height) = (gray.width(), gray.height());
    RgbaImage::from_fn(width, height, |x, y| {
        let mut window: Vec<u8> = Vec::with_capacity(9);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = i64::from(x) + dx;
                let ny = i64::from(y) + dy;
                if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                window.push(gray.get_pixel(nx as u32, ny as u32).0[0]);
            }
        }
        window.sort_unstable();
        let median = window[window.len() / 2];
        let a = gray.get_pixel(x, y).0[3];
        image::Rgba([median, median, median, a])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gray_image(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = f(x, y);
            image::Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn tiny_image_is_rejected() {
        let img = RgbaImage::new(2, 2);
        assert!(matches!(
            normalize(&img),
            Err(PipelineError::InvalidInput(_)),
        ));
        let thin = RgbaImage::new(10, 2);
        assert!(matches!(
            normalize(&thin),
            Err(PipelineError::InvalidInput(_)),
        ));
    }

    #[test]
    fn minimum_size_is_accepted() {
        let img = gray_image(3, 3, |_, _| 128);
        assert!(normalize(&img).is_ok());
    }

    #[test]
    fn output_is_grayscale_with_alpha_preserved() {
        let img = RgbaImage::from_fn(8, 8, |x, y| {
            image::Rgba([(x * 30) as u8, (y * 30) as u8, 77, 200])
        });
        let out = normalize(&img).unwrap();
        for pixel in out.pixels() {
            let [r, g, b, a] = pixel.0;
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 200);
        }
    }

    #[test]
    fn uniform_image_takes_the_contrast_path() {
        // A uniform image has zero span; equalization leaves it alone
        // (degenerate CDF) and the contrast repair maps it to black.
        let img = gray_image(5, 5, |_, _| 128);
        let out = normalize(&img).unwrap();
        for pixel in out.pixels() {
            assert_eq!(pixel.0[0], 0);
        }
    }

    #[test]
    fn equalization_stretches_a_two_level_image() {
        let img = gray_image(8, 8, |x, _| if x < 4 { 100 } else { 140 });
        let out = equalize_histogram(&img);
        let lo = out.get_pixel(0, 0).0[0];
        let hi = out.get_pixel(7, 0).0[0];
        // Half the CDF mass sits at each level: the low level maps to 0
        // and the high level to 255.
        assert_eq!(lo, 0);
        assert_eq!(hi, 255);
    }

    #[test]
    fn contrast_enhancement_reaches_full_range() {
        let img = gray_image(4, 4, |x, _| if x == 0 { 100 } else { 110 });
        let out = enhance_contrast(&img, 100, 110);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn contrast_gamma_lifts_midtones() {
        // Midpoint 0.5^(1/1.2) ≈ 0.561 → brighter than linear.
        let img = gray_image(3, 3, |_, _| 50);
        let out = enhance_contrast(&img, 0, 100);
        let v = out.get_pixel(1, 1).0[0];
        assert!(v > 128, "expected gamma-lifted midtone, got {v}");
    }

    #[test]
    fn brightness_adjustment_scales_toward_mid_gray() {
        let img = gray_image(4, 4, |_, _| 10);
        let out = adjust_brightness(&img, 10.0);
        // 10 × (128 / 10) = 128.
        assert_eq!(out.get_pixel(0, 0).0[0], 128);
    }

    #[test]
    fn brightness_adjustment_clamps_at_white() {
        let img = gray_image(4, 4, |x, _| if x == 0 { 10 } else { 240 });
        let out = adjust_brightness(&img, 10.0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn median_removes_impulse_noise() {
        // A single bright pixel in a dark field disappears under the
        // 3×3 median.
        let img = gray_image(5, 5, |x, y| if x == 2 && y == 2 { 255 } else { 10 });
        let out = median_denoise(&img);
        assert_eq!(out.get_pixel(2, 2).0[0], 10);
    }

    #[test]
    fn median_uses_clamped_window_at_corners() {
        // Corner windows have 4 in-bounds samples; the upper median of
        // [10, 10, 10, 255] is 10.
        let img = gray_image(5, 5, |x, y| if x == 0 && y == 0 { 255 } else { 10 });
        let out = median_denoise(&img);
        assert_eq!(out.get_pixel(0, 0).0[0], 10);
    }
}
