//! Color quantization: snap every pixel to the nearest thread color.
//!
//! This is the first pipeline stage. Each pixel of the source RGBA
//! buffer is replaced by the closest entry of the fixed thread palette
//! (see [`crate::palette`]); the set of thread colors actually used is
//! collected in order of first appearance for the finished pattern's
//! color list.

use image::RgbaImage;
use log::debug;

use crate::palette::{self, ThreadColor};
use crate::types::{ColorMode, PipelineError};

/// Quantize an RGBA image against the thread palette.
///
/// In [`ColorMode::Grayscale`] each pixel is first reduced to its BT.601
/// luminance `0.299R + 0.587G + 0.114B` and matched as a neutral
/// `(Y, Y, Y)` triple against the gray ramp. In [`ColorMode::Color`] the
/// RGB triple is matched directly against the full palette.
///
/// Returns the quantized image (alpha preserved) and the hex colors
/// used, in order of first appearance.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] when the image has a zero
/// dimension.
pub fn quantize(
    image: &RgbaImage,
    mode: ColorMode,
) -> Result<(RgbaImage, Vec<String>), PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "image has zero dimension ({}x{})",
            image.width(),
            image.height(),
        )));
    }

    let mut quantized = RgbaImage::new(image.width(), image.height());
    let mut used: Vec<String> = Vec::new();

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let thread = match_pixel([r, g, b], mode);

        let hex = thread.hex();
        if !used.contains(&hex) {
            used.push(hex);
        }

        let [tr, tg, tb] = thread.rgb;
        quantized.put_pixel(x, y, image::Rgba([tr, tg, tb, a]));
    }

    debug!(
        "quantized {}x{} image to {} thread color(s)",
        image.width(),
        image.height(),
        used.len(),
    );

    Ok((quantized, used))
}

/// Match a single RGB triple against the palette per the color mode.
fn match_pixel(rgb: [u8; 3], mode: ColorMode) -> &'static ThreadColor {
    match mode {
        ColorMode::Grayscale => {
            let y = luminance_bt601(rgb);
            palette::nearest_thread([y, y, y], ColorMode::Grayscale)
        }
        ColorMode::Color => palette::nearest_thread(rgb, ColorMode::Color),
    }
}

/// BT.601 luminance, rounded to the nearest integer level.
fn luminance_bt601([r, g, b]: [u8; 3]) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        y.round().clamp(0.0, 255.0) as u8
    }
}
