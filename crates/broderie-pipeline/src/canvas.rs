//! Pixel-to-canvas coordinate transform.
//!
//! Contours are traced in pixel coordinates of the working image, but
//! stitch planning operates in millimeters on the user's target canvas.
//! This transform scales each axis independently so the full image maps
//! onto the `width × height` mm canvas.
//!
//! No Y flip is applied: embroidery machine space is +Y-down, matching
//! image space.

use crate::types::{Point, Polyline};

/// Scale pixel-space contours onto a millimeter canvas.
///
/// `x` is scaled by `canvas_width / image_width` and `y` by
/// `canvas_height / image_height`. Zero image dimensions produce an
/// empty result (there is nothing to scale).
#[must_use]
pub fn fit_to_canvas(
    contours: Vec<Polyline>,
    image_width: u32,
    image_height: u32,
    canvas_width: f64,
    canvas_height: f64,
) -> Vec<Polyline> {
    if image_width == 0 || image_height == 0 {
        return Vec::new();
    }
    let scale_x = canvas_width / f64::from(image_width);
    let scale_y = canvas_height / f64::from(image_height);

    contours
        .into_iter()
        .map(|polyline| {
            let points: Vec<Point> = polyline
                .into_points()
                .into_iter()
                .map(|p| Point::new(p.x * scale_x, p.y * scale_y))
                .collect();
            Polyline::new(points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_canvas_matches_image() {
        let contours = vec![Polyline::new(vec![Point::new(3.0, 4.0)])];
        let result = fit_to_canvas(contours.clone(), 100, 100, 100.0, 100.0);
        assert_eq!(result, contours);
    }

    #[test]
    fn axes_scale_independently() {
        let contours = vec![Polyline::new(vec![Point::new(200.0, 50.0)])];
        let result = fit_to_canvas(contours, 400, 100, 100.0, 50.0);
        let p = result[0].points()[0];
        assert!((p.x - 50.0).abs() < 1e-10);
        assert!((p.y - 25.0).abs() < 1e-10);
    }

    #[test]
    fn image_corner_maps_to_canvas_corner() {
        let contours = vec![Polyline::new(vec![Point::new(640.0, 480.0)])];
        let result = fit_to_canvas(contours, 640, 480, 120.0, 90.0);
        let p = result[0].points()[0];
        assert!((p.x - 120.0).abs() < 1e-10);
        assert!((p.y - 90.0).abs() < 1e-10);
    }

    #[test]
    fn zero_image_dimension_yields_empty() {
        let contours = vec![Polyline::new(vec![Point::new(1.0, 1.0)])];
        assert!(fit_to_canvas(contours, 0, 10, 100.0, 100.0).is_empty());
    }
}
