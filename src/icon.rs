use std::num::NonZeroU32;

use image::{Rgba, RgbaImage};

use crate::models::Rgb;

/// Render the base sprite: a transparent square canvas with a filled ellipse
/// inscribed in the box `[padding, size - padding]` (inclusive pixel bounds).
pub fn render_base(size: NonZeroU32, fill: Rgb, padding: u32) -> RgbaImage {
    let size = size.get();
    let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));

    let x0 = padding;
    let x1 = size.saturating_sub(padding);
    if x1 < x0 || x0 >= size {
        return canvas;
    }
    let x1 = x1.min(size - 1);

    // Continuous extent of the pixel box, sampled at pixel centers
    let lo = x0 as f32;
    let hi = (x1 + 1) as f32;
    let c = (lo + hi) * 0.5;
    let r = (hi - lo) * 0.5;
    let color = fill.opaque();

    for y in x0..=x1 {
        let dy = (y as f32 + 0.5 - c) / r;
        for x in x0..=x1 {
            let dx = (x as f32 + 0.5 - c) / r;
            if dx * dx + dy * dy <= 1.0 {
                canvas.put_pixel(x, y, color);
            }
        }
    }

    canvas
}

/// Inclusive bounding box `(min_x, min_y, max_x, max_y)` of pixels matching `pred`.
pub fn bounding_box<F>(img: &RgbaImage, pred: F) -> Option<(u32, u32, u32, u32)>
where
    F: Fn(&Rgba<u8>) -> bool,
{
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in img.enumerate_pixels() {
        if !pred(px) {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
        });
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn canvas_matches_requested_size() {
        for s in [1, 2, 15, 16, 100, 333, 1024] {
            let img = render_base(nz(s), Rgb::GREEN, 0);
            assert_eq!(img.dimensions(), (s, s));
        }
    }

    #[test]
    fn padded_ellipse_spans_expected_box() {
        let img = render_base(nz(1024), Rgb::GREEN, 50);
        let bbox = bounding_box(&img, |p| p[3] > 0);
        assert_eq!(bbox, Some((50, 50, 974, 974)));
    }

    #[test]
    fn ellipse_is_opaque_fill_and_corners_transparent() {
        let img = render_base(nz(256), Rgb::LIGHT_GREEN, 10);
        assert_eq!(*img.get_pixel(128, 128), Rgba([144, 238, 144, 255]));
        for (x, y) in [(0, 0), (255, 0), (0, 255), (255, 255), (20, 20)] {
            assert_eq!(img.get_pixel(x, y)[3], 0, "({x},{y}) should be transparent");
        }
        assert!(img.pixels().all(|p| p[3] == 0 || p[3] == 255));
    }

    #[test]
    fn oversized_padding_leaves_canvas_empty() {
        let img = render_base(nz(64), Rgb::GREEN, 40);
        assert!(img.pixels().all(|p| p[3] == 0));
    }
}
