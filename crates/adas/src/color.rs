//! Colour space helpers
//!
//! Hue is stored on the 8-bit 0..180 scale (degrees / 2) used by the colour
//! ranges in [`crate::region`] and the tracker's hue histogram.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;

/// Convert one RGB pixel to `[hue 0..180, saturation 0..255, value 0..255]`
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta * 255.0 / max } else { 0.0 };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    [
        ((hue / 2.0).round() as u32 % 180) as u8,
        saturation.round() as u8,
        max as u8,
    ]
}

/// HSV image; channels hold hue (0..180), saturation and value
pub fn to_hsv(image: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        *dst = Rgb(rgb_to_hsv(*src));
    }
    out
}

fn luma(pixel: &Rgb<u8>) -> f32 {
    0.299 * f32::from(pixel[0]) + 0.587 * f32::from(pixel[1]) + 0.114 * f32::from(pixel[2])
}

/// Histogram-equalise luminance while keeping chroma
pub fn equalize_luminance(image: &RgbImage) -> RgbImage {
    let y = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luma(image.get_pixel(x, y)).round().clamp(0.0, 255.0) as u8])
    });
    let equalized = equalize_histogram(&y);

    let mut out = image.clone();
    for (x, y_pos, pixel) in out.enumerate_pixels_mut() {
        let shift = f32::from(equalized.get_pixel(x, y_pos)[0]) - luma(pixel);
        for c in pixel.0.iter_mut() {
            *c = (f32::from(*c) + shift).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
