//! Moment-based shear correction

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_with, Interpolation};
use tracing::trace;

use crate::moments::RasterMoments;

/// Below this |mu02| the image is returned unchanged
const MIN_MU02: f64 = 1e-2;

/// Remove horizontal shear estimated from the second-order central moments.
///
/// Output pixel (x, y) samples the input at `(x + skew * (y - h / 2), y)` where
/// `skew = mu11 / mu02`; pixels mapped outside the input are black.
pub fn deskew(image: &GrayImage) -> GrayImage {
    let m = RasterMoments::of_image(image);
    if m.mu02.abs() < MIN_MU02 {
        return image.clone();
    }

    let skew = (m.mu11 / m.mu02) as f32;
    let half = image.height() as f32 * 0.5;
    trace!("Deskew with shear {:.4}", skew);

    warp_with(
        image,
        move |x, y| (x + skew * (y - half), y),
        Interpolation::Bilinear,
        Luma([0]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slanted_bar(size: u32, slope: f32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        let half = size as f32 * 0.5;
        for y in 4..size - 4 {
            let cx = half + slope * (y as f32 - half);
            for dx in -2..=2 {
                let x = (cx + dx as f32).round() as i32;
                if x >= 0 && (x as u32) < size {
                    img.put_pixel(x as u32, y, Luma([255]));
                }
            }
        }
        img
    }

    #[test]
    fn test_flat_image_unchanged() {
        let img = GrayImage::from_pixel(32, 32, Luma([0]));
        assert_eq!(deskew(&img), img);
    }

    #[test]
    fn test_reduces_shear() {
        let img = slanted_bar(32, 0.4);
        let before = RasterMoments::of_image(&img);
        let after = RasterMoments::of_image(&deskew(&img));

        let skew_before = (before.mu11 / before.mu02).abs();
        let skew_after = (after.mu11 / after.mu02).abs();
        assert!(skew_after < skew_before * 0.5, "{} -> {}", skew_before, skew_after);
    }
}
