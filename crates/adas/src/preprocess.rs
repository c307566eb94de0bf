//! Sign candidate pre-processing
//!
//! Equalised frame -> Laplacian-of-Gaussian edge map -> adaptive binarisation
//! -> small-component removal.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::color::equalize_luminance;

/// Smoothing applied before colour and edge analysis (3x3 kernel equivalent)
pub const BLUR_SIGMA: f32 = 0.8;

const LAPLACIAN_SCALE: i32 = 3;
const LAPLACIAN_OFFSET: i32 = 2;

const ADAPTIVE_BLOCK: u32 = 11;
const ADAPTIVE_C: f32 = 2.0;

/// Blurred, Laplacian-filtered grey image, scaled and saturated to u8
pub fn laplacian_of_gaussian(image: &RgbImage) -> GrayImage {
    let blurred = gaussian_blur_f32(image, BLUR_SIGMA);
    let gray = image::imageops::grayscale(&blurred);
    let laplacian = laplacian_filter(&gray);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = i32::from(laplacian.get_pixel(x, y)[0]) * LAPLACIAN_SCALE + LAPLACIAN_OFFSET;
        Luma([v.clamp(0, 255) as u8])
    })
}

/// Gaussian-weighted adaptive threshold: a pixel is set when it is brighter
/// than its neighbourhood mean minus `c`
pub fn adaptive_binarize(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local = gaussian_blur_f32(gray, sigma);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = f32::from(gray.get_pixel(x, y)[0]);
        let mean = f32::from(local.get_pixel(x, y)[0]);
        if v > mean - c {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Drop 8-connected foreground components with fewer than `min_size` pixels
pub fn remove_small_components(binary: &GrayImage, min_size: u32) -> GrayImage {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0u32; max_label + 1];
    for p in labels.pixels() {
        sizes[p[0] as usize] += 1;
    }

    GrayImage::from_fn(binary.width(), binary.height(), |x, y| {
        let label = labels.get_pixel(x, y)[0] as usize;
        if label > 0 && sizes[label] >= min_size {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Full chain from a raw frame to the cleaned binary edge map
pub fn sign_edge_map(frame: &RgbImage, min_component_size: u32) -> GrayImage {
    let equalized = equalize_luminance(frame);
    let log = laplacian_of_gaussian(&equalized);
    let binary = adaptive_binarize(&log, ADAPTIVE_BLOCK, ADAPTIVE_C);
    remove_small_components(&binary, min_component_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_flat_image_has_constant_log() {
        let img = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let log = laplacian_of_gaussian(&img);
        assert!(log.pixels().all(|p| p[0] == LAPLACIAN_OFFSET as u8));
    }

    #[test]
    fn test_adaptive_threshold_marks_flat_regions() {
        let gray = GrayImage::from_pixel(20, 20, Luma([40]));
        let binary = adaptive_binarize(&gray, 11, 2.0);
        assert!(binary.pixels().all(|p| p[0] == 255));

        // A dark dot in a bright field falls below the local mean
        let mut gray = GrayImage::from_pixel(20, 20, Luma([200]));
        gray.put_pixel(10, 10, Luma([0]));
        let binary = adaptive_binarize(&gray, 11, 2.0);
        assert_eq!(binary.get_pixel(10, 10)[0], 0);
        assert_eq!(binary.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_small_components_removed() {
        let mut binary = GrayImage::new(40, 40);
        // 5x5 blob (25 px) and 20x20 blob (400 px)
        for y in 0..5 {
            for x in 0..5 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 15..35 {
            for x in 15..35 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }

        let cleaned = remove_small_components(&binary, 300);
        assert_eq!(cleaned.get_pixel(2, 2)[0], 0);
        assert_eq!(cleaned.get_pixel(20, 20)[0], 255);
        assert_eq!(cleaned.pixels().filter(|p| p[0] > 0).count(), 400);
    }
}
