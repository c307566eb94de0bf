//! Sign colour region mask
//!
//! Keeps blue, white and black sign surfaces plus light grey, drops dark
//! clouds from that set and removes foliage green.

use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::color::rgb_to_hsv;
use crate::preprocess::BLUR_SIGMA;

/// Inclusive HSV box on the 0..180 hue scale
#[derive(Debug, Clone, Copy)]
struct HsvRange {
    lower: [u8; 3],
    upper: [u8; 3],
}

impl HsvRange {
    const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

const BLUE: HsvRange = HsvRange::new([100, 128, 0], [179, 255, 255]);
const WHITE: HsvRange = HsvRange::new([0, 0, 128], [255, 255, 255]);
const BLACK: HsvRange = HsvRange::new([0, 0, 0], [170, 150, 50]);
const DARK_CLOUD: HsvRange = HsvRange::new([0, 0, 30], [180, 255, 100]);
const LIGHT_GRAY: HsvRange = HsvRange::new([0, 0, 150], [180, 30, 255]);
const FOLIAGE: HsvRange = HsvRange::new([40, 40, 40], [80, 255, 255]);

/// Whether one HSV pixel can belong to a sign
pub fn is_sign_color(hsv: [u8; 3]) -> bool {
    let surface = (BLUE.contains(hsv) || WHITE.contains(hsv) || BLACK.contains(hsv))
        && !DARK_CLOUD.contains(hsv);
    surface || LIGHT_GRAY.contains(hsv) || !FOLIAGE.contains(hsv)
}

/// Binary mask (255 = candidate sign colour) of a blurred frame
pub fn sign_color_mask(frame: &RgbImage) -> GrayImage {
    let blurred = gaussian_blur_f32(frame, BLUR_SIGMA);
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if is_sign_color(rgb_to_hsv(*blurred.get_pixel(x, y))) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
