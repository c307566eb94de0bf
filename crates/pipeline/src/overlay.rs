//! Overlay composition

use adas::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;

/// Raw candidate box
pub const CANDIDATE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
/// Active (classified or tracked) sign box
pub const ACTIVE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw a one-pixel box outline; empty boxes are skipped
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    if let Some(rect) = bbox.to_rect() {
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Equal-weight blend of two frames of the same size.
///
/// A mismatched `b` is ignored and `a` returned unchanged.
pub fn blend(a: &RgbImage, b: &RgbImage) -> RgbImage {
    if a.dimensions() != b.dimensions() {
        return a.clone();
    }
    let mut out = a.clone();
    for (o, p) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..3 {
            o.0[c] = ((u16::from(o.0[c]) + u16::from(p.0[c]) + 1) / 2) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_averages() {
        let a = RgbImage::from_pixel(4, 4, Rgb([200, 0, 11]));
        let b = RgbImage::from_pixel(4, 4, Rgb([100, 255, 0]));
        let out = blend(&a, &b);
        assert_eq!(out.get_pixel(2, 2), &Rgb([150, 128, 6]));
    }

    #[test]
    fn test_blend_size_mismatch() {
        let a = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        let b = RgbImage::new(2, 2);
        assert_eq!(blend(&a, &b), a);
    }

    #[test]
    fn test_draw_box_outline() {
        let mut image = RgbImage::new(20, 20);
        draw_box(&mut image, &BoundingBox::new(5, 5, 15, 12), ACTIVE_COLOR);
        assert_eq!(image.get_pixel(5, 5), &ACTIVE_COLOR);
        assert_eq!(image.get_pixel(14, 11), &ACTIVE_COLOR);
        assert_eq!(image.get_pixel(10, 8), &Rgb([0, 0, 0]));

        let before = image.clone();
        draw_box(&mut image, &BoundingBox::new(8, 8, 8, 8), CANDIDATE_COLOR);
        assert_eq!(image, before);
    }
}
