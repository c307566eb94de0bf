//! Raster Moments

use image::GrayImage;

/// Spatial and central moments of an intensity field, up to second order
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RasterMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl RasterMoments {
    /// Moments of the whole image
    pub fn of_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::of_region(image, 0, 0, width, height)
    }

    /// Moments of a rectangular region, with coordinates relative to its origin.
    ///
    /// The region is clipped to the image.
    pub fn of_region(image: &GrayImage, x0: u32, y0: u32, width: u32, height: u32) -> Self {
        let x_end = x0.saturating_add(width).min(image.width());
        let y_end = y0.saturating_add(height).min(image.height());

        let mut m = RasterMoments::default();
        for y in y0..y_end {
            let ry = f64::from(y - y0);
            for x in x0..x_end {
                let v = f64::from(image.get_pixel(x, y)[0]);
                if v == 0.0 {
                    continue;
                }
                let rx = f64::from(x - x0);
                m.m00 += v;
                m.m10 += v * rx;
                m.m01 += v * ry;
                m.m20 += v * rx * rx;
                m.m11 += v * rx * ry;
                m.m02 += v * ry * ry;
            }
        }
        m.with_central()
    }

    fn with_central(mut self) -> Self {
        if self.m00 > 0.0 {
            let cx = self.m10 / self.m00;
            let cy = self.m01 / self.m00;
            self.mu20 = self.m20 - cx * self.m10;
            self.mu11 = self.m11 - cx * self.m01;
            self.mu02 = self.m02 - cy * self.m01;
        }
        self
    }

    /// Centre of mass, if the field has any mass
    pub fn centroid(&self) -> Option<(f64, f64)> {
        (self.m00 > f64::EPSILON).then(|| (self.m10 / self.m00, self.m01 / self.m00))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_centroid_of_block() {
        let mut img = GrayImage::new(10, 10);
        for y in 2..5 {
            for x in 6..9 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let m = RasterMoments::of_image(&img);
        let (cx, cy) = m.centroid().unwrap();
        assert!((cx - 7.0).abs() < 1e-9);
        assert!((cy - 3.0).abs() < 1e-9);
        // Symmetric block has no cross moment
        assert!(m.mu11.abs() < 1e-6);
    }

    #[test]
    fn test_region_is_relative_and_clipped() {
        let img = GrayImage::from_pixel(4, 4, Luma([1]));
        let m = RasterMoments::of_region(&img, 2, 2, 10, 10);
        assert_eq!(m.m00, 4.0);
        assert_eq!(m.centroid(), Some((0.5, 0.5)));
    }

    #[test]
    fn test_empty_field_has_no_centroid() {
        let img = GrayImage::new(5, 5);
        assert!(RasterMoments::of_image(&img).centroid().is_none());
    }
}
