//! Video frame types and processing

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// View the frame as an image buffer (None if the buffer length is inconsistent)
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Consume the frame into an image buffer
    pub fn into_rgb_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }

    /// Resize frame using bilinear interpolation
    pub fn resize(&self, new_width: u32, new_height: u32) -> Option<VideoFrame> {
        if self.width == new_width && self.height == new_height {
            return Some(self.clone());
        }
        let image = self.to_rgb_image()?;
        let resized = imageops::resize(&image, new_width, new_height, FilterType::Triangle);
        Some(VideoFrame::from_rgb_image(resized, self.timestamp_ns, self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_access() {
        let mut data = vec![0u8; 4 * 2 * 3];
        data[(1 * 4 + 2) * 3] = 200;
        let frame = VideoFrame::new(data, 4, 2, 0, 0);

        assert_eq!(frame.get_pixel(2, 1), Some([200, 0, 0]));
        assert_eq!(frame.get_pixel(4, 0), None);
    }

    #[test]
    fn test_resize_dimensions() {
        let frame = VideoFrame::new(vec![128u8; 100 * 50 * 3], 100, 50, 7, 3);
        let resized = frame.resize(720, 480).unwrap();

        assert_eq!((resized.width, resized.height), (720, 480));
        assert_eq!(resized.data.len(), 720 * 480 * 3);
        assert_eq!(resized.sequence, 3);
    }

    #[test]
    fn test_inconsistent_buffer_rejected() {
        let frame = VideoFrame::new(vec![0u8; 10], 4, 4, 0, 0);
        assert!(frame.to_rgb_image().is_none());
    }
}
