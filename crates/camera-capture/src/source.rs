//! Frame sources

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{CameraError, VideoFrame};

/// Extensions recognised by [`ImageSequenceSource`]
const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

/// Blocking frame-by-frame video input.
///
/// `Ok(None)` marks a normal end of stream.
pub trait FrameSource {
    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// File-backed source that replays a directory of still frames in lexical order
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
    sequence: u32,
    frame_interval_ns: u64,
}

impl ImageSequenceSource {
    /// Open a directory of frames
    pub fn open(dir: impl AsRef<Path>, fps: u32) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();

        info!("Opened frame sequence {} ({} frames)", dir.display(), paths.len());

        Ok(Self {
            pending: paths.into(),
            sequence: 0,
            frame_interval_ns: 1_000_000_000 / u64::from(fps.max(1)),
        })
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path)
            .map_err(|e| CameraError::Stream(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        let sequence = self.sequence;
        self.sequence += 1;
        debug!("Read frame {} from {}", sequence, path.display());

        Ok(Some(VideoFrame::from_rgb_image(
            image,
            u64::from(sequence) * self.frame_interval_ns,
            sequence,
        )))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_replays_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for (i, shade) in [10u8, 20, 30].iter().enumerate() {
            let img = RgbImage::from_pixel(8, 6, Rgb([*shade, 0, 0]));
            img.save(dir.path().join(format!("frame_{:03}.png", i))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 30).unwrap();
        assert_eq!(source.remaining(), 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(first.get_pixel(0, 0), Some([10, 0, 0]));

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), Some([20, 0, 0]));
        assert!(second.timestamp_ns > first.timestamp_ns);

        source.next_frame().unwrap().unwrap();
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_directory() {
        let result = ImageSequenceSource::open("/nonexistent/frames", 30);
        assert!(matches!(result, Err(CameraError::Open(_))));
    }
}
