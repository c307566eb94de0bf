//! Session recording
//!
//! Each session is encoded into a single video file named after its start
//! time. The default build encodes an animated GIF with the `image` codecs;
//! the `opencv` feature switches to an XVID AVI through `VideoWriter`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, DynamicImage, Frame, RgbImage};
use tracing::{info, warn};

use crate::CameraError;

/// Frame sink of one encoded video stream
pub trait VideoEncoder: Send {
    /// Append a frame already at the stream resolution
    fn encode(&mut self, frame: &RgbImage) -> Result<(), CameraError>;

    /// Write trailers and close the file
    fn finish(self: Box<Self>) -> Result<(), CameraError>;
}

/// Looping animated GIF
pub struct GifVideoEncoder {
    encoder: GifEncoder<BufWriter<File>>,
    delay: Delay,
    path: PathBuf,
}

impl GifVideoEncoder {
    /// Quantiser speed, 1 (best) to 30 (fastest)
    const SPEED: i32 = 30;

    pub fn create(path: &Path, fps: u32) -> Result<Self, CameraError> {
        let file = File::create(path).map_err(|e| record_error(path, e))?;
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), Self::SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| record_error(path, e))?;

        Ok(Self {
            encoder,
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            path: path.to_path_buf(),
        })
    }
}

impl VideoEncoder for GifVideoEncoder {
    fn encode(&mut self, frame: &RgbImage) -> Result<(), CameraError> {
        let rgba = DynamicImage::ImageRgb8(frame.clone()).into_rgba8();
        self.encoder
            .encode_frame(Frame::from_parts(rgba, 0, 0, self.delay))
            .map_err(|e| record_error(&self.path, e))
    }

    fn finish(self: Box<Self>) -> Result<(), CameraError> {
        // The trailer is written when the encoder drops
        drop(self.encoder);
        Ok(())
    }
}

#[cfg(feature = "opencv")]
mod xvid {
    use std::path::Path;

    use image::RgbImage;
    use opencv::core::{Mat, Size};
    use opencv::prelude::*;
    use opencv::videoio::VideoWriter;

    use super::VideoEncoder;
    use crate::CameraError;

    /// XVID-compressed AVI
    pub struct XvidEncoder {
        writer: VideoWriter,
    }

    impl XvidEncoder {
        pub fn create(path: &Path, fps: u32, width: u32, height: u32) -> Result<Self, CameraError> {
            let fourcc = VideoWriter::fourcc('X', 'V', 'I', 'D').map_err(cv_error)?;
            let writer = VideoWriter::new(
                &path.to_string_lossy(),
                fourcc,
                f64::from(fps.max(1)),
                Size::new(width as i32, height as i32),
                true,
            )
            .map_err(cv_error)?;

            if !writer.is_opened().map_err(cv_error)? {
                return Err(CameraError::Record(format!(
                    "{}: XVID writer failed to open",
                    path.display()
                )));
            }
            Ok(Self { writer })
        }
    }

    impl VideoEncoder for XvidEncoder {
        fn encode(&mut self, frame: &RgbImage) -> Result<(), CameraError> {
            let bgr: Vec<u8> = frame.pixels().flat_map(|p| [p[2], p[1], p[0]]).collect();
            let flat = Mat::from_slice(&bgr).map_err(cv_error)?;
            let mat = flat
                .reshape(3, frame.height() as i32)
                .map_err(cv_error)?
                .try_clone()
                .map_err(cv_error)?;
            self.writer.write(&mat).map_err(cv_error)
        }

        fn finish(mut self: Box<Self>) -> Result<(), CameraError> {
            self.writer.release().map_err(cv_error)
        }
    }

    fn cv_error(e: opencv::Error) -> CameraError {
        CameraError::Record(e.to_string())
    }
}

/// Encodes annotated frames of one session at a fixed target resolution
pub struct FrameRecorder {
    encoder: Option<Box<dyn VideoEncoder>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FrameRecorder {
    /// Container extension of the compiled-in encoder
    pub const EXTENSION: &'static str = if cfg!(feature = "opencv") { "avi" } else { "gif" };

    /// File stem for a session started at `started`
    pub fn session_name(started: DateTime<Local>) -> String {
        format!("front_adas_{}", started.format("%Y%m%d_%H%M%S"))
    }

    /// Open `<base>/front_adas_<timestamp>.<ext>` for a `width`×`height` stream
    pub fn create(
        base: impl AsRef<Path>,
        started: DateTime<Local>,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, CameraError> {
        let base = base.as_ref();
        std::fs::create_dir_all(base).map_err(|e| record_error(base, e))?;
        let path = base.join(format!("{}.{}", Self::session_name(started), Self::EXTENSION));

        #[cfg(feature = "opencv")]
        let encoder: Box<dyn VideoEncoder> = Box::new(xvid::XvidEncoder::create(&path, fps, width, height)?);
        #[cfg(not(feature = "opencv"))]
        let encoder: Box<dyn VideoEncoder> = Box::new(GifVideoEncoder::create(&path, fps)?);

        info!("Recording started: {} ({}x{} @ {} fps)", path.display(), width, height, fps);
        Ok(Self {
            encoder: Some(encoder),
            path,
            width,
            height,
            frames_written: 0,
        })
    }

    /// Append one frame, resizing it to the stream resolution if needed
    pub fn write(&mut self, frame: &RgbImage) -> Result<(), CameraError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CameraError::Record(format!("{}: already finished", self.path.display())))?;

        if frame.dimensions() == (self.width, self.height) {
            encoder.encode(frame)?;
        } else {
            encoder.encode(&imageops::resize(frame, self.width, self.height, FilterType::Triangle))?;
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Output file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the stream and return the output file
    pub fn finish(mut self) -> Result<PathBuf, CameraError> {
        if let Some(encoder) = self.encoder.take() {
            encoder.finish()?;
        }
        info!("Recording finished: {} ({} frames)", self.path.display(), self.frames_written);
        Ok(self.path.clone())
    }
}

impl Drop for FrameRecorder {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            if let Err(e) = encoder.finish() {
                warn!("Closing recording {} failed: {}", self.path.display(), e);
            }
        }
    }
}

fn record_error(path: &Path, e: impl std::fmt::Display) -> CameraError {
    CameraError::Record(format!("{}: {}", path.display(), e))
}
