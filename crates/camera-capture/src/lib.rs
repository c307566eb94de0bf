//! Camera Capture Library
//!
//! Frame acquisition and persistence for the road-facing camera:
//! - `VideoFrame`: decoded RGB frame with sequence and timestamp
//! - `FrameSource`: blocking frame-by-frame input (end of stream = `None`)
//! - `FrameRecorder`: session recording at a fixed target resolution

pub mod frame;
pub mod recorder;
pub mod source;

pub use frame::VideoFrame;
pub use recorder::FrameRecorder;
pub use source::{FrameSource, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Recording error: {0}")]
    Record(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::Open(err.to_string())
    }
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding the frame sequence
    pub path: String,
    /// Working width every frame is resized to
    pub width: u32,
    /// Working height every frame is resized to
    pub height: u32,
    /// Nominal frame rate, used to stamp frames
    pub fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "frames".to_string(),
            width: 720,
            height: 480,
            fps: 30,
        }
    }
}
