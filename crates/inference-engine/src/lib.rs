//! Sign Model Inference
//!
//! Provides the trained-model contract consumed by the sign classifier
//! ("descriptor in, label out"), an ONNX implementation using tract-onnx,
//! and the class label table.

mod engine;
mod labels;

pub use engine::{OnnxSignModel, SignModel};
pub use labels::{LabelSet, DEFAULT_SIGN_LABELS};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: usize, actual: usize },
    #[error("Label file error: {0}")]
    LabelFile(String),
}
