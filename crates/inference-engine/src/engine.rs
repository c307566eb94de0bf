//! Sign Model Implementation

use std::path::Path;

use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::InferenceError;

/// Trained multi-class classifier: maps a fixed-size descriptor to a raw class index.
///
/// The raw index is not range-checked here; callers clamp it to their label table.
pub trait SignModel: Send + Sync {
    /// Predict the class index for one descriptor
    fn predict(&self, descriptor: &[f32]) -> Result<i64, InferenceError>;
}

/// ONNX classifier executed with tract.
///
/// The graph takes a `[1, N]` f32 input and returns either an integer label
/// tensor or a float score vector (arg-max is taken). Classifiers exported
/// from scikit-learn must be converted without the ZipMap output.
pub struct OnnxSignModel {
    plan: TypedRunnableModel<TypedModel>,
    input_len: usize,
    model_path: String,
}

impl OnnxSignModel {
    /// Load and optimise the model for descriptors of `input_len` values
    pub fn load(path: impl AsRef<Path>, input_len: usize) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        info!("Loading sign model from {} (input {})", path.display(), input_len);

        if !path.is_file() {
            return Err(InferenceError::ModelLoadError(format!(
                "{}: no such model file",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, input_len]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))?;

        info!("Sign model loaded successfully");
        Ok(Self {
            plan,
            input_len,
            model_path: path.display().to_string(),
        })
    }

    /// Expected descriptor length
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Get model path
    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

impl SignModel for OnnxSignModel {
    fn predict(&self, descriptor: &[f32]) -> Result<i64, InferenceError> {
        if descriptor.len() != self.input_len {
            return Err(InferenceError::InvalidInputShape {
                expected: self.input_len,
                actual: descriptor.len(),
            });
        }

        let start = std::time::Instant::now();
        let input = Tensor::from_shape(&[1, self.input_len], descriptor)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InferenceFailed("model produced no outputs".into()))?;

        let label = decode_label(output)?;
        debug!("Sign inference -> {} in {:?}", label, start.elapsed());
        Ok(label)
    }
}

/// Read a class index from an integer label tensor or a score vector
fn decode_label(output: &Tensor) -> Result<i64, InferenceError> {
    let failed = |e: TractError| InferenceError::InferenceFailed(e.to_string());

    match output.datum_type() {
        DatumType::I64 => output
            .to_array_view::<i64>()
            .map_err(failed)?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("empty label tensor".into())),
        DatumType::I32 => output
            .to_array_view::<i32>()
            .map_err(failed)?
            .iter()
            .next()
            .map(|v| i64::from(*v))
            .ok_or_else(|| InferenceError::InferenceFailed("empty label tensor".into())),
        DatumType::F32 => {
            let scores = output.to_array_view::<f32>().map_err(failed)?;
            argmax(scores.iter().copied())
                .map(|i| i as i64)
                .ok_or_else(|| InferenceError::InferenceFailed("empty score tensor".into()))
        }
        other => Err(InferenceError::InferenceFailed(format!(
            "unsupported output type {:?}",
            other
        ))),
    }
}

fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_load_error() {
        let result = OnnxSignModel::load("/nonexistent/data_svm.onnx", 729);
        assert!(matches!(result, Err(InferenceError::ModelLoadError(_))));
    }

    #[test]
    fn test_garbage_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a protobuf").unwrap();

        assert!(matches!(
            OnnxSignModel::load(&path, 729),
            Err(InferenceError::ModelLoadError(_))
        ));
    }

    #[test]
    fn test_decode_integer_label() {
        let tensor = Tensor::from_shape(&[1], &[5i64]).unwrap();
        assert_eq!(decode_label(&tensor).unwrap(), 5);
    }

    #[test]
    fn test_decode_scores_takes_argmax() {
        let tensor = Tensor::from_shape(&[1, 4], &[0.1f32, 0.2, 0.9, 0.3]).unwrap();
        assert_eq!(decode_label(&tensor).unwrap(), 2);
    }

    #[test]
    fn test_argmax_prefers_first_of_ties() {
        assert_eq!(argmax([1.0, 3.0, 3.0].into_iter()), Some(1));
        assert_eq!(argmax(std::iter::empty()), None);
    }
}
