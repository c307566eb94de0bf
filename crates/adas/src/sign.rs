//! Traffic sign classification
//!
//! Crop -> grey 32x32 -> deskew -> HOG descriptor -> trained model -> label.

use feature_engine::{deskew, HogDescriptor, HogParams};
use image::imageops::{self, FilterType};
use image::RgbImage;
use inference_engine::{LabelSet, SignModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::BoundingBox;
use crate::AdasError;

/// Side of the square patch fed to the descriptor
pub const SIGN_PATCH_SIZE: u32 = 32;

/// A classified sign candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDetection {
    /// Frame the detection came from
    pub frame_index: u64,
    /// Clamped class label; 0 means no valid sign
    pub label: u32,
    /// Candidate crop box in frame coordinates
    pub bbox: BoundingBox,
}

/// Traffic sign classifier
pub struct SignClassifier {
    model: Box<dyn SignModel>,
    labels: LabelSet,
    hog: HogDescriptor,
}

impl SignClassifier {
    pub fn new(model: Box<dyn SignModel>, labels: LabelSet) -> Result<Self, AdasError> {
        info!("Creating sign classifier ({} labels)", labels.len());
        Ok(Self {
            model,
            labels,
            hog: HogDescriptor::new(HogParams::default())?,
        })
    }

    /// Descriptor length a model must accept
    pub fn descriptor_len() -> usize {
        HogDescriptor::new(HogParams::default())
            .map(|hog| hog.descriptor_len(SIGN_PATCH_SIZE, SIGN_PATCH_SIZE))
            .unwrap_or(0)
    }

    /// Descriptor of a candidate crop
    pub fn descriptor(&self, crop: &RgbImage) -> Result<Vec<f32>, AdasError> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err(AdasError::InvalidFrame);
        }
        let gray = imageops::grayscale(crop);
        let patch = imageops::resize(&gray, SIGN_PATCH_SIZE, SIGN_PATCH_SIZE, FilterType::Triangle);
        Ok(self.hog.compute(&deskew(&patch))?)
    }

    /// Classify a candidate crop; the label is clamped to the label table
    pub fn classify(&self, crop: &RgbImage) -> Result<u32, AdasError> {
        let descriptor = self.descriptor(crop)?;
        let raw = self.model.predict(&descriptor)?;
        let label = self.labels.clamp(raw);
        debug!("Sign model output {} -> label {} ({})", raw, label, self.labels.name(label));
        Ok(label)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}
