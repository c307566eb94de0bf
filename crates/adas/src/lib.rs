//! Advanced Driver Assistance System (ADAS)
//!
//! Road scene analysis of a forward camera:
//! - Lane detection and departure warning
//! - Traffic sign candidate extraction and classification
//! - Sign tracking between classifications

pub mod analysis;
pub mod candidate;
pub mod color;
pub mod config;
pub mod geometry;
pub mod hough;
pub mod lane;
pub mod preprocess;
pub mod region;
pub mod sign;
pub mod state;
pub mod tracker;

pub use analysis::{AdasAlert, AdasAnalysis};
pub use candidate::{Candidate, CandidateExtractor};
pub use config::{AdasConfig, LaneConfig, SignConfig, TrackerConfig};
pub use geometry::BoundingBox;
pub use lane::{new_lane_window, LaneAnalysis, LaneDetector, LaneSide, LaneWindow, LineSegment};
pub use sign::{SignClassifier, SignDetection};
pub use state::{ActiveReport, SignPhase, SignStateMachine, Transition};
pub use tracker::{AbandonReason, CamShiftTracker, SignTracker, TrackState, TrackUpdate};

use feature_engine::FeatureError;
use image::RgbImage;
use inference_engine::InferenceError;
use thiserror::Error;
use tracing::{info, warn};

/// ADAS error types
#[derive(Error, Debug)]
pub enum AdasError {
    #[error("Feature extraction failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid frame format")]
    InvalidFrame,
}

/// ADAS module
pub struct AdasModule {
    config: AdasConfig,
    lane_detector: LaneDetector,
    lane_window: LaneWindow,
    extractor: CandidateExtractor,
    classifier: SignClassifier,
    signs: SignStateMachine,
}

impl AdasModule {
    /// Create new ADAS module with the CamShift tracker
    pub fn new(config: AdasConfig, classifier: SignClassifier) -> Self {
        let tracker = CamShiftTracker::new(config.tracker.clone());
        Self::with_tracker(config, classifier, Box::new(tracker))
    }

    /// Create new ADAS module with a custom tracker
    pub fn with_tracker(
        config: AdasConfig,
        classifier: SignClassifier,
        tracker: Box<dyn SignTracker>,
    ) -> Self {
        info!(
            "Creating ADAS module (lane departure: {}, sign detection: {})",
            config.lane.lane_departure_enabled, config.sign.sign_detection_enabled
        );
        Self {
            lane_detector: LaneDetector::new(&config.lane),
            lane_window: new_lane_window(),
            extractor: CandidateExtractor::new(&config.sign),
            signs: SignStateMachine::new(tracker, config.tracker.seed_inset),
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &AdasConfig {
        &self.config
    }

    pub fn lane_window(&self) -> &LaneWindow {
        &self.lane_window
    }

    pub fn phase(&self) -> SignPhase {
        self.signs.phase()
    }

    pub fn classifier(&self) -> &SignClassifier {
        &self.classifier
    }

    /// Analyze road scene
    pub fn analyze(&mut self, frame: &RgbImage, frame_index: u64, label_limit: u32) -> AdasAnalysis {
        let (lane_image, lane) = self.lane_detector.detect(frame, &mut self.lane_window);

        let candidate = if self.config.sign.sign_detection_enabled {
            self.extractor.extract_largest(frame)
        } else {
            None
        };

        let detection = candidate.as_ref().map(|c| {
            let label = match self.classifier.classify(&c.crop) {
                Ok(label) => label,
                Err(e) => {
                    warn!("Sign classification failed on frame {}: {}", frame_index, e);
                    0
                }
            };
            SignDetection {
                frame_index,
                label,
                bbox: c.bbox,
            }
        });

        let outcome = self.signs.step(frame, detection.as_ref(), label_limit);

        // Generate alerts
        let mut alerts = Vec::new();
        if lane.departing {
            alerts.push(AdasAlert::LaneDeparture);
        }
        if let Some(active) = outcome.active {
            alerts.push(AdasAlert::SignDetected {
                label: active.label,
                name: self.classifier.labels().name(active.label).to_string(),
            });
        }

        AdasAnalysis {
            frame_index,
            lane,
            lane_image,
            candidate: candidate.map(|c| c.bbox),
            detection,
            transition: outcome.transition,
            active: outcome.active,
            alerts,
        }
    }
}
