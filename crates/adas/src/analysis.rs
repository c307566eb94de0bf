//! ADAS analysis results and alerts

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;
use crate::lane::LaneAnalysis;
use crate::sign::SignDetection;
use crate::state::{ActiveReport, Transition};

/// ADAS alert types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdasAlert {
    /// Lane departure warning window triggered
    LaneDeparture,

    /// A sign is active this frame
    SignDetected { label: u32, name: String },
}

impl AdasAlert {
    /// Spoken/displayed message
    pub fn message(&self) -> String {
        match self {
            AdasAlert::LaneDeparture => "Warning: Lane Departure".to_string(),
            AdasAlert::SignDetected { name, .. } => format!("Detected sign: {}", name),
        }
    }
}

/// Complete ADAS analysis of one frame
#[derive(Debug, Clone)]
pub struct AdasAnalysis {
    /// Index of the analysed frame
    pub frame_index: u64,

    /// Lane detection result
    pub lane: LaneAnalysis,

    /// Frame with lane segments and warning drawn
    pub lane_image: RgbImage,

    /// Raw candidate box, if any contour qualified
    pub candidate: Option<BoundingBox>,

    /// Fresh classification of the candidate
    pub detection: Option<SignDetection>,

    /// State machine transition
    pub transition: Transition,

    /// Active sign, set on every ACTIVE frame
    pub active: Option<ActiveReport>,

    /// Active alerts
    pub alerts: Vec<AdasAlert>,
}

impl AdasAnalysis {
    /// Label reported for the frame (0 when no sign is active)
    pub fn label(&self) -> u32 {
        self.active.map_or(0, |a| a.label)
    }

    /// The sign alert, if a sign is active
    pub fn sign_alert(&self) -> Option<&AdasAlert> {
        self.alerts
            .iter()
            .find(|a| matches!(a, AdasAlert::SignDetected { .. }))
    }
}
