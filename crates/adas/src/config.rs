//! ADAS configuration

use serde::{Deserialize, Serialize};

/// ADAS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdasConfig {
    /// Lane departure settings
    pub lane: LaneConfig,

    /// Sign candidate extraction and label gating
    pub sign: SignConfig,

    /// Sign tracker settings
    pub tracker: TrackerConfig,
}

/// Lane detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Lane departure warning enabled
    pub lane_departure_enabled: bool,

    /// Ratio below which a frame counts towards a departure warning
    pub warning_threshold: f32,

    /// Region of interest as fractions of frame width/height
    pub roi_vertices: Vec<[f32; 2]>,

    /// Canny hysteresis thresholds
    pub canny_low: f32,
    pub canny_high: f32,

    /// Accumulator votes needed before a segment is traced
    pub hough_threshold: u32,

    /// Shortest accepted segment (pixels)
    pub min_line_length: f32,

    /// Largest gap bridged along a segment (pixels)
    pub max_line_gap: f32,

    /// Seed for the Hough point visiting order
    pub hough_seed: u64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            lane_departure_enabled: true,
            warning_threshold: 0.2,
            roi_vertices: vec![[0.465, 1.0], [0.64, 0.667], [0.69, 0.667], [1.0, 1.0]],
            canny_low: 130.0,
            canny_high: 220.0,
            hough_threshold: 10,
            min_line_length: 15.0,
            max_line_gap: 2.5,
            hough_seed: 0x5EED,
        }
    }
}

/// Sign detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignConfig {
    /// Traffic sign detection enabled
    pub sign_detection_enabled: bool,

    /// Connected components smaller than this (pixels) are dropped
    pub min_component_size: u32,

    /// Similarity to a circle required of a candidate contour (0..1)
    pub circle_similarity: f32,

    /// Smallest centroid-to-boundary distance of a sign (pixels)
    pub min_sign_distance: f32,

    /// Labels at or above this limit are not adopted (no speed-assist entitlement)
    pub label_limit: u32,

    /// Labels at or above this limit are not adopted (speed-assist entitlement active)
    pub label_limit_entitled: u32,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            sign_detection_enabled: true,
            min_component_size: 300,
            circle_similarity: 0.60,
            min_sign_distance: 15.0,
            label_limit: 8,
            label_limit_entitled: 0,
        }
    }
}

impl SignConfig {
    /// Label limit for the current speed-assist entitlement
    pub fn label_limit_for(&self, speed_assist: bool) -> u32 {
        if speed_assist {
            self.label_limit_entitled
        } else {
            self.label_limit
        }
    }
}

/// Sign tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Hue histogram bins over 0..180
    pub hist_bins: usize,

    /// Mean-shift iteration cap
    pub max_iterations: u32,

    /// Mean-shift convergence tolerance (pixels)
    pub epsilon: f32,

    /// Largest accepted growth of the box diagonal between frames
    pub max_growth: f32,

    /// Accepted width/height range of the tracked box
    pub min_aspect: f32,
    pub max_aspect: f32,

    /// Fraction trimmed from each side of a new detection before seeding
    pub seed_inset: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            hist_bins: 16,
            max_iterations: 10,
            epsilon: 1.0,
            max_growth: 30.0,
            min_aspect: 0.5,
            max_aspect: 2.0,
            seed_inset: 0.05,
        }
    }
}
