//! Lane detection and departure warning
//!
//! Edges inside the road region of interest are turned into line segments,
//! split into left/right groups by slope, and condensed into a lane-distance
//! ratio per frame. The warning fires when the last [`LANE_WINDOW_LEN`] frames
//! all report a ratio below the threshold.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use imageproc::rect::Rect;
use ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LaneConfig;
use crate::hough::{probabilistic_hough, HoughParams};

/// Frames of lane-distance history considered for a departure warning
pub const LANE_WINDOW_LEN: usize = 8;

/// Rolling lane-distance ratios, `None` for frames without a ratio
pub type LaneWindow = RingBuffer<Option<f32>>;

/// Empty window of [`LANE_WINDOW_LEN`] entries
pub fn new_lane_window() -> LaneWindow {
    RingBuffer::new(LANE_WINDOW_LEN)
}

const ADAPTIVE_MIN: f32 = 0.1;
const ADAPTIVE_MAX: f32 = 0.4;

const LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BANNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Lane side, from the sign of the segment slope in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneSide {
    Left,
    Right,
}

/// Detected line segment in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn length(&self) -> f32 {
        ((self.x2 - self.x1) as f32).hypot((self.y2 - self.y1) as f32)
    }

    /// dy/dx; `None` for vertical or zero-length segments
    pub fn slope(&self) -> Option<f32> {
        let dx = self.x2 - self.x1;
        (dx != 0).then(|| (self.y2 - self.y1) as f32 / dx as f32)
    }

    /// Left for negative slopes, right otherwise
    pub fn side(&self) -> Option<LaneSide> {
        self.slope().map(|s| if s < 0.0 { LaneSide::Left } else { LaneSide::Right })
    }
}

/// Lane-distance ratio over segments ordered left group first:
/// `(last.x2 - first.x1) / count`, defined for two or more segments with a
/// non-zero span
pub fn lane_distance_ratio(ordered: &[LineSegment]) -> Option<f32> {
    if ordered.len() < 2 {
        return None;
    }
    let span = ordered[ordered.len() - 1].x2 - ordered[0].x1;
    (span != 0).then(|| span as f32 / ordered.len() as f32)
}

/// Whether the window is full and every entry is defined and below `threshold`
pub fn departure_warning(window: &LaneWindow, threshold: f32) -> bool {
    window.is_full() && window.iter().all(|r| matches!(r, Some(v) if *v < threshold))
}

/// Region of interest as fractions of frame width/height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiPolygon {
    pub vertices: Vec<[f32; 2]>,
}

impl RoiPolygon {
    pub fn new(vertices: Vec<[f32; 2]>) -> Self {
        Self { vertices }
    }

    /// Pixel vertices for a frame, with repeated and closing points removed
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<Point<i32>> {
        let mut points: Vec<Point<i32>> = Vec::with_capacity(self.vertices.len());
        for [fx, fy] in &self.vertices {
            let p = Point::new(
                (fx * width as f32).round() as i32,
                (fy * height as f32).round() as i32,
            );
            if points.last() != Some(&p) {
                points.push(p);
            }
        }
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points
    }

    /// Binary mask (255 inside the polygon)
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        let points = self.to_pixels(width, height);
        if points.len() >= 3 {
            draw_polygon_mut(&mut mask, &points, Luma([255]));
        }
        mask
    }
}

/// Per-frame lane analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneAnalysis {
    /// Classified segments, left group first
    pub segments: Vec<(LineSegment, LaneSide)>,

    /// Lane-distance ratio of this frame
    pub ratio: Option<f32>,

    /// Ratio clamped to 0.1..0.4 (reported only)
    pub adaptive_threshold: Option<f32>,

    /// Departure warning active
    pub departing: bool,
}

impl LaneAnalysis {
    pub fn count(&self, side: LaneSide) -> usize {
        self.segments.iter().filter(|(_, s)| *s == side).count()
    }
}

/// Lane detector
pub struct LaneDetector {
    roi: RoiPolygon,
    canny_low: f32,
    canny_high: f32,
    hough: HoughParams,
    warning_threshold: f32,
    enabled: bool,
}

impl LaneDetector {
    pub fn new(config: &LaneConfig) -> Self {
        info!(
            "Creating lane detector (threshold {}, {} ROI vertices)",
            config.warning_threshold,
            config.roi_vertices.len()
        );
        Self {
            roi: RoiPolygon::new(config.roi_vertices.clone()),
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            hough: HoughParams {
                threshold: config.hough_threshold,
                min_line_length: config.min_line_length,
                max_line_gap: config.max_line_gap,
                seed: config.hough_seed,
                ..HoughParams::default()
            },
            warning_threshold: config.warning_threshold,
            enabled: config.lane_departure_enabled,
        }
    }

    /// Line segments inside the region of interest
    pub fn segments(&self, frame: &RgbImage) -> Vec<LineSegment> {
        let (width, height) = frame.dimensions();
        let gray = image::imageops::grayscale(frame);
        let dilated = dilate(&gray, Norm::LInf, 1);
        let mut edges = canny(&dilated, self.canny_low, self.canny_high);

        let mask = self.roi.mask(width, height);
        for (e, m) in edges.pixels_mut().zip(mask.pixels()) {
            e[0] &= m[0];
        }
        probabilistic_hough(&edges, &self.hough)
    }

    /// Analyse a frame, update the window and return the annotated copy
    pub fn detect(&self, frame: &RgbImage, window: &mut LaneWindow) -> (RgbImage, LaneAnalysis) {
        let mut annotated = frame.clone();
        if !self.enabled {
            return (annotated, LaneAnalysis::default());
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for segment in self.segments(frame) {
            match segment.side() {
                Some(LaneSide::Left) => left.push(segment),
                Some(LaneSide::Right) => right.push(segment),
                None => continue,
            }
        }

        let ordered: Vec<LineSegment> = left.iter().chain(right.iter()).copied().collect();
        let ratio = lane_distance_ratio(&ordered);
        window.push(ratio);
        let departing = departure_warning(window, self.warning_threshold);

        for s in &left {
            draw_segment(&mut annotated, s, LEFT_COLOR);
        }
        for s in &right {
            draw_segment(&mut annotated, s, RIGHT_COLOR);
        }
        if departing {
            info!("Lane departure warning (ratio {:?})", ratio);
            let banner_width = (annotated.width() / 2).max(1);
            draw_filled_rect_mut(
                &mut annotated,
                Rect::at(40, 20).of_size(banner_width, 30),
                BANNER_COLOR,
            );
        }

        debug!(
            "Lane: {} left, {} right, ratio {:?}",
            left.len(),
            right.len(),
            ratio
        );

        let segments = left
            .into_iter()
            .map(|s| (s, LaneSide::Left))
            .chain(right.into_iter().map(|s| (s, LaneSide::Right)))
            .collect();

        (
            annotated,
            LaneAnalysis {
                segments,
                ratio,
                adaptive_threshold: ratio.map(|r| r.clamp(ADAPTIVE_MIN, ADAPTIVE_MAX)),
                departing,
            },
        )
    }
}

fn draw_segment(image: &mut RgbImage, s: &LineSegment, color: Rgb<u8>) {
    // Two pixels wide
    for offset in [0.0, 1.0] {
        draw_line_segment_mut(
            image,
            (s.x1 as f32 + offset, s.y1 as f32),
            (s.x2 as f32 + offset, s.y2 as f32),
            color,
        );
    }
}
