//! Sign tracking between classifications
//!
//! [`CamShiftTracker`] follows the hue distribution of the adopted sign:
//! every frame is back-projected through the learned hue histogram, a
//! mean-shift search re-centres the window and an oriented box is fitted
//! from the second-order moments around it.

use feature_engine::RasterMoments;
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::to_hsv;
use crate::config::TrackerConfig;
use crate::geometry::BoundingBox;

/// Pixels added around the converged window before fitting the box
const FIT_MARGIN: i32 = 10;

/// Hue scale upper bound
const HUE_RANGE: usize = 180;

/// Appearance model and position of the tracked sign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    /// Hue histogram, min-max normalised to 0..255
    pub histogram: Vec<f32>,
    /// Current search window
    pub bbox: BoundingBox,
    /// Diagonal of the last accepted box
    pub size: f32,
}

/// Why tracking stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonReason {
    /// Previous size below one pixel
    PreviousCollapsed,
    /// New box below one pixel or no back-projected mass
    Collapsed,
    /// Box grew more than the allowed factor
    Exploded,
    /// Width/height ratio outside the accepted range
    AspectOutOfRange,
}

/// Result of one tracking step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrackUpdate {
    Continue { bbox: BoundingBox, size: f32 },
    Abandon(AbandonReason),
}

/// Frame-to-frame sign tracker
pub trait SignTracker: Send {
    /// Learn the appearance of the region `bbox`
    fn seed(&self, frame: &RgbImage, bbox: BoundingBox) -> TrackState;

    /// Locate the tracked sign in a new frame
    fn track(&self, frame: &RgbImage, state: &TrackState) -> TrackUpdate;
}

/// Sanity rules for a tracked box: size must stay above one pixel and grow
/// less than `max_growth`, and `|dx / dy|` must lie within the aspect range.
/// `dx`/`dy` are the corner-to-corner offsets.
pub fn check_continuation(
    previous_size: f32,
    size: f32,
    dx: f32,
    dy: f32,
    config: &TrackerConfig,
) -> Result<(), AbandonReason> {
    if previous_size < 1.0 {
        return Err(AbandonReason::PreviousCollapsed);
    }
    if size < 1.0 {
        return Err(AbandonReason::Collapsed);
    }
    if size / previous_size > config.max_growth {
        return Err(AbandonReason::Exploded);
    }
    if dy == 0.0 {
        return Err(AbandonReason::AspectOutOfRange);
    }
    let aspect = (dx / dy).abs();
    if aspect > config.max_aspect || aspect < config.min_aspect {
        return Err(AbandonReason::AspectOutOfRange);
    }
    Ok(())
}

/// Oriented box: centre, size (width across, height along the main axis), angle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
struct RotatedBox {
    center: (f64, f64),
    width: f64,
    height: f64,
    angle: f64,
}

impl RotatedBox {
    /// Corner points, truncated to integer pixels
    fn corners(&self) -> [(i32, i32); 4] {
        let a = self.angle.to_radians();
        let b = a.cos() * 0.5;
        let a = a.sin() * 0.5;
        let (cx, cy) = self.center;
        let (w, h) = (self.width, self.height);

        let p0 = (cx - a * h - b * w, cy + b * h - a * w);
        let p1 = (cx + a * h - b * w, cy - b * h - a * w);
        let p2 = (2.0 * cx - p0.0, 2.0 * cy - p0.1);
        let p3 = (2.0 * cx - p1.0, 2.0 * cy - p1.1);
        [p0, p1, p2, p3].map(|(x, y)| (x as i32, y as i32))
    }
}

/// Hue histogram tracker with mean-shift search and moment-based box fitting
pub struct CamShiftTracker {
    config: TrackerConfig,
}

impl CamShiftTracker {
    pub fn new(config: TrackerConfig) -> Self {
        debug!("Creating CamShift tracker ({} hue bins)", config.hist_bins);
        Self { config }
    }

    fn bins(&self) -> usize {
        self.config.hist_bins.max(1)
    }

    fn hue_bin(&self, hue: u8) -> usize {
        (usize::from(hue) * self.bins() / HUE_RANGE).min(self.bins() - 1)
    }

    /// Hue histogram of a region, min-max normalised to 0..255
    pub fn hue_histogram(&self, hsv: &RgbImage, bbox: BoundingBox) -> Vec<f32> {
        let mut histogram = vec![0.0f32; self.bins()];
        let region = bbox.clip_to(hsv.width(), hsv.height());
        for y in region.top..region.bottom {
            for x in region.left..region.right {
                histogram[self.hue_bin(hsv.get_pixel(x as u32, y as u32)[0])] += 1.0;
            }
        }

        let min = histogram.iter().copied().fold(f32::INFINITY, f32::min);
        let max = histogram.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;
        for v in histogram.iter_mut() {
            *v = if range > f32::EPSILON { (*v - min) * 255.0 / range } else { 0.0 };
        }
        histogram
    }

    /// Per-pixel histogram weight of each pixel's hue
    pub fn back_project(&self, hsv: &RgbImage, histogram: &[f32]) -> GrayImage {
        GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
            let weight = histogram
                .get(self.hue_bin(hsv.get_pixel(x, y)[0]))
                .copied()
                .unwrap_or(0.0);
            Luma([weight.round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Mean-shift the window towards the back-projection's centre of mass
    fn mean_shift(&self, weights: &GrayImage, window: BoundingBox) -> BoundingBox {
        let (cols, rows) = (weights.width() as i32, weights.height() as i32);
        let (w, h) = (window.width(), window.height());
        let (mut x, mut y) = (window.left, window.top);
        let eps = self.config.epsilon.powi(2).round().max(1.0);

        for _ in 0..self.config.max_iterations {
            let m = RasterMoments::of_region(weights, x as u32, y as u32, w as u32, h as u32);
            let Some((cx, cy)) = m.centroid() else {
                break;
            };
            let dx = (cx - f64::from(w) * 0.5).round() as i32;
            let dy = (cy - f64::from(h) * 0.5).round() as i32;

            x = (x + dx).clamp(0, (cols - w).max(0));
            y = (y + dy).clamp(0, (rows - h).max(0));

            if ((dx * dx + dy * dy) as f32) < eps {
                break;
            }
        }
        BoundingBox::new(x, y, x + w, y + h)
    }

    /// Oriented box from the moments of the window expanded by [`FIT_MARGIN`]
    fn fit_box(&self, weights: &GrayImage, window: BoundingBox) -> Option<RotatedBox> {
        let expanded = BoundingBox::new(
            window.left - FIT_MARGIN,
            window.top - FIT_MARGIN,
            window.right + FIT_MARGIN,
            window.bottom + FIT_MARGIN,
        )
        .clip_to(weights.width(), weights.height());
        if expanded.is_empty() {
            return None;
        }

        let m = RasterMoments::of_region(
            weights,
            expanded.left as u32,
            expanded.top as u32,
            expanded.width() as u32,
            expanded.height() as u32,
        );
        let (xc, yc) = m.centroid()?;

        let a = m.mu20 / m.m00;
        let b = m.mu11 / m.m00;
        let c = m.mu02 / m.m00;
        let square = (4.0 * b * b + (a - c) * (a - c)).sqrt();
        let mut theta = (2.0 * b).atan2(a - c + square);

        let (cs, sn) = (theta.cos(), theta.sin());
        let rotate_a = cs * cs * m.mu20 + 2.0 * cs * sn * m.mu11 + sn * sn * m.mu02;
        let rotate_c = sn * sn * m.mu20 - 2.0 * cs * sn * m.mu11 + cs * cs * m.mu02;
        let mut length = (rotate_a.max(0.0) / m.m00).sqrt() * 4.0;
        let mut width = (rotate_c.max(0.0) / m.m00).sqrt() * 4.0;

        if length < width {
            std::mem::swap(&mut length, &mut width);
            theta = std::f64::consts::FRAC_PI_2 - theta;
        }

        let mut angle = (std::f64::consts::FRAC_PI_2 + theta).to_degrees();
        angle = angle.rem_euclid(360.0);
        if angle >= 180.0 {
            angle -= 180.0;
        }

        Some(RotatedBox {
            center: (f64::from(expanded.left) + xc, f64::from(expanded.top) + yc),
            width,
            height: length,
            angle,
        })
    }
}

impl Default for CamShiftTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl SignTracker for CamShiftTracker {
    fn seed(&self, frame: &RgbImage, bbox: BoundingBox) -> TrackState {
        let hsv = to_hsv(frame);
        TrackState {
            histogram: self.hue_histogram(&hsv, bbox),
            bbox,
            size: bbox.diagonal(),
        }
    }

    fn track(&self, frame: &RgbImage, state: &TrackState) -> TrackUpdate {
        let window = state.bbox.clip_to(frame.width(), frame.height());
        if window.is_empty() {
            return TrackUpdate::Abandon(AbandonReason::Collapsed);
        }

        let hsv = to_hsv(frame);
        let weights = self.back_project(&hsv, &state.histogram);
        let window = self.mean_shift(&weights, window);
        let Some(rotated) = self.fit_box(&weights, window) else {
            return TrackUpdate::Abandon(AbandonReason::Collapsed);
        };

        let corners = rotated.corners();
        let tl = corners.iter().copied().min_by_key(|(x, y)| x + y).unwrap_or_default();
        let br = corners.iter().copied().max_by_key(|(x, y)| x + y).unwrap_or_default();
        let (dx, dy) = ((tl.0 - br.0) as f32, (tl.1 - br.1) as f32);
        let size = dx.hypot(dy);

        match check_continuation(state.size, size, dx, dy, &self.config) {
            Ok(()) => TrackUpdate::Continue {
                bbox: BoundingBox::from_corners(tl, br).clip_to(frame.width(), frame.height()),
                size,
            },
            Err(reason) => {
                debug!("Tracker abandoned: {:?} (size {} -> {})", reason, state.size, size);
                TrackUpdate::Abandon(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn scene(left: i32, top: i32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(200, 160, Rgb([20, 160, 40]));
        draw_filled_rect_mut(&mut frame, Rect::at(left, top).of_size(30, 30), Rgb([20, 40, 220]));
        frame
    }

    #[test]
    fn test_continuation_rules() {
        let config = TrackerConfig::default();
        assert_eq!(check_continuation(100.0, 150.0, 100.0, 100.0, &config), Ok(()));
        assert_eq!(
            check_continuation(100.0, 4000.0, 100.0, 100.0, &config),
            Err(AbandonReason::Exploded)
        );
        assert_eq!(
            check_continuation(0.5, 10.0, 5.0, 5.0, &config),
            Err(AbandonReason::PreviousCollapsed)
        );
        assert_eq!(
            check_continuation(10.0, 0.5, 0.3, 0.3, &config),
            Err(AbandonReason::Collapsed)
        );
        assert_eq!(
            check_continuation(10.0, 10.0, 10.0, 0.0, &config),
            Err(AbandonReason::AspectOutOfRange)
        );
        assert_eq!(
            check_continuation(10.0, 10.0, 30.0, 10.0, &config),
            Err(AbandonReason::AspectOutOfRange)
        );
        assert_eq!(
            check_continuation(10.0, 10.0, 4.0, 10.0, &config),
            Err(AbandonReason::AspectOutOfRange)
        );
    }

    #[test]
    fn test_histogram_normalised() {
        let tracker = CamShiftTracker::default();
        let hsv = to_hsv(&scene(50, 50));
        let hist = tracker.hue_histogram(&hsv, BoundingBox::new(40, 40, 90, 90));
        assert_eq!(hist.len(), 16);
        let max = hist.iter().copied().fold(0.0f32, f32::max);
        let min = hist.iter().copied().fold(f32::INFINITY, f32::min);
        assert_eq!(max, 255.0);
        assert_eq!(min, 0.0);
    }

    #[test]
    fn test_uniform_region_gives_empty_model() {
        let tracker = CamShiftTracker::default();
        let single = CamShiftTracker::new(TrackerConfig {
            hist_bins: 1,
            ..TrackerConfig::default()
        });

        let hsv = to_hsv(&scene(50, 50));
        assert!(single.hue_histogram(&hsv, BoundingBox::new(0, 0, 20, 20)).iter().all(|v| *v == 0.0));
        // Region outside the frame has no pixels at all
        assert!(tracker.hue_histogram(&hsv, BoundingBox::new(500, 500, 520, 520)).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_follows_moving_patch() {
        let tracker = CamShiftTracker::default();
        let state = tracker.seed(&scene(50, 50), BoundingBox::new(50, 50, 80, 80));

        match tracker.track(&scene(56, 53), &state) {
            TrackUpdate::Continue { bbox, size } => {
                assert!((bbox.left - 56).abs() <= 4, "bbox {:?}", bbox);
                assert!((bbox.top - 53).abs() <= 4, "bbox {:?}", bbox);
                assert!(size > 20.0);
            }
            other => panic!("expected continuation, got {:?}", other),
        }
    }

    #[test]
    fn test_box_clipped_to_frame() {
        let tracker = CamShiftTracker::default();
        let frame = scene(0, 0);
        let state = tracker.seed(&frame, BoundingBox::new(0, 0, 30, 30));

        // The fitted box is wider than the patch and overhangs the corner
        match tracker.track(&frame, &state) {
            TrackUpdate::Continue { bbox, size } => {
                assert_eq!((bbox.left, bbox.top), (0, 0), "bbox {:?}", bbox);
                assert!(bbox.right <= 200 && bbox.bottom <= 160);
                assert!(bbox.right > 25 && bbox.bottom > 25, "bbox {:?}", bbox);
                assert!(size > bbox.diagonal(), "size {} bbox {:?}", size, bbox);
            }
            other => panic!("expected continuation, got {:?}", other),
        }
    }

    #[test]
    fn test_patch_gone_abandons() {
        let tracker = CamShiftTracker::default();
        let state = tracker.seed(&scene(50, 50), BoundingBox::new(50, 50, 80, 80));
        let empty = RgbImage::from_pixel(200, 160, Rgb([20, 160, 40]));

        assert!(matches!(tracker.track(&empty, &state), TrackUpdate::Abandon(_)));
    }
}
