//! Sign candidate extraction
//!
//! Contours of the colour-masked edge map are scored by how close their
//! boundary stays to a circle around the centroid; the largest circular
//! contour becomes the candidate.

use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use tracing::debug;

use crate::config::SignConfig;
use crate::geometry::BoundingBox;
use crate::preprocess::sign_edge_map;
use crate::region::sign_color_mask;

/// A circular region likely to hold a sign
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Crop box, margin included
    pub bbox: BoundingBox,
    /// Integer centroid of the contour polygon
    pub centroid: (i32, i32),
    /// Mean deviation from a circle (0 = perfect circle)
    pub circularity: f32,
    /// Largest centroid-to-boundary distance
    pub max_distance: f32,
    /// Frame pixels inside `bbox`
    pub crop: RgbImage,
}

/// Centroid of a closed polygon from its area moments; `None` for zero area
pub fn contour_centroid(points: &[Point<i32>]) -> Option<(i32, i32)> {
    if points.len() < 3 {
        return None;
    }

    let (mut a, mut cx, mut cy) = (0.0f64, 0.0f64, 0.0f64);
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let cross = f64::from(p.x) * f64::from(q.y) - f64::from(q.x) * f64::from(p.y);
        a += cross;
        cx += f64::from(p.x + q.x) * cross;
        cy += f64::from(p.y + q.y) * cross;
    }

    if a.abs() < f64::EPSILON {
        return None;
    }
    // m10/m00 and m01/m00; the 1/2 and 1/6 factors reduce to 1/3
    Some(((cx / (3.0 * a)) as i32, (cy / (3.0 * a)) as i32))
}

/// Circularity of a contour around `centroid`: mean of `1 - d / max(d)` over
/// boundary points, with the maximum distance. `None` when every point sits
/// on the centroid.
pub fn circularity(points: &[Point<i32>], centroid: (i32, i32)) -> Option<(f32, f32)> {
    let distances: Vec<f32> = points
        .iter()
        .map(|p| ((p.x - centroid.0) as f32).hypot((p.y - centroid.1) as f32))
        .collect();
    let max = distances.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return None;
    }

    let score = distances.iter().map(|d| 1.0 - d / max).sum::<f32>() / distances.len() as f32;
    Some((score, max))
}

/// Padding added to the boundary distance before the size floor applies
const DISTANCE_PAD: f32 = 2.0;

/// Acceptance rule for a scored contour
pub fn is_sign_like(score: f32, max_distance: f32, similarity: f32, min_distance: f32) -> bool {
    score < 1.0 - similarity && max_distance + DISTANCE_PAD > min_distance
}

/// Extracts circular sign candidates from frames
pub struct CandidateExtractor {
    min_component_size: u32,
    similarity: f32,
    min_distance: f32,
}

impl CandidateExtractor {
    pub fn new(config: &SignConfig) -> Self {
        Self {
            min_component_size: config.min_component_size,
            similarity: config.circle_similarity,
            min_distance: config.min_sign_distance,
        }
    }

    /// Edge map restricted to sign colours
    pub fn binary_map(&self, frame: &RgbImage) -> GrayImage {
        let mut edges = sign_edge_map(frame, self.min_component_size);
        let mask = sign_color_mask(frame);
        for (e, m) in edges.pixels_mut().zip(mask.pixels()) {
            e[0] &= m[0];
        }
        edges
    }

    /// Every accepted candidate, in contour order
    pub fn extract_all(&self, frame: &RgbImage) -> Vec<Candidate> {
        let binary = self.binary_map(frame);
        let contours = find_contours::<i32>(&binary);

        let candidates: Vec<Candidate> = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| self.score(frame, &c.points))
            .collect();

        debug!(
            "{} outer contours, {} circular candidates",
            contours.len(),
            candidates.len()
        );
        candidates
    }

    /// The accepted candidate with the largest radius
    pub fn extract_largest(&self, frame: &RgbImage) -> Option<Candidate> {
        self.extract_all(frame)
            .into_iter()
            .fold(None, |best: Option<Candidate>, c| match best {
                Some(b) if b.max_distance >= c.max_distance => Some(b),
                _ => Some(c),
            })
    }

    fn score(&self, frame: &RgbImage, points: &[Point<i32>]) -> Option<Candidate> {
        let centroid = contour_centroid(points)?;
        let (score, max_distance) = circularity(points, centroid)?;
        if !is_sign_like(score, max_distance, self.similarity, self.min_distance) {
            return None;
        }

        let bbox = crop_box(points)?.clip_to(frame.width(), frame.height());
        if bbox.is_empty() {
            return None;
        }
        let crop = imageops::crop_imm(
            frame,
            bbox.left as u32,
            bbox.top as u32,
            bbox.width() as u32,
            bbox.height() as u32,
        )
        .to_image();

        Some(Candidate {
            bbox,
            centroid,
            circularity: score,
            max_distance,
            crop,
        })
    }
}

/// Contour extent plus the crop margin, unclipped
fn crop_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let left = points.iter().map(|p| p.x).min()?;
    let right = points.iter().map(|p| p.x).max()?;
    let top = points.iter().map(|p| p.y).min()?;
    let bottom = points.iter().map(|p| p.y).max()?;
    Some(BoundingBox::new(left - 2, top - 2, right + 3, bottom + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use imageproc::drawing::draw_filled_circle_mut;
    use std::f32::consts::PI;

    fn polygon(n: usize, radius: impl Fn(usize) -> f32) -> Vec<Point<i32>> {
        (0..n)
            .map(|i| {
                let a = 2.0 * PI * i as f32 / n as f32;
                let r = radius(i);
                Point::new(
                    (500.0 + r * a.cos()).round() as i32,
                    (500.0 + r * a.sin()).round() as i32,
                )
            })
            .collect()
    }

    #[test]
    fn test_circle_is_accepted() {
        let circle = polygon(360, |_| 100.0);
        let centroid = contour_centroid(&circle).unwrap();
        assert!((centroid.0 - 500).abs() <= 1 && (centroid.1 - 500).abs() <= 1);

        let (score, max) = circularity(&circle, centroid).unwrap();
        assert!(score < 0.05, "score {}", score);
        assert!(is_sign_like(score, max, 0.60, 15.0));
        assert!(is_sign_like(score, max, 0.9, 15.0));
    }

    #[test]
    fn test_square_rejected_by_strict_similarity() {
        let square: Vec<Point<i32>> = (0..=100)
            .map(|i| Point::new(i, 0))
            .chain((1..=100).map(|i| Point::new(100, i)))
            .chain((0..100).rev().map(|i| Point::new(i, 100)))
            .chain((1..100).rev().map(|i| Point::new(0, i)))
            .collect();
        let centroid = contour_centroid(&square).unwrap();
        assert_eq!(centroid, (50, 50));

        let (score, max) = circularity(&square, centroid).unwrap();
        assert!(score > 0.15 && score < 0.22, "score {}", score);
        // A square passes any similarity up to 1 - score (about 0.81)
        assert!(is_sign_like(score, max, 0.4, 15.0));
        assert!(is_sign_like(score, max, 0.60, 15.0));
        assert!(!is_sign_like(score, max, 0.85, 15.0));
        assert!(!is_sign_like(score, max, 0.9, 15.0));
    }

    #[test]
    fn test_star_rejected() {
        let star = polygon(10, |i| if i % 2 == 0 { 100.0 } else { 10.0 });
        let centroid = contour_centroid(&star).unwrap();
        let (score, max) = circularity(&star, centroid).unwrap();
        assert!(score > 0.4, "score {}", score);
        assert!(!is_sign_like(score, max, 0.60, 15.0));
    }

    #[test]
    fn test_small_circle_below_size_floor() {
        let circle = polygon(60, |_| 10.0);
        let centroid = contour_centroid(&circle).unwrap();
        let (score, max) = circularity(&circle, centroid).unwrap();
        assert!(!is_sign_like(score, max, 0.60, 15.0));
    }

    #[test]
    fn test_degenerate_contours() {
        let line = vec![Point::new(0, 0), Point::new(10, 0), Point::new(20, 0)];
        assert!(contour_centroid(&line).is_none());
        assert!(circularity(&[Point::new(3, 3)], (3, 3)).is_none());
    }

    #[test]
    fn test_foliage_frame_has_no_candidates() {
        let extractor = CandidateExtractor::new(&SignConfig::default());
        let mut frame = RgbImage::from_pixel(160, 120, Rgb([0, 100, 0]));
        draw_filled_circle_mut(&mut frame, (80, 60), 30, Rgb([0, 90, 10]));

        assert!(extractor.binary_map(&frame).pixels().all(|p: &Luma<u8>| p[0] == 0));
        assert!(extractor.extract_largest(&frame).is_none());
    }

    #[test]
    fn test_blue_disc_extracted() {
        let extractor = CandidateExtractor::new(&SignConfig::default());
        let mut frame = RgbImage::from_pixel(720, 480, Rgb([0, 100, 0]));
        draw_filled_circle_mut(&mut frame, (300, 120), 45, Rgb([0, 0, 255]));
        draw_filled_circle_mut(&mut frame, (300, 120), 30, Rgb([255, 255, 255]));

        let candidate = extractor.extract_largest(&frame).expect("disc accepted");
        let bbox = candidate.bbox;
        assert!((bbox.left - 253).abs() <= 3 && (bbox.right - 348).abs() <= 3, "{:?}", bbox);
        assert!((bbox.top - 73).abs() <= 3 && (bbox.bottom - 166).abs() <= 3, "{:?}", bbox);
        assert!(candidate.circularity < 0.05, "circularity {}", candidate.circularity);
        assert_eq!(candidate.crop.dimensions(), (bbox.width() as u32, bbox.height() as u32));
    }

    #[test]
    fn test_crop_box_margin() {
        let pts = vec![Point::new(10, 20), Point::new(30, 20), Point::new(30, 40)];
        assert_eq!(crop_box(&pts), Some(BoundingBox::new(8, 18, 33, 41)));
    }
}
