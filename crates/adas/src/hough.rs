//! Progressive probabilistic Hough transform
//!
//! Edge pixels are visited in a seeded random order. Each pixel votes in a
//! (theta, rho) accumulator; once a bin reaches the vote threshold the line
//! is traced through the edge map in both directions, bridging gaps up to
//! `max_line_gap`. Pixels on the traced line are consumed so they cannot
//! start or join another segment.

use std::f32::consts::PI;

use image::GrayImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::lane::LineSegment;

/// Hough transform parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Distance resolution of the accumulator (pixels)
    pub rho: f32,
    /// Angle resolution of the accumulator (radians)
    pub theta: f32,
    /// Votes needed before a line is traced
    pub threshold: u32,
    pub min_line_length: f32,
    pub max_line_gap: f32,
    /// Seed of the point visiting order
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: PI / 180.0,
            threshold: 10,
            min_line_length: 15.0,
            max_line_gap: 2.5,
            seed: 0,
        }
    }
}

struct Accumulator {
    votes: Vec<i32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    num_rho: usize,
}

impl Accumulator {
    fn new(width: u32, height: u32, params: &HoughParams) -> Self {
        let num_angle = ((PI / params.theta).round() as usize).max(1);
        let num_rho = (((width + height) * 2 + 1) as f32 / params.rho).round() as usize;
        let (cos_table, sin_table) = (0..num_angle)
            .map(|n| {
                let angle = n as f32 * params.theta;
                (angle.cos() / params.rho, angle.sin() / params.rho)
            })
            .unzip();
        Self {
            votes: vec![0; num_angle * num_rho],
            cos_table,
            sin_table,
            num_rho,
        }
    }

    fn bin(&self, n: usize, x: i32, y: i32) -> usize {
        let r = (x as f32 * self.cos_table[n] + y as f32 * self.sin_table[n]).round() as i64
            + (self.num_rho as i64 - 1) / 2;
        n * self.num_rho + r.clamp(0, self.num_rho as i64 - 1) as usize
    }

    /// Add a vote for every angle; returns the strongest bin's angle and count
    fn vote(&mut self, x: i32, y: i32) -> (usize, i32) {
        let mut best = (0, 0);
        for n in 0..self.cos_table.len() {
            let idx = self.bin(n, x, y);
            self.votes[idx] += 1;
            if self.votes[idx] > best.1 {
                best = (n, self.votes[idx]);
            }
        }
        best
    }

    fn unvote(&mut self, x: i32, y: i32) {
        for n in 0..self.cos_table.len() {
            let idx = self.bin(n, x, y);
            self.votes[idx] -= 1;
        }
    }
}

/// Detect line segments in a binary edge image (non-zero = edge)
pub fn probabilistic_hough(edges: &GrayImage, params: &HoughParams) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 || params.rho <= 0.0 || params.theta <= 0.0 {
        return Vec::new();
    }
    let (w, h) = (width as i32, height as i32);
    let index = |x: i32, y: i32| (y * w + x) as usize;

    let mut accumulator = Accumulator::new(width, height, params);
    let mut pending = vec![false; (width * height) as usize];
    let mut voted = vec![false; (width * height) as usize];
    let mut points = Vec::new();
    for (x, y, p) in edges.enumerate_pixels() {
        if p[0] > 0 {
            pending[index(x as i32, y as i32)] = true;
            points.push((x as i32, y as i32));
        }
    }
    points.shuffle(&mut StdRng::seed_from_u64(params.seed));

    let threshold = params.threshold as i32;
    let mut segments = Vec::new();

    for (x0, y0) in points {
        if !pending[index(x0, y0)] {
            continue;
        }

        let (best_n, best_votes) = accumulator.vote(x0, y0);
        voted[index(x0, y0)] = true;
        if best_votes < threshold {
            continue;
        }

        // Walk direction along the detected line
        let angle = best_n as f32 * params.theta;
        let (a, b) = (-angle.sin(), angle.cos());
        let (dx0, dy0) = if a.abs() > b.abs() {
            (a.signum(), b / a.abs())
        } else {
            (a / b.abs(), b.signum())
        };

        let mut ends = [(x0, y0); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut fx, mut fy) = (x0 as f32, y0 as f32);
            let mut gap = 0.0f32;
            loop {
                let (px, py) = (fx.round() as i32, fy.round() as i32);
                if px < 0 || px >= w || py < 0 || py >= h {
                    break;
                }
                if pending[index(px, py)] {
                    gap = 0.0;
                    *end = (px, py);
                } else {
                    gap += 1.0;
                    if gap > params.max_line_gap {
                        break;
                    }
                }
                fx += dx;
                fy += dy;
            }
        }

        let good = ((ends[1].0 - ends[0].0).abs() as f32) >= params.min_line_length
            || ((ends[1].1 - ends[0].1).abs() as f32) >= params.min_line_length;

        // Consume the traced pixels
        for (k, end) in ends.iter().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut fx, mut fy) = (x0 as f32, y0 as f32);
            loop {
                let (px, py) = (fx.round() as i32, fy.round() as i32);
                if px < 0 || px >= w || py < 0 || py >= h {
                    break;
                }
                let idx = index(px, py);
                if pending[idx] {
                    if good && voted[idx] {
                        accumulator.unvote(px, py);
                        voted[idx] = false;
                    }
                    pending[idx] = false;
                }
                if (px, py) == *end {
                    break;
                }
                fx += dx;
                fy += dy;
            }
        }

        if good {
            segments.push(LineSegment::new(ends[0].0, ends[0].1, ends[1].0, ends[1].1));
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_line_segment_mut;

    #[test]
    fn test_empty_image_has_no_lines() {
        let edges = GrayImage::new(64, 48);
        assert!(probabilistic_hough(&edges, &HoughParams::default()).is_empty());
    }

    #[test]
    fn test_single_diagonal_line_found() {
        let mut edges = GrayImage::new(100, 100);
        draw_line_segment_mut(&mut edges, (10.0, 80.0), (70.0, 20.0), Luma([255]));

        let segments = probabilistic_hough(&edges, &HoughParams::default());
        assert!(!segments.is_empty());

        let longest = segments
            .iter()
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .unwrap();
        assert!(longest.length() > 60.0, "length {}", longest.length());
        // Falling to the right in image coordinates
        assert!(longest.slope().unwrap() < 0.0);
    }

    #[test]
    fn test_short_marks_ignored() {
        let mut edges = GrayImage::new(60, 60);
        draw_line_segment_mut(&mut edges, (5.0, 5.0), (12.0, 5.0), Luma([255]));
        assert!(probabilistic_hough(&edges, &HoughParams::default()).is_empty());
    }

    #[test]
    fn test_same_seed_same_result() {
        let mut edges = GrayImage::new(80, 80);
        draw_line_segment_mut(&mut edges, (0.0, 79.0), (60.0, 10.0), Luma([255]));
        draw_line_segment_mut(&mut edges, (79.0, 79.0), (30.0, 5.0), Luma([255]));

        let params = HoughParams {
            seed: 7,
            ..HoughParams::default()
        };
        assert_eq!(
            probabilistic_hough(&edges, &params),
            probabilistic_hough(&edges, &params)
        );
    }
}
