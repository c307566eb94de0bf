//! Histogram of Oriented Gradients

use image::GrayImage;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::FeatureError;

/// HOG geometry and normalisation parameters (all sizes in pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HogParams {
    /// Detection window side
    pub win_size: u32,
    /// Block side
    pub block_size: u32,
    /// Step between blocks inside a window, and between windows in the image
    pub block_stride: u32,
    /// Cell side
    pub cell_size: u32,
    /// Orientation bins per cell
    pub nbins: usize,
    /// Use 0..360 degree orientations instead of 0..180
    pub signed_gradient: bool,
    /// L2-Hys clipping value
    pub l2_hys_threshold: f32,
    /// Square-root intensity compression before differentiation
    pub gamma_correction: bool,
}

impl Default for HogParams {
    fn default() -> Self {
        Self {
            win_size: 20,
            block_size: 10,
            block_stride: 5,
            cell_size: 10,
            nbins: 9,
            signed_gradient: true,
            l2_hys_threshold: 0.2,
            gamma_correction: true,
        }
    }
}

/// HOG descriptor extractor
#[derive(Debug, Clone)]
pub struct HogDescriptor {
    params: HogParams,
}

/// Per-pixel gradient magnitude and orientation (radians)
struct GradientField {
    magnitude: Array2<f32>,
    angle: Array2<f32>,
}

impl HogDescriptor {
    /// Create a descriptor, validating the geometry
    pub fn new(params: HogParams) -> Result<Self, FeatureError> {
        let HogParams {
            win_size,
            block_size,
            block_stride,
            cell_size,
            nbins,
            ..
        } = params;

        if nbins == 0 || cell_size == 0 || block_stride == 0 {
            return Err(FeatureError::InvalidGeometry(
                "bins, cell size and block stride must be non-zero".into(),
            ));
        }
        if block_size > win_size || block_size % cell_size != 0 {
            return Err(FeatureError::InvalidGeometry(format!(
                "block {} must fit the window {} and be a multiple of the cell {}",
                block_size, win_size, cell_size
            )));
        }
        if (win_size - block_size) % block_stride != 0 {
            return Err(FeatureError::InvalidGeometry(format!(
                "window {} minus block {} is not a multiple of the stride {}",
                win_size, block_size, block_stride
            )));
        }
        Ok(Self { params })
    }

    /// Parameters in use
    pub fn params(&self) -> &HogParams {
        &self.params
    }

    /// Descriptor length for an image of the given size
    pub fn descriptor_len(&self, width: u32, height: u32) -> usize {
        let p = &self.params;
        if width < p.win_size || height < p.win_size {
            return 0;
        }
        let windows = |side: u32| ((side - p.win_size) / p.block_stride + 1) as usize;
        let blocks = ((p.win_size - p.block_size) / p.block_stride + 1) as usize;
        let cells = (p.block_size / p.cell_size) as usize;
        windows(width) * windows(height) * blocks * blocks * cells * cells * p.nbins
    }

    /// Compute the descriptor, sliding the window across the image by the block stride
    pub fn compute(&self, image: &GrayImage) -> Result<Vec<f32>, FeatureError> {
        let p = self.params;
        let (width, height) = image.dimensions();
        if width < p.win_size || height < p.win_size {
            return Err(FeatureError::ImageTooSmall {
                width,
                height,
                window: p.win_size,
            });
        }

        let field = self.gradients(image);
        let cells_per_block = p.block_size / p.cell_size;
        let mut descriptor = Vec::with_capacity(self.descriptor_len(width, height));

        for wy in (0..=height - p.win_size).step_by(p.block_stride as usize) {
            for wx in (0..=width - p.win_size).step_by(p.block_stride as usize) {
                for by in (0..=p.win_size - p.block_size).step_by(p.block_stride as usize) {
                    for bx in (0..=p.win_size - p.block_size).step_by(p.block_stride as usize) {
                        let mut block = Vec::with_capacity((cells_per_block * cells_per_block) as usize * p.nbins);
                        for cy in 0..cells_per_block {
                            for cx in 0..cells_per_block {
                                let hist = self.cell_histogram(
                                    &field,
                                    wx + bx + cx * p.cell_size,
                                    wy + by + cy * p.cell_size,
                                );
                                block.extend(hist.iter());
                            }
                        }
                        normalize_l2_hys(&mut block, p.l2_hys_threshold);
                        descriptor.extend(block);
                    }
                }
            }
        }

        Ok(descriptor)
    }

    /// Centred-difference gradients with replicated borders
    fn gradients(&self, image: &GrayImage) -> GradientField {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let gamma = self.params.gamma_correction;
        let intensity = Array2::from_shape_fn((h, w), |(y, x)| {
            let v = f32::from(image.get_pixel(x as u32, y as u32)[0]);
            if gamma {
                v.sqrt()
            } else {
                v
            }
        });

        let mut magnitude = Array2::<f32>::zeros((h, w));
        let mut angle = Array2::<f32>::zeros((h, w));
        for y in 0..h {
            for x in 0..w {
                let gx = intensity[[y, (x + 1).min(w - 1)]] - intensity[[y, x.saturating_sub(1)]];
                let gy = intensity[[(y + 1).min(h - 1), x]] - intensity[[y.saturating_sub(1), x]];
                magnitude[[y, x]] = (gx * gx + gy * gy).sqrt();
                let mut theta = gy.atan2(gx);
                if theta < 0.0 {
                    theta += 2.0 * PI;
                }
                angle[[y, x]] = theta;
            }
        }

        GradientField { magnitude, angle }
    }

    /// Magnitude-weighted orientation histogram of one cell, with linear
    /// interpolation between neighbouring bins
    fn cell_histogram(&self, field: &GradientField, x0: u32, y0: u32) -> Array1<f32> {
        let p = &self.params;
        let nbins = p.nbins;
        let range = if p.signed_gradient { 2.0 * PI } else { PI };
        let bin_width = range / nbins as f32;
        let mut hist = Array1::<f32>::zeros(nbins);

        for y in y0..y0 + p.cell_size {
            for x in x0..x0 + p.cell_size {
                let (yi, xi) = (y as usize, x as usize);
                let mag = field.magnitude[[yi, xi]];
                if mag == 0.0 {
                    continue;
                }
                let theta = field.angle[[yi, xi]] % range;
                let pos = theta / bin_width - 0.5;
                let lower = pos.floor();
                let frac = pos - lower;
                let b0 = (lower as i64).rem_euclid(nbins as i64) as usize;
                let b1 = (b0 + 1) % nbins;
                hist[b0] += mag * (1.0 - frac);
                hist[b1] += mag * frac;
            }
        }
        hist
    }
}

/// L2 normalise, clip, renormalise
fn normalize_l2_hys(block: &mut [f32], threshold: f32) {
    let eps = 1e-3 * block.len() as f32;
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + eps * eps).sqrt();
    for v in block.iter_mut() {
        *v = (*v / norm).min(threshold);
    }
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + 1e-3).sqrt();
    for v in block.iter_mut() {
        *v /= norm;
    }
}
