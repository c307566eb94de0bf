//! Feature Engineering Engine
//!
//! Fixed-size descriptors for the sign classifier:
//! - raster moments (spatial and central, up to second order)
//! - moment-based shear correction (deskew)
//! - gradient-histogram (HOG) descriptor

mod deskew;
mod hog;
mod moments;

pub use deskew::deskew;
pub use hog::{HogDescriptor, HogParams};
pub use moments::RasterMoments;

use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Image {width}x{height} is smaller than the descriptor window {window}x{window}")]
    ImageTooSmall { width: u32, height: u32, window: u32 },
    #[error("Invalid descriptor geometry: {0}")]
    InvalidGeometry(String),
}
