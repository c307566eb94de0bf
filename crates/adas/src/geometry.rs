//! Image-space boxes

use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Axis-aligned box; `right`/`bottom` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box spanned by two opposite corners, in any order
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Length of the top-left to bottom-right diagonal
    pub fn diagonal(&self) -> f32 {
        (self.width() as f32).hypot(self.height() as f32)
    }

    /// Clip to an image of the given size
    pub fn clip_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self::new(
            self.left.clamp(0, w),
            self.top.clamp(0, h),
            self.right.clamp(0, w),
            self.bottom.clamp(0, h),
        )
    }

    /// Shrink by `fraction` of the width/height on every side
    pub fn inset(&self, fraction: f32) -> Self {
        let dx = (self.width() as f32 * fraction).round() as i32;
        let dy = (self.height() as f32 * fraction).round() as i32;
        Self::new(
            self.left + dx,
            self.top + dy,
            (self.right - dx).max(self.left + dx),
            (self.bottom - dy).max(self.top + dy),
        )
    }

    /// Drawing rectangle, if non-empty
    pub fn to_rect(&self) -> Option<Rect> {
        (!self.is_empty())
            .then(|| Rect::at(self.left, self.top).of_size(self.width() as u32, self.height() as u32))
    }
}
