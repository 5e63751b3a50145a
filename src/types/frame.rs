//! Camera frames and face bounding boxes

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One RGB frame from a camera source.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Geometric midpoint of the image plane, in pixels.
    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.width()) / 2.0, f64::from(self.height()) / 2.0)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Face bounding box in pixel coordinates, ordered (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Build from a detector rectangle, clamping negative origins to the frame edge.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        let left = x.max(0) as u32;
        let top = y.max(0) as u32;
        Self {
            top,
            right: (x.saturating_add_unsigned(width)).max(0) as u32,
            bottom: (y.saturating_add_unsigned(height)).max(0) as u32,
            left,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Centre of the box: ((left + right) / 2, (top + bottom) / 2).
    pub fn center(&self) -> (f64, f64) {
        (
            (f64::from(self.left) + f64::from(self.right)) / 2.0,
            (f64::from(self.top) + f64::from(self.bottom)) / 2.0,
        )
    }

    /// Scale a box found on a downscaled frame back to full resolution.
    #[must_use]
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            top: self.top.saturating_mul(factor),
            right: self.right.saturating_mul(factor),
            bottom: self.bottom.saturating_mul(factor),
            left: self.left.saturating_mul(factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_uses_box_midpoint() {
        let b = FaceBox::new(100, 300, 200, 200);
        assert_eq!(b.center(), (250.0, 150.0));
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 100);
    }

    #[test]
    fn test_from_xywh_clamps_negative_origin() {
        let b = FaceBox::from_xywh(-10, 5, 50, 40);
        assert_eq!(b, FaceBox::new(5, 40, 45, 0));
    }

    #[test]
    fn test_scaled() {
        let b = FaceBox::new(10, 40, 30, 20).scaled(4);
        assert_eq!(b, FaceBox::new(40, 160, 120, 80));
    }

    #[test]
    fn test_frame_center() {
        let frame = Frame::new(RgbImage::new(640, 480));
        assert_eq!(frame.center(), (320.0, 240.0));
    }
}
