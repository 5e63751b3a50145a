//! Frame-centre → face-centre vectors
//!
//! ```text
//! center  = ((left + right) / 2, (top + bottom) / 2)
//! dx      = center_x - W/2          (positive = right of centre)
//! dy      = H/2 - center_y          (positive = above centre)
//! x, y    = dx, dy after axis flips, optionally as % of W/2, H/2
//! |v|     = sqrt(x² + y²)
//! angle   = atan2(y, x) in degrees
//! ```

use serde::{Deserialize, Serialize};

use crate::config::VectorConfig;
use crate::types::{FaceBox, RecordError, VectorRecord};

/// Unit of the published x/y offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// Raw pixel offsets
    #[default]
    Pixels,
    /// Percent of the half-frame: frame edges are ±100
    Percent,
}

/// Which horizontal direction is positive x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    #[default]
    Right,
    /// Mirrored, as seen by the person facing the camera
    Left,
}

/// Which vertical direction is positive y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxis {
    #[default]
    Up,
    /// Image-row convention
    Down,
}

/// Converts face boxes into vector records under one unit/sign convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorGeometry {
    units: Units,
    x_axis: XAxis,
    y_axis: YAxis,
    include_magnitude: bool,
    include_angle: bool,
}

impl Default for VectorGeometry {
    fn default() -> Self {
        Self::new(Units::default(), XAxis::default(), YAxis::default())
    }
}

impl VectorGeometry {
    /// Geometry with magnitude and angle enabled.
    pub fn new(units: Units, x_axis: XAxis, y_axis: YAxis) -> Self {
        Self {
            units,
            x_axis,
            y_axis,
            include_magnitude: true,
            include_angle: true,
        }
    }

    pub fn from_config(config: &VectorConfig) -> Self {
        Self::new(config.units, config.x_axis, config.y_axis)
            .with_derived(config.include_magnitude, config.include_angle)
    }

    #[must_use]
    pub fn with_derived(mut self, magnitude: bool, angle: bool) -> Self {
        self.include_magnitude = magnitude;
        self.include_angle = angle;
        self
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Offset of `face` from the centre of a `width` × `height` frame,
    /// in the configured units and sign convention.
    pub fn offset(&self, face: &FaceBox, width: u32, height: u32) -> (f64, f64) {
        let half_w = f64::from(width) / 2.0;
        let half_h = f64::from(height) / 2.0;
        let (cx, cy) = face.center();

        let mut x = cx - half_w;
        let mut y = half_h - cy;

        if self.x_axis == XAxis::Left {
            x = -x;
        }
        if self.y_axis == YAxis::Down {
            y = -y;
        }

        match self.units {
            Units::Pixels => (x, y),
            Units::Percent => (x / half_w * 100.0, y / half_h * 100.0),
        }
    }

    /// Build a validated record for `face`, attaching the enabled derived fields.
    ///
    /// Fails only when the offsets are not finite (a zero-sized frame in
    /// percent units).
    pub fn record(
        &self,
        name: &str,
        face: &FaceBox,
        width: u32,
        height: u32,
    ) -> Result<VectorRecord, RecordError> {
        let (x, y) = self.offset(face, width, height);
        let mut record = VectorRecord::new(name, x, y)?;
        if self.include_magnitude {
            record = record.with_magnitude();
        }
        if self.include_angle {
            record = record.with_angle();
        }
        Ok(record)
    }
}
