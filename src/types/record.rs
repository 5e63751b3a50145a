//! Vector records and the publication envelope

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label used for faces that match no entry in the gallery.
pub const UNKNOWN_NAME: &str = "Unknown";

// ============================================================================
// Record Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("vector record name must not be empty")]
    EmptyName,

    #[error("vector record field '{field}' must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },
}

// ============================================================================
// Vector Record
// ============================================================================

/// One detected subject: its label and offset from the frame centre.
///
/// `x`/`y` are in whatever unit the geometry was configured with (pixels or
/// percent of the half-frame). `magnitude` and `angle` are derived from them
/// and only present when enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVectorRecord")]
pub struct VectorRecord {
    name: String,
    x: f64,
    y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    angle: Option<f64>,
}

/// Wire shape used when reading an envelope back (tests, tooling).
#[derive(Deserialize)]
struct RawVectorRecord {
    name: String,
    x: f64,
    y: f64,
    #[serde(default)]
    magnitude: Option<f64>,
    #[serde(default)]
    angle: Option<f64>,
}

impl TryFrom<RawVectorRecord> for VectorRecord {
    type Error = RecordError;

    fn try_from(raw: RawVectorRecord) -> Result<Self, Self::Error> {
        let mut record = Self::new(raw.name, raw.x, raw.y)?;
        if let Some(m) = raw.magnitude {
            check_finite("magnitude", m)?;
            record.magnitude = Some(m);
        }
        if let Some(a) = raw.angle {
            check_finite("angle", a)?;
            record.angle = Some(a);
        }
        Ok(record)
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), RecordError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RecordError::NonFinite { field, value })
    }
}

impl VectorRecord {
    /// Build a record, rejecting empty names and NaN/infinite offsets.
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Result<Self, RecordError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RecordError::EmptyName);
        }
        check_finite("x", x)?;
        check_finite("y", y)?;
        Ok(Self {
            name,
            x,
            y,
            magnitude: None,
            angle: None,
        })
    }

    /// Attach the Euclidean norm of (x, y).
    #[must_use]
    pub fn with_magnitude(mut self) -> Self {
        self.magnitude = Some(self.x.hypot(self.y));
        self
    }

    /// Attach `atan2(y, x)` in degrees.
    #[must_use]
    pub fn with_angle(mut self) -> Self {
        self.angle = Some(self.y.atan2(self.x).to_degrees());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn magnitude(&self) -> Option<f64> {
        self.magnitude
    }

    pub fn angle(&self) -> Option<f64> {
        self.angle
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_NAME
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The complete document written to each target in one atomic step.
///
/// A cycle with no detections is represented as `"vectors": []`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub vectors: Vec<VectorRecord>,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Envelope {
    /// Stamp `vectors` with the current time.
    pub fn new(vectors: Vec<VectorRecord>) -> Self {
        Self::at(vectors, now_epoch_secs())
    }

    /// The "no detections" envelope.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn at(vectors: Vec<VectorRecord>, timestamp: f64) -> Self {
        Self { vectors, timestamp }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Wall-clock time as fractional seconds since the epoch.
#[allow(clippy::cast_precision_loss)]
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
