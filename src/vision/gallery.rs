//! Face embeddings and the known-face gallery

use tracing::info;

use super::detector::{DetectionError, FaceDetector};
use crate::types::{Frame, UNKNOWN_NAME};

/// Fixed-length face embedding produced by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding(Vec<f32>);

impl FaceEncoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance. Encodings of different length never match.
    pub fn distance(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() {
            return f32::INFINITY;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Reference encodings with their names.
#[derive(Debug, Clone)]
pub struct KnownFaces {
    names: Vec<String>,
    encodings: Vec<FaceEncoding>,
    tolerance: f32,
}

impl KnownFaces {
    pub fn new(tolerance: f32) -> Self {
        Self {
            names: Vec::new(),
            encodings: Vec::new(),
            tolerance,
        }
    }

    pub fn add(&mut self, name: impl Into<String>, encoding: FaceEncoding) {
        self.names.push(name.into());
        self.encodings.push(encoding);
    }

    /// Enroll the first face the detector finds in `frame` under `name`.
    pub fn enroll(
        &mut self,
        detector: &mut dyn FaceDetector,
        name: &str,
        frame: &Frame,
    ) -> Result<(), DetectionError> {
        let boxes = detector.locate(frame)?;
        let Some(first) = boxes.first() else {
            return Err(DetectionError::NoFaceInReference(name.to_string()));
        };
        let encoding = detector
            .encode(frame, std::slice::from_ref(first))?
            .into_iter()
            .next()
            .ok_or(DetectionError::EncodingMismatch { boxes: 1, encodings: 0 })?;
        info!(name = %name, faces_in_image = boxes.len(), "Enrolled known face");
        self.add(name, encoding);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Distance from `candidate` to every reference, in enrollment order.
    pub fn distances(&self, candidate: &FaceEncoding) -> Vec<f32> {
        self.encodings.iter().map(|e| e.distance(candidate)).collect()
    }

    /// Per-reference match flags (`distance <= tolerance`).
    pub fn compare(&self, candidate: &FaceEncoding) -> Vec<bool> {
        self.distances(candidate)
            .into_iter()
            .map(|d| d <= self.tolerance)
            .collect()
    }

    /// Name of the nearest reference if it matches, else `"Unknown"`.
    pub fn identify(&self, candidate: &FaceEncoding) -> &str {
        let best = self
            .distances(candidate)
            .into_iter()
            .enumerate()
            .fold(None::<(usize, f32)>, |best, (i, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((i, d)),
            });

        match best {
            Some((i, d)) if d <= self.tolerance => &self.names[i],
            _ => UNKNOWN_NAME,
        }
    }
}
