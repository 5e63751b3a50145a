//! Face detector abstraction
//!
//! The detector is an external collaborator: it finds face boxes and produces
//! one embedding per box. This module only defines the seam, a no-op
//! implementation, the optional SeetaFace backend, and the downscale wrapper.

use image::imageops::FilterType;
use std::path::PathBuf;
use thiserror::Error;

use super::gallery::FaceEncoding;
use crate::acquisition::AcquisitionError;
use crate::types::{FaceBox, Frame};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to load detector model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("detector returned {encodings} encodings for {boxes} faces")]
    EncodingMismatch { boxes: usize, encodings: usize },

    #[error("no face found in reference image for '{0}'")]
    NoFaceInReference(String),

    #[error("reference image for '{name}' unreadable: {source}")]
    ReferenceImage {
        name: String,
        #[source]
        source: AcquisitionError,
    },

    #[error("detection backend failed: {0}")]
    Backend(String),
}

// ============================================================================
// Detector Trait
// ============================================================================

/// Finds faces in a frame and embeds them.
///
/// Implementations may keep state between frames, hence `&mut self`.
pub trait FaceDetector {
    /// Face boxes as (top, right, bottom, left) in `frame` pixels.
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, DetectionError>;

    /// One embedding per box, same order.
    fn encode(&mut self, frame: &Frame, boxes: &[FaceBox])
        -> Result<Vec<FaceEncoding>, DetectionError>;

    /// Human-readable name for logging.
    fn backend_name(&self) -> &'static str;
}

/// A face found in a full-resolution frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub face: FaceBox,
    pub encoding: FaceEncoding,
}

/// Locate and encode faces, optionally on a frame shrunk by `downscale`.
///
/// Boxes are always returned in full-resolution coordinates.
pub fn detect_faces(
    detector: &mut dyn FaceDetector,
    frame: &Frame,
    downscale: u32,
) -> Result<Vec<Detection>, DetectionError> {
    let factor = downscale.max(1);
    let small;
    let target = if factor > 1 {
        let w = (frame.width() / factor).max(1);
        let h = (frame.height() / factor).max(1);
        small = Frame::new(image::imageops::resize(frame.image(), w, h, FilterType::Triangle));
        &small
    } else {
        frame
    };

    let boxes = detector.locate(target)?;
    let encodings = detector.encode(target, &boxes)?;
    if encodings.len() != boxes.len() {
        return Err(DetectionError::EncodingMismatch {
            boxes: boxes.len(),
            encodings: encodings.len(),
        });
    }

    Ok(boxes
        .into_iter()
        .zip(encodings)
        .map(|(face, encoding)| Detection {
            face: face.scaled(factor),
            encoding,
        })
        .collect())
}

// ============================================================================
// Crop Embedding
// ============================================================================

/// Embed a face as a `side` × `side` grayscale crop, zero-mean and
/// L2-normalised so distances fall in `[0, 2]`.
pub fn crop_embedding(frame: &Frame, face: &FaceBox, side: u32) -> FaceEncoding {
    let img = frame.image();
    let side = side.max(1);
    if img.width() == 0 || img.height() == 0 {
        return FaceEncoding::new(vec![0.0; (side * side) as usize]);
    }

    let left = face.left.min(img.width() - 1);
    let top = face.top.min(img.height() - 1);
    let w = face.width().clamp(1, img.width() - left);
    let h = face.height().clamp(1, img.height() - top);

    let crop = image::imageops::crop_imm(img, left, top, w, h).to_image();
    let gray = image::imageops::grayscale(&crop);
    let resized = image::imageops::resize(&gray, side, side, FilterType::Triangle);

    let mut values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|b| f32::from(b) / 255.0)
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    for v in &mut values {
        *v -= mean;
    }
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in &mut values {
            *v /= norm;
        }
    }
    FaceEncoding::new(values)
}

// ============================================================================
// Null Detector
// ============================================================================

/// Reports no faces. Used for dry runs and builds without a backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn locate(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        Ok(Vec::new())
    }

    fn encode(
        &mut self,
        _frame: &Frame,
        boxes: &[FaceBox],
    ) -> Result<Vec<FaceEncoding>, DetectionError> {
        Ok(boxes.iter().map(|_| FaceEncoding::new(Vec::new())).collect())
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}

// ============================================================================
// SeetaFace Detector (rustface)
// ============================================================================

/// SeetaFace frontal detector with crop embeddings.
#[cfg(feature = "rustface")]
pub struct RustfaceDetector {
    inner: Box<dyn rustface::Detector>,
    embedding_side: u32,
}

#[cfg(feature = "rustface")]
impl RustfaceDetector {
    /// Load the SeetaFace model from `path` and apply detector tuning.
    pub fn from_model_file(
        path: &std::path::Path,
        min_face_size: u32,
        score_threshold: f64,
    ) -> Result<Self, DetectionError> {
        let model_err = |reason: String| DetectionError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let file = std::fs::File::open(path).map_err(|e| model_err(e.to_string()))?;
        let model = rustface::read_model(std::io::BufReader::new(file))
            .map_err(|e| model_err(e.to_string()))?;

        let mut inner = rustface::create_detector_with_model(model);
        inner.set_min_face_size(min_face_size);
        inner.set_score_thresh(score_threshold);
        inner.set_pyramid_scale_factor(0.8);
        inner.set_slide_window_step(4, 4);

        Ok(Self {
            inner,
            embedding_side: crate::config::defaults::EMBEDDING_SIDE,
        })
    }
}

#[cfg(feature = "rustface")]
impl FaceDetector for RustfaceDetector {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        let gray = image::imageops::grayscale(frame.image());
        let (w, h) = gray.dimensions();
        let mut data = rustface::ImageData::new(gray.as_raw(), w, h);
        Ok(self
            .inner
            .detect(&mut data)
            .iter()
            .map(|info| {
                let b = info.bbox();
                FaceBox::from_xywh(b.x(), b.y(), b.width(), b.height())
            })
            .collect())
    }

    fn encode(
        &mut self,
        frame: &Frame,
        boxes: &[FaceBox],
    ) -> Result<Vec<FaceEncoding>, DetectionError> {
        Ok(boxes
            .iter()
            .map(|b| crop_embedding(frame, b, self.embedding_side))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "rustface"
    }
}
