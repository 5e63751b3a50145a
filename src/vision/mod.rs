//! Face detection seam, known-face gallery and vector geometry
//!
//! Detection itself is delegated to a [`FaceDetector`] backend; everything
//! here is the sequencing and arithmetic around it.

pub mod detector;
pub mod gallery;
pub mod geometry;

pub use detector::{crop_embedding, detect_faces, Detection, DetectionError, FaceDetector, NullDetector};
#[cfg(feature = "rustface")]
pub use detector::RustfaceDetector;
pub use gallery::{FaceEncoding, KnownFaces};
pub use geometry::{Units, VectorGeometry, XAxis, YAxis};
