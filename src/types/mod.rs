//! Shared data structures for the face vector pipeline
//!
//! - Frame / FaceBox: what the camera yields and what the detector finds
//! - VectorRecord / Envelope: what the publisher writes for the widget

mod frame;
mod record;

pub use frame::*;
pub use record::*;
