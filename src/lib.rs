//! facevec: webcam face direction vectors for desktop widgets
//!
//! Each poll cycle grabs a frame, finds faces, names them against a small
//! gallery and publishes their offsets from the frame centre as one JSON
//! envelope. The envelope replaces the output file atomically, so a widget
//! polling the file never reads a half-written document.
//!
//! ## Modules
//!
//! - **acquisition**: camera sources (snapshot file, replay directory, synthetic)
//! - **vision**: detector seam, known-face gallery, centre-offset geometry
//! - **storage**: atomic multi-target publisher
//! - **pipeline**: application context and the polling loop
//! - **config**: TOML configuration with validation

pub mod acquisition;
pub mod config;
pub mod pipeline;
pub mod storage;
pub mod types;
pub mod vision;

pub use config::FacevecConfig;
pub use pipeline::{AppContext, PollLoop, PollStats};
pub use storage::{EmptyPolicy, PublishError, VectorPublisher};
pub use types::{Envelope, FaceBox, Frame, VectorRecord, UNKNOWN_NAME};
