//! Frame acquisition module
//!
//! Handles frame ingestion from camera sources.

pub mod camera;

pub use camera::{
    load_frame, AcquisitionError, CameraSource, DirectorySource, SnapshotSource, SyntheticSource,
};
