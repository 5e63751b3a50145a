//! Camera source abstraction for frame acquisition.
//!
//! Provides a unified trait for reading frames from different sources:
//! a snapshot file kept fresh by an external capture tool, a directory of
//! images (replay), and synthetic blank frames.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::types::Frame;

/// Camera acquisition errors
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Failed to read frame from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode frame {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("No image files found in {0}")]
    EmptyDirectory(PathBuf),

    #[error("Camera source '{0}' has been released")]
    Released(String),
}

/// Trait abstracting where frames come from.
///
/// `read_frame` may block; the poll loop calls it once per cycle.
pub trait CameraSource {
    /// Acquire the next frame.
    fn read_frame(&mut self) -> Result<Frame, AcquisitionError>;

    /// Release the underlying device or files. Safe to call more than once.
    fn release(&mut self);

    /// Human-readable name for logging (e.g. "snapshot", "directory").
    fn source_name(&self) -> &str;
}

/// Decode an image file into an RGB frame.
pub fn load_frame(path: &Path) -> Result<Frame, AcquisitionError> {
    let bytes = std::fs::read(path).map_err(|source| AcquisitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|e| AcquisitionError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Frame::new(image.to_rgb8()))
}

// ============================================================================
// Snapshot Source
// ============================================================================

/// Re-reads one image file every cycle.
///
/// Pairs with a capture tool that keeps overwriting the file, e.g.
/// `ffmpeg -f v4l2 -i /dev/video0 -update 1 -r 2 /tmp/webcam.jpg`.
pub struct SnapshotSource {
    path: PathBuf,
    released: bool,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraSource for SnapshotSource {
    fn read_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released(self.source_name().to_string()));
        }
        load_frame(&self.path)
    }

    fn release(&mut self) {
        if !self.released {
            debug!(path = %self.path.display(), "Released snapshot source");
            self.released = true;
        }
    }

    fn source_name(&self) -> &str {
        "snapshot"
    }
}

// ============================================================================
// Directory Source
// ============================================================================

/// Replays every `.jpg`/`.jpeg`/`.png` in a directory in name order, looping.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
    released: bool,
}

impl DirectorySource {
    /// Index the directory. Fails if it holds no images.
    pub fn open(dir: &Path) -> Result<Self, AcquisitionError> {
        let entries = std::fs::read_dir(dir).map_err(|source| AcquisitionError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(AcquisitionError::EmptyDirectory(dir.to_path_buf()));
        }
        debug!(dir = %dir.display(), frames = files.len(), "Indexed replay directory");

        Ok(Self {
            files,
            next: 0,
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png"))
}

impl CameraSource for DirectorySource {
    fn read_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released(self.source_name().to_string()));
        }
        let path = &self.files[self.next];
        // Advance even on a bad file so one corrupt frame cannot wedge the replay.
        self.next = (self.next + 1) % self.files.len();
        load_frame(path)
    }

    fn release(&mut self) {
        if !self.released {
            debug!("Released directory source");
            self.released = true;
        }
    }

    fn source_name(&self) -> &str {
        "directory"
    }
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// Produces mid-grey frames of a fixed size.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    released: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            released: false,
        }
    }
}

impl CameraSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Frame, AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released(self.source_name().to_string()));
        }
        Ok(Frame::new(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([128, 128, 128]),
        )))
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
