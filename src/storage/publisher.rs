//! Atomic vector file publisher
//!
//! Each publish serialises one [`Envelope`] and replaces every target file with
//! write-to-temp, fsync, chmod, rename. A reader opening a target at any moment
//! sees either the previous envelope or the new one, never a partial file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PublishConfig;
use crate::types::{Envelope, VectorRecord};

// ============================================================================
// Empty Policy
// ============================================================================

/// What to do on a cycle with no detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    /// Publish `{"vectors": [], ...}`
    #[default]
    WriteEmpty,
    /// Leave the last envelope in place
    KeepLast,
}

impl std::fmt::Display for EmptyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriteEmpty => write!(f, "write_empty"),
            Self::KeepLast => write!(f, "keep_last"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialise envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} of {attempted} targets failed", .failures.len())]
    Targets {
        attempted: usize,
        failures: Vec<TargetFailure>,
    },
}

/// One target that could not be published.
#[derive(Debug)]
pub struct TargetFailure {
    pub path: PathBuf,
    pub error: PublishError,
}

impl std::fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PublishError + '_ {
    move |source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// Atomic Write
// ============================================================================

/// Replace `target` with `bytes` atomically, leaving it with permission `mode`.
///
/// The bytes go to a uniquely named temporary file in the target's directory,
/// so publishers sharing a target never clobber each other's temporaries.
/// Missing parent directories are created and made traversable for readers of
/// `mode`. On failure the temporary file is removed and any previous `target`
/// is left untouched.
pub fn write_atomic(target: &Path, bytes: &[u8], mode: u32) -> Result<(), PublishError> {
    let dir = match target.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            create_parent_dirs(parent, mode)?;
            parent
        }
        None => Path::new("."),
    };

    let prefix = target
        .file_name()
        .map(|n| format!(".{}.", n.to_string_lossy()))
        .unwrap_or_else(|| ".vector.".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err(dir))?;

    // Dropping `tmp` on any early return deletes the temporary file.
    tmp.write_all(bytes).map_err(io_err(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
    set_mode(tmp.path(), mode)?;
    tmp.persist(target).map_err(|e| PublishError::Io {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Create `parent` and any missing ancestors. Only directories created here
/// get their mode changed.
fn create_parent_dirs(parent: &Path, mode: u32) -> Result<(), PublishError> {
    let missing: Vec<PathBuf> = parent
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect();
    fs::create_dir_all(parent).map_err(io_err(parent))?;

    for created in missing.iter().rev() {
        set_mode(created, dir_mode(mode))?;
    }
    Ok(())
}

/// Directory mode for a file mode: owner rwx, plus search wherever read is
/// granted (0o644 gives 0o755, 0o640 gives 0o750).
pub fn dir_mode(file_mode: u32) -> u32 {
    0o700 | file_mode | ((file_mode & 0o444) >> 2)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), PublishError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_err(path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), PublishError> {
    Ok(())
}

/// Pretty JSON with a trailing newline.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, PublishError> {
    let mut bytes = serde_json::to_vec_pretty(envelope)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ============================================================================
// Vector Publisher
// ============================================================================

/// Fans each envelope out to every configured target.
#[derive(Debug, Clone)]
pub struct VectorPublisher {
    targets: Vec<PathBuf>,
    empty_policy: EmptyPolicy,
    file_mode: u32,
}

impl VectorPublisher {
    pub fn new(targets: Vec<PathBuf>, empty_policy: EmptyPolicy, file_mode: u32) -> Self {
        Self {
            targets,
            empty_policy,
            file_mode,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(config.target_paths(), config.empty_policy, config.file_mode)
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn empty_policy(&self) -> EmptyPolicy {
        self.empty_policy
    }

    /// Publish `records` stamped with the current time.
    pub fn publish(&self, records: &[VectorRecord]) -> Result<(), PublishError> {
        self.publish_envelope(&Envelope::new(records.to_vec()))
    }

    /// Handle a cycle with no detections according to the empty policy.
    ///
    /// Returns `Ok(false)` when the policy skipped the write.
    pub fn publish_empty(&self) -> Result<bool, PublishError> {
        match self.empty_policy {
            EmptyPolicy::WriteEmpty => self.publish_envelope(&Envelope::empty()).map(|()| true),
            EmptyPolicy::KeepLast => {
                debug!("No detections; keeping last envelope");
                Ok(false)
            }
        }
    }

    /// Write `envelope` to every target. Every target is attempted even if an
    /// earlier one fails.
    pub fn publish_envelope(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let bytes = encode_envelope(envelope)?;

        let failures: Vec<TargetFailure> = self
            .targets
            .iter()
            .filter_map(|target| match write_atomic(target, &bytes, self.file_mode) {
                Ok(()) => {
                    debug!(path = %target.display(), vectors = envelope.vectors.len(), "Published envelope");
                    None
                }
                Err(error) => {
                    warn!(path = %target.display(), error = %error, "Failed to publish envelope");
                    Some(TargetFailure {
                        path: target.clone(),
                        error,
                    })
                }
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Targets {
                attempted: self.targets.len(),
                failures,
            })
        }
    }
}
