//! Facevec Configuration - camera, detection, geometry and publishing as TOML
//!
//! Each struct implements `Default`, so a missing file or a missing section
//! behaves exactly like the built-in deployment (snapshot camera, pixel
//! vectors, one durable target).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::storage::EmptyPolicy;
use crate::vision::{Units, XAxis, YAxis};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one publisher deployment.
///
/// Load with `FacevecConfig::load()` which searches:
/// 1. an explicit path (the `--config` flag)
/// 2. `$FACEVEC_CONFIG`
/// 3. `./facevec.toml`
/// 4. Built-in defaults
///
/// Loading only parses. Call [`validate`](Self::validate) once command-line
/// overrides have been applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacevecConfig {
    /// Where frames come from
    #[serde(default)]
    pub camera: CameraConfig,

    /// Face detector tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Known-face gallery
    #[serde(default)]
    pub recognition: RecognitionConfig,

    /// Vector units and sign conventions
    #[serde(default)]
    pub vectors: VectorConfig,

    /// Output targets and file policy
    #[serde(default)]
    pub publish: PublishConfig,

    /// Cycle timing
    #[serde(default)]
    pub poll: PollConfig,
}

impl FacevecConfig {
    /// Load configuration using the standard search order.
    ///
    /// An explicit path must load cleanly. The env var and local file fall
    /// back to the next candidate with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Explicit path
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded config from --config");
            return Ok(config);
        }

        // 2. Env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from FACEVEC_CONFIG");
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FACEVEC_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FACEVEC_CONFIG points to non-existent file, falling back");
            }
        }

        // 3. ./facevec.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./facevec.toml");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./facevec.toml, using defaults");
                }
            }
        }

        // 4. Defaults
        info!("No facevec.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse a TOML document without validating it.
    ///
    /// Unknown keys and suspicious values only produce warnings.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;

        for w in &super::validation::suspicious_values(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all settings for internal consistency.
    ///
    /// Every problem is collected so the operator sees them in one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Camera
        match self.camera.source {
            CameraKind::Snapshot | CameraKind::Directory => {
                if self.camera.path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                    errors.push(format!(
                        "camera.path is required for the '{}' source",
                        self.camera.source
                    ));
                }
            }
            CameraKind::Synthetic => {
                if self.camera.width == 0 || self.camera.height == 0 {
                    errors.push(format!(
                        "camera: synthetic frame size must be non-zero (got {}x{})",
                        self.camera.width, self.camera.height
                    ));
                }
            }
        }

        // Detection
        if self.detection.downscale == 0 {
            errors.push("detection.downscale must be >= 1".to_string());
        }
        if self.detection.detect_every == 0 {
            errors.push("detection.detect_every must be >= 1".to_string());
        }
        if !self.detection.score_threshold.is_finite() {
            errors.push(format!(
                "detection.score_threshold must be finite (got {})",
                self.detection.score_threshold
            ));
        }

        // Recognition
        let tol = self.recognition.tolerance;
        if !tol.is_finite() || tol <= 0.0 || tol > 2.0 {
            errors.push(format!(
                "recognition.tolerance must be in (0, 2] (got {tol})"
            ));
        }
        let mut names = HashSet::new();
        for (i, known) in self.recognition.known.iter().enumerate() {
            if known.name.trim().is_empty() {
                errors.push(format!("recognition.known[{i}].name must not be empty"));
            } else if known.name == crate::types::UNKNOWN_NAME {
                errors.push(format!(
                    "recognition.known[{i}].name '{}' is reserved for unmatched faces",
                    known.name
                ));
            } else if !names.insert(known.name.as_str()) {
                errors.push(format!(
                    "recognition.known[{i}].name '{}' is listed twice",
                    known.name
                ));
            }
            if known.image.trim().is_empty() {
                errors.push(format!("recognition.known[{i}].image must not be empty"));
            }
        }

        // Publish
        if self.publish.targets.is_empty() {
            errors.push("publish.targets must list at least one path".to_string());
        }
        let mut seen = HashSet::new();
        for target in self.publish.target_paths() {
            if target.file_name().is_none() {
                errors.push(format!(
                    "publish.targets: '{}' does not name a file",
                    target.display()
                ));
            }
            if !seen.insert(target.clone()) {
                errors.push(format!(
                    "publish.targets: '{}' is listed twice",
                    target.display()
                ));
            }
        }
        let mode = self.publish.file_mode;
        if mode > 0o777 {
            errors.push(format!(
                "publish.file_mode {mode:#o} has bits outside 0o777"
            ));
        }
        if mode & 0o400 == 0 {
            errors.push(format!(
                "publish.file_mode {mode:#o} must leave the file owner-readable"
            ));
        }
        if mode & 0o002 != 0 {
            errors.push(format!(
                "publish.file_mode {mode:#o} is world-writable; use 0o644"
            ));
        }

        // Poll
        if self.poll.interval_ms == 0 {
            errors.push("poll.interval_ms must be >= 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Camera
// ============================================================================

/// Which camera source implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    /// Re-read one image file that an external capture tool keeps overwriting
    #[default]
    Snapshot,
    /// Replay a directory of images in name order
    Directory,
    /// Blank frames of a fixed size
    Synthetic,
}

impl std::fmt::Display for CameraKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraKind::Snapshot => write!(f, "snapshot"),
            CameraKind::Directory => write!(f, "directory"),
            CameraKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub source: CameraKind,

    /// Snapshot file or replay directory
    #[serde(default = "default_camera_path")]
    pub path: Option<String>,

    /// Synthetic frame width (pixels)
    #[serde(default = "default_frame_width")]
    pub width: u32,

    /// Synthetic frame height (pixels)
    #[serde(default = "default_frame_height")]
    pub height: u32,
}

#[allow(clippy::unnecessary_wraps)]
fn default_camera_path() -> Option<String> {
    Some("/tmp/webcam.jpg".to_string())
}
fn default_frame_width() -> u32 { defaults::SYNTHETIC_FRAME_WIDTH }
fn default_frame_height() -> u32 { defaults::SYNTHETIC_FRAME_HEIGHT }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraKind::default(),
            path: default_camera_path(),
            width: default_frame_width(),
            height: default_frame_height(),
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// SeetaFace model file (only read with the `rustface` feature)
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Smallest face reported (pixels)
    #[serde(default = "default_min_face_size")]
    pub min_face_size: u32,

    /// Detector score threshold
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    /// Detect on a frame shrunk by this factor, then scale boxes back up
    #[serde(default = "default_one")]
    pub downscale: u32,

    /// Run detection every n-th cycle, reusing the last result in between
    #[serde(default = "default_one")]
    pub detect_every: u32,
}

fn default_model_path() -> String { defaults::DETECTOR_MODEL_FILE.to_string() }
fn default_min_face_size() -> u32 { defaults::MIN_FACE_SIZE }
fn default_score_threshold() -> f64 { defaults::SCORE_THRESHOLD }
fn default_one() -> u32 { 1 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            min_face_size: default_min_face_size(),
            score_threshold: default_score_threshold(),
            downscale: default_one(),
            detect_every: default_one(),
        }
    }
}

// ============================================================================
// Recognition
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Maximum embedding distance counted as a match
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Reference faces, one image each
    #[serde(default)]
    pub known: Vec<KnownFaceEntry>,
}

fn default_tolerance() -> f32 { defaults::MATCH_TOLERANCE }

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            known: Vec::new(),
        }
    }
}

/// A named reference image; the first face found in it is the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownFaceEntry {
    pub name: String,
    pub image: String,
}

// ============================================================================
// Vectors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub units: Units,

    #[serde(default)]
    pub x_axis: XAxis,

    #[serde(default)]
    pub y_axis: YAxis,

    #[serde(default = "default_true")]
    pub include_magnitude: bool,

    #[serde(default = "default_true")]
    pub include_angle: bool,
}

fn default_true() -> bool { true }

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            units: Units::default(),
            x_axis: XAxis::default(),
            y_axis: YAxis::default(),
            include_magnitude: true,
            include_angle: true,
        }
    }
}

// ============================================================================
// Publish
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Output files; `~/` expands to the home directory
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// What a cycle without detections writes
    #[serde(default)]
    pub empty_policy: EmptyPolicy,

    /// Permission bits applied to every published file
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

fn default_targets() -> Vec<String> {
    vec![default_output_path()]
}
fn default_file_mode() -> u32 { defaults::OUTPUT_FILE_MODE }

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            empty_policy: EmptyPolicy::default(),
            file_mode: default_file_mode(),
        }
    }
}

impl PublishConfig {
    /// Targets with `~/` expanded, in configured order.
    pub fn target_paths(&self) -> Vec<PathBuf> {
        self.targets.iter().map(|t| expand_home(t)).collect()
    }
}

// ============================================================================
// Poll
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between cycles (ms)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Sleep after a failed acquisition (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_interval_ms() -> u64 { defaults::POLL_INTERVAL_MS }
fn default_retry_delay_ms() -> u64 { defaults::RETRY_DELAY_MS }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Durable output location: `$XDG_DATA_HOME/vector_data/vector.json`,
/// else `~/.local/share/vector_data/vector.json`.
pub fn default_output_path() -> String {
    let base = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) if !dir.is_empty() => dir,
        _ => "~/.local/share".to_string(),
    };
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        defaults::OUTPUT_DIR_NAME,
        defaults::OUTPUT_FILE_NAME
    )
}

/// Expand a leading `~/` using `$HOME`. Other paths are returned as-is.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = FacevecConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
        assert_eq!(config.publish.file_mode, 0o644);
        assert_eq!(config.publish.empty_policy, EmptyPolicy::WriteEmpty);
    }

    #[test]
    fn test_parse_full_document() {
        let toml_str = r#"
[camera]
source = "synthetic"
width = 320
height = 240

[recognition]
tolerance = 0.5
[[recognition.known]]
name = "Alice"
image = "alice.jpg"

[vectors]
units = "percent"
x_axis = "left"
y_axis = "down"
include_angle = false

[publish]
targets = ["/tmp/a/vector.json", "/tmp/b/vector.json"]
empty_policy = "keep_last"
file_mode = 0o640

[poll]
interval_ms = 500
"#;
        let config = FacevecConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.camera.source, CameraKind::Synthetic);
        assert_eq!(config.camera.width, 320);
        assert_eq!(config.recognition.known.len(), 1);
        assert_eq!(config.vectors.units, Units::Percent);
        assert_eq!(config.vectors.x_axis, XAxis::Left);
        assert_eq!(config.vectors.y_axis, YAxis::Down);
        assert!(config.vectors.include_magnitude);
        assert!(!config.vectors.include_angle);
        assert_eq!(config.publish.targets.len(), 2);
        assert_eq!(config.publish.empty_policy, EmptyPolicy::KeepLast);
        assert_eq!(config.publish.file_mode, 0o640);
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.retry_delay_ms, defaults::RETRY_DELAY_MS);
    }

    #[test]
    fn test_world_writable_mode_rejected() {
        let mut config = FacevecConfig::default();
        config.publish.file_mode = 0o666;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("world-writable")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = FacevecConfig::default();
        config.detection.downscale = 0;
        config.poll.interval_ms = 0;
        config.recognition.tolerance = f32::NAN;
        config.publish.targets.clear();
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4, "{:?}", errors),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_reserved_and_duplicate_known_names() {
        let mut config = FacevecConfig::default();
        config.recognition.known = vec![
            KnownFaceEntry { name: "Unknown".into(), image: "a.jpg".into() },
            KnownFaceEntry { name: "Bob".into(), image: "b.jpg".into() },
            KnownFaceEntry { name: "Bob".into(), image: "c.jpg".into() },
        ];
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation error");
        };
        assert!(errors.iter().any(|e| e.contains("reserved")));
        assert!(errors.iter().any(|e| e.contains("listed twice")));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let mut config = FacevecConfig::default();
        config.publish.targets = vec!["/tmp/x/v.json".into(), "/tmp/x/v.json".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_snapshot_requires_path() {
        let mut config = FacevecConfig::default();
        config.camera.path = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_home("~/x/y.json"), Path::new(&home).join("x/y.json"));
        }
        assert_eq!(expand_home("/abs/y.json"), PathBuf::from("/abs/y.json"));
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = FacevecConfig::default();
        let text = config.to_toml().unwrap();
        let back = FacevecConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.publish.targets, config.publish.targets);
        assert_eq!(back.poll.interval_ms, config.poll.interval_ms);
    }

    #[test]
    fn test_incomplete_file_loads_and_fails_validation() {
        // A directory source without a path parses; an override may supply it.
        let mut config = FacevecConfig::from_toml_str("[camera]\nsource = \"directory\"\n").unwrap();
        assert!(config.validate().is_err());

        config.camera.source = CameraKind::Snapshot;
        config.camera.path = Some("/tmp/webcam.jpg".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facevec.toml");
        std::fs::write(&path, "[poll]\ninterval_ms = \"soon\"\n").unwrap();
        match FacevecConfig::load_from_file(&path) {
            Err(ConfigError::Parse(p, _)) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
