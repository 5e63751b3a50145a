//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "FACEVEC_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "facevec.toml";

// ============================================================================
// Camera
// ============================================================================

/// Frame width for the synthetic source (pixels).
pub const SYNTHETIC_FRAME_WIDTH: u32 = 640;

/// Frame height for the synthetic source (pixels).
pub const SYNTHETIC_FRAME_HEIGHT: u32 = 480;

// ============================================================================
// Detection
// ============================================================================

/// SeetaFace frontal model file name.
pub const DETECTOR_MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";

/// Smallest face the detector will report (pixels).
pub const MIN_FACE_SIZE: u32 = 40;

/// Detector score threshold.
pub const SCORE_THRESHOLD: f64 = 2.0;

/// Side length of the grayscale crop used as a face embedding.
pub const EMBEDDING_SIDE: u32 = 32;

// ============================================================================
// Recognition
// ============================================================================

/// Maximum embedding distance still counted as a match.
pub const MATCH_TOLERANCE: f32 = 0.6;

// ============================================================================
// Publishing
// ============================================================================

/// Directory (under the user data dir) holding the published file.
pub const OUTPUT_DIR_NAME: &str = "vector_data";

/// Published file name.
pub const OUTPUT_FILE_NAME: &str = "vector.json";

/// Permission bits for published files: owner rw, group/other r.
pub const OUTPUT_FILE_MODE: u32 = 0o644;

// ============================================================================
// Poll Loop
// ============================================================================

/// Sleep between cycles (ms).
pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Sleep after a failed acquisition before retrying (ms).
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Cycles between progress log lines.
pub const PROGRESS_LOG_EVERY: u64 = 30;
