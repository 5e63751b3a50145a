//! Application context: everything one poll cycle needs, owned in one place.
//!
//! ```text
//! camera ──frame──▶ detector ──boxes+encodings──▶ gallery ──names──▶ geometry
//!                                                                      │
//!                                             publisher ◀──records─────┘
//! ```

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::acquisition::{
    AcquisitionError, CameraSource, DirectorySource, SnapshotSource, SyntheticSource,
};
use crate::config::{expand_home, CameraConfig, CameraKind, FacevecConfig};
use crate::storage::{PublishError, VectorPublisher};
use crate::types::{FaceBox, RecordError, VectorRecord};
use crate::vision::{detect_faces, DetectionError, FaceDetector, KnownFaces, VectorGeometry};

/// Why a cycle produced no publication.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("invalid vector: {0}")]
    Record(#[from] RecordError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// What one successful cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleOutcome {
    /// Faces in this cycle's records
    pub faces: usize,
    /// Of those, faces matched to a gallery name
    pub known: usize,
    /// False when the detector was skipped and the previous boxes reused
    pub detected: bool,
    /// False when the empty policy suppressed the write
    pub published: bool,
}

/// Long-lived state passed through every cycle.
pub struct AppContext {
    camera: Box<dyn CameraSource>,
    detector: Box<dyn FaceDetector>,
    gallery: KnownFaces,
    geometry: VectorGeometry,
    publisher: VectorPublisher,
    downscale: u32,
    detect_every: u32,
    frames_seen: u64,
    last_faces: Vec<(String, FaceBox)>,
}

impl AppContext {
    pub fn new(
        camera: Box<dyn CameraSource>,
        detector: Box<dyn FaceDetector>,
        gallery: KnownFaces,
        geometry: VectorGeometry,
        publisher: VectorPublisher,
    ) -> Self {
        Self {
            camera,
            detector,
            gallery,
            geometry,
            publisher,
            downscale: 1,
            detect_every: 1,
            frames_seen: 0,
            last_faces: Vec::new(),
        }
    }

    /// Run detection on frames shrunk by `downscale`, and only on every
    /// `detect_every`-th frame (others reuse the last result).
    #[must_use]
    pub fn with_cadence(mut self, downscale: u32, detect_every: u32) -> Self {
        self.downscale = downscale.max(1);
        self.detect_every = detect_every.max(1);
        self
    }

    /// Build camera, detector and gallery from configuration.
    ///
    /// Reference images for known faces are loaded and enrolled here, so a
    /// missing or faceless reference fails startup.
    pub fn from_config(config: &FacevecConfig) -> Result<Self> {
        let camera = build_camera(&config.camera)?;
        let mut detector = build_detector(config)?;

        let mut gallery = KnownFaces::new(config.recognition.tolerance);
        enroll_known_faces(config, detector.as_mut(), &mut gallery)?;

        let geometry = VectorGeometry::from_config(&config.vectors);
        let publisher = VectorPublisher::from_config(&config.publish);

        Ok(Self::new(camera, detector, gallery, geometry, publisher)
            .with_cadence(config.detection.downscale, config.detection.detect_every))
    }

    pub fn camera_name(&self) -> &str {
        self.camera.source_name()
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.backend_name()
    }

    pub fn gallery(&self) -> &KnownFaces {
        &self.gallery
    }

    pub fn publisher(&self) -> &VectorPublisher {
        &self.publisher
    }

    /// Acquire one frame, locate and name faces, and publish their vectors.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        let frame = self.camera.read_frame()?;
        let (width, height) = (frame.width(), frame.height());

        let detect = self.frames_seen % u64::from(self.detect_every) == 0;
        self.frames_seen += 1;

        if detect {
            let detections = match detect_faces(self.detector.as_mut(), &frame, self.downscale) {
                Ok(detections) => detections,
                Err(e) => {
                    // Skip frames must not republish faces from before the failure.
                    self.last_faces.clear();
                    return Err(e.into());
                }
            };
            self.last_faces = detections
                .into_iter()
                .map(|d| (self.gallery.identify(&d.encoding).to_string(), d.face))
                .collect();
        }

        let records = self
            .last_faces
            .iter()
            .map(|(name, face)| self.geometry.record(name, face, width, height))
            .collect::<Result<Vec<VectorRecord>, _>>()?;

        let known = records.iter().filter(|r| !r.is_unknown()).count();
        let published = if records.is_empty() {
            self.publisher.publish_empty()?
        } else {
            self.publisher.publish(&records)?;
            true
        };

        debug!(faces = records.len(), known, detected = detect, "Cycle complete");

        Ok(CycleOutcome {
            faces: records.len(),
            known,
            detected: detect,
            published,
        })
    }

    pub fn release_camera(&mut self) {
        self.camera.release();
    }
}

fn build_camera(config: &CameraConfig) -> Result<Box<dyn CameraSource>> {
    let path = || {
        config
            .path
            .as_deref()
            .map(expand_home)
            .with_context(|| format!("camera source '{}' requires camera.path", config.source))
    };

    let camera: Box<dyn CameraSource> = match config.source {
        CameraKind::Snapshot => Box::new(SnapshotSource::new(path()?)),
        CameraKind::Directory => {
            let dir = path()?;
            Box::new(
                DirectorySource::open(&dir)
                    .with_context(|| format!("Failed to open replay directory {}", dir.display()))?,
            )
        }
        CameraKind::Synthetic => Box::new(SyntheticSource::new(config.width, config.height)),
    };
    Ok(camera)
}

#[cfg(feature = "rustface")]
fn build_detector(config: &FacevecConfig) -> Result<Box<dyn FaceDetector>> {
    let model = expand_home(&config.detection.model_path);
    let detector = crate::vision::RustfaceDetector::from_model_file(
        &model,
        config.detection.min_face_size,
        config.detection.score_threshold,
    )
    .context("Failed to initialise face detector")?;
    info!(model = %model.display(), "Loaded SeetaFace detector");
    Ok(Box::new(detector))
}

#[cfg(not(feature = "rustface"))]
fn build_detector(_config: &FacevecConfig) -> Result<Box<dyn FaceDetector>> {
    warn!("Built without a detection backend; no faces will be reported (enable feature `rustface`)");
    Ok(Box::new(crate::vision::NullDetector))
}

fn enroll_known_faces(
    config: &FacevecConfig,
    detector: &mut dyn FaceDetector,
    gallery: &mut KnownFaces,
) -> Result<()> {
    if config.recognition.known.is_empty() {
        return Ok(());
    }
    if cfg!(not(feature = "rustface")) {
        warn!(
            count = config.recognition.known.len(),
            "Known faces configured but no detection backend; skipping enrollment"
        );
        return Ok(());
    }

    for entry in &config.recognition.known {
        let path = expand_home(&entry.image);
        let frame = crate::acquisition::load_frame(&path).map_err(|source| {
            DetectionError::ReferenceImage {
                name: entry.name.clone(),
                source,
            }
        })?;
        gallery
            .enroll(detector, &entry.name, &frame)
            .with_context(|| format!("Failed to enroll '{}' from {}", entry.name, path.display()))?;
    }
    info!(known = gallery.len(), "Gallery ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EmptyPolicy;
    use crate::types::{Envelope, Frame};
    use crate::vision::FaceEncoding;
    use image::RgbImage;
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::tempdir;

    struct BlankCamera;

    impl CameraSource for BlankCamera {
        fn read_frame(&mut self) -> Result<Frame, AcquisitionError> {
            Ok(Frame::new(RgbImage::new(640, 480)))
        }
        fn release(&mut self) {}
        fn source_name(&self) -> &str {
            "blank"
        }
    }

    /// Reports fixed faces, each with a fixed encoding; counts `locate` calls.
    struct ScriptedDetector {
        faces: Vec<(FaceBox, Vec<f32>)>,
        calls: Rc<Cell<usize>>,
        fail_on_call: Option<usize>,
    }

    impl FaceDetector for ScriptedDetector {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_on_call == Some(self.calls.get()) {
                return Err(DetectionError::Backend("scripted failure".to_string()));
            }
            Ok(self.faces.iter().map(|(b, _)| *b).collect())
        }
        fn encode(
            &mut self,
            _frame: &Frame,
            _boxes: &[FaceBox],
        ) -> Result<Vec<FaceEncoding>, DetectionError> {
            Ok(self.faces.iter().map(|(_, e)| FaceEncoding::new(e.clone())).collect())
        }
        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn context(
        target: &Path,
        faces: Vec<(FaceBox, Vec<f32>)>,
        policy: EmptyPolicy,
    ) -> (AppContext, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let mut gallery = KnownFaces::new(0.6);
        gallery.add("Known", FaceEncoding::new(vec![0.0, 0.0]));
        let ctx = AppContext::new(
            Box::new(BlankCamera),
            Box::new(ScriptedDetector {
                faces,
                calls: Rc::clone(&calls),
                fail_on_call: None,
            }),
            gallery,
            VectorGeometry::default(),
            VectorPublisher::new(vec![target.to_path_buf()], policy, 0o644),
        );
        (ctx, calls)
    }

    fn read(target: &Path) -> Envelope {
        serde_json::from_str(&std::fs::read_to_string(target).unwrap()).unwrap()
    }

    #[test]
    fn test_cycle_publishes_named_vectors() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("vector.json");
        let faces = vec![
            (FaceBox::new(100, 300, 200, 200), vec![0.0, 0.1]),
            (FaceBox::new(200, 360, 280, 280), vec![5.0, 5.0]),
        ];
        let (mut ctx, _) = context(&target, faces, EmptyPolicy::WriteEmpty);

        let outcome = ctx.run_cycle().unwrap();
        assert_eq!(outcome.faces, 2);
        assert_eq!(outcome.known, 1);
        assert!(outcome.published);

        let env = read(&target);
        assert_eq!(env.vectors[0].name(), "Known");
        assert!((env.vectors[0].x() + 70.0).abs() < 1e-9);
        assert!((env.vectors[0].y() - 90.0).abs() < 1e-9);
        assert!(env.vectors[1].is_unknown());
    }

    #[test]
    fn test_no_faces_writes_empty_envelope() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("vector.json");
        let (mut ctx, _) = context(&target, Vec::new(), EmptyPolicy::WriteEmpty);

        let outcome = ctx.run_cycle().unwrap();
        assert_eq!(outcome.faces, 0);
        assert!(outcome.published);
        assert!(read(&target).is_empty());
    }

    #[test]
    fn test_no_faces_keep_last_writes_nothing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("vector.json");
        let (mut ctx, _) = context(&target, Vec::new(), EmptyPolicy::KeepLast);

        assert!(!ctx.run_cycle().unwrap().published);
        assert!(!target.exists());
    }

    #[test]
    fn test_detect_every_reuses_previous_faces() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("vector.json");
        let faces = vec![(FaceBox::new(100, 300, 200, 200), vec![0.0, 0.0])];
        let (ctx, calls) = context(&target, faces, EmptyPolicy::WriteEmpty);
        let mut ctx = ctx.with_cadence(1, 2);

        assert!(ctx.run_cycle().unwrap().detected);
        let second = ctx.run_cycle().unwrap();
        assert!(!second.detected);
        assert_eq!(second.faces, 1);
        assert!(ctx.run_cycle().unwrap().detected);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_failed_detection_drops_previous_faces() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("vector.json");
        let mut gallery = KnownFaces::new(0.6);
        gallery.add("Known", FaceEncoding::new(vec![0.0, 0.0]));
        let mut ctx = AppContext::new(
            Box::new(BlankCamera),
            Box::new(ScriptedDetector {
                faces: vec![(FaceBox::new(100, 300, 200, 200), vec![0.0, 0.0])],
                calls: Rc::new(Cell::new(0)),
                fail_on_call: Some(2),
            }),
            gallery,
            VectorGeometry::default(),
            VectorPublisher::new(vec![target.clone()], EmptyPolicy::WriteEmpty, 0o644),
        )
        .with_cadence(1, 2);

        assert_eq!(ctx.run_cycle().unwrap().faces, 1);
        assert_eq!(ctx.run_cycle().unwrap().faces, 1);
        assert!(matches!(ctx.run_cycle(), Err(CycleError::Detection(_))));

        let skipped = ctx.run_cycle().unwrap();
        assert!(!skipped.detected);
        assert_eq!(skipped.faces, 0);
        assert!(read(&target).is_empty());
    }

    #[cfg(not(feature = "rustface"))]
    #[test]
    fn test_from_config_synthetic() {
        let dir = tempdir().unwrap();
        let mut config = FacevecConfig::default();
        config.camera.source = CameraKind::Synthetic;
        config.publish.targets = vec![dir.path().join("out/vector.json").display().to_string()];

        let mut ctx = AppContext::from_config(&config).unwrap();
        assert_eq!(ctx.camera_name(), "synthetic");
        assert!(ctx.gallery().is_empty());
        // A blank frame has no faces; the empty envelope is written.
        let outcome = ctx.run_cycle().unwrap();
        assert_eq!(outcome.faces, 0);
        assert!(dir.path().join("out/vector.json").exists());
    }

    #[test]
    fn test_from_config_missing_replay_dir_fails() {
        let dir = tempdir().unwrap();
        let mut config = FacevecConfig::default();
        config.camera.source = CameraKind::Directory;
        config.camera.path = Some(dir.path().join("absent").display().to_string());
        assert!(AppContext::from_config(&config).is_err());
    }
}
