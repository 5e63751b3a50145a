//! Pipeline Replay Tests
//!
//! Drive the full acquire → detect → name → publish path from a directory of
//! frames, with a scripted detector standing in for a real backend.

use facevec::acquisition::{CameraSource, DirectorySource};
use facevec::config::{CameraKind, FacevecConfig, PollConfig};
use facevec::pipeline::{AppContext, PollLoop};
use facevec::storage::{EmptyPolicy, VectorPublisher};
use facevec::types::{Envelope, FaceBox, Frame};
use facevec::vision::{
    DetectionError, FaceDetector, FaceEncoding, KnownFaces, Units, VectorGeometry, XAxis, YAxis,
};
use image::{Rgb, RgbImage};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Finds one face wherever the frame has a white pixel; encodes by the red
/// channel of the top-left pixel so frames can be told apart.
struct MarkerDetector;

impl FaceDetector for MarkerDetector {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        Ok(frame
            .image()
            .enumerate_pixels()
            .find(|(_, _, p)| p.0 == [255, 255, 255])
            .map(|(x, y, _)| FaceBox::new(y.saturating_sub(10), x + 10, y + 10, x.saturating_sub(10)))
            .into_iter()
            .collect())
    }

    fn encode(
        &mut self,
        frame: &Frame,
        boxes: &[FaceBox],
    ) -> Result<Vec<FaceEncoding>, DetectionError> {
        let tag = f32::from(frame.image().get_pixel(0, 0).0[0]) / 255.0;
        Ok(boxes.iter().map(|_| FaceEncoding::new(vec![tag])).collect())
    }

    fn backend_name(&self) -> &'static str {
        "marker"
    }
}

/// 200x100 frame, top-left pixel red = `tag`, optional white marker at (x, y).
fn write_frame(path: &Path, tag: u8, marker: Option<(u32, u32)>) {
    let mut img = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
    img.put_pixel(0, 0, Rgb([tag, 0, 0]));
    if let Some((x, y)) = marker {
        img.put_pixel(x, y, Rgb([255, 255, 255]));
    }
    img.save(path).unwrap();
}

fn read_envelope(path: &Path) -> Envelope {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn context(frames: &Path, target: &Path, geometry: VectorGeometry) -> AppContext {
    let mut gallery = KnownFaces::new(0.1);
    gallery.add("Alice", FaceEncoding::new(vec![0.0]));

    AppContext::new(
        Box::new(DirectorySource::open(frames).unwrap()),
        Box::new(MarkerDetector),
        gallery,
        geometry,
        VectorPublisher::new(vec![target.to_path_buf()], EmptyPolicy::WriteEmpty, 0o644),
    )
}

#[test]
fn replayed_frames_publish_in_order() {
    let frames = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("vector.json");

    // Frame 1: Alice (tag 0) right of centre. Frame 2: a stranger (tag 255)
    // above-left. Frame 3: nobody.
    write_frame(&frames.path().join("001.png"), 0, Some((150, 50)));
    write_frame(&frames.path().join("002.png"), 255, Some((50, 20)));
    write_frame(&frames.path().join("003.png"), 0, None);

    let mut ctx = context(frames.path(), &target, VectorGeometry::default());

    ctx.run_cycle().unwrap();
    let env = read_envelope(&target);
    assert_eq!(env.vectors.len(), 1);
    assert_eq!(env.vectors[0].name(), "Alice");
    assert!((env.vectors[0].x() - 50.0).abs() < 1e-9);
    assert!(env.vectors[0].y().abs() < 1e-9);

    ctx.run_cycle().unwrap();
    let env = read_envelope(&target);
    assert!(env.vectors[0].is_unknown());
    assert!((env.vectors[0].x() + 50.0).abs() < 1e-9);
    assert!((env.vectors[0].y() - 30.0).abs() < 1e-9);

    ctx.run_cycle().unwrap();
    assert!(read_envelope(&target).is_empty());
}

#[test]
fn percent_mirrored_geometry_applies_to_published_records() {
    let frames = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("vector.json");
    write_frame(&frames.path().join("only.png"), 0, Some((150, 50)));

    let geometry = VectorGeometry::new(Units::Percent, XAxis::Left, YAxis::Up);
    let mut ctx = context(frames.path(), &target, geometry);
    ctx.run_cycle().unwrap();

    let env = read_envelope(&target);
    assert!((env.vectors[0].x() + 50.0).abs() < 1e-9);
    let magnitude = env.vectors[0].magnitude().unwrap();
    assert!((magnitude - 50.0).abs() < 1e-9);
}

#[test]
fn corrupt_frame_skips_cycle_and_keeps_last_output() {
    let frames = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("vector.json");
    write_frame(&frames.path().join("001.png"), 0, Some((150, 50)));
    std::fs::write(frames.path().join("002.png"), b"truncated").unwrap();

    let mut ctx = context(frames.path(), &target, VectorGeometry::default());
    ctx.run_cycle().unwrap();
    assert!(ctx.run_cycle().is_err());

    assert_eq!(read_envelope(&target).vectors[0].name(), "Alice");
}

#[tokio::test]
async fn poll_loop_runs_until_cancelled() {
    let frames = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("vector.json");
    write_frame(&frames.path().join("001.png"), 0, Some((100, 50)));

    let ctx = context(frames.path(), &target, VectorGeometry::default());
    let cancel = CancellationToken::new();
    let poll = PollConfig {
        interval_ms: 5,
        retry_delay_ms: 5,
    };

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        stopper.cancel();
    });

    let stats = PollLoop::new(ctx, &poll, cancel).run().await;
    assert!(stats.cycles >= 2);
    assert_eq!(stats.publishes, stats.cycles);
    assert_eq!(stats.known_seen, stats.cycles);
    assert_eq!(stats.failures(), 0);
}

#[test]
fn from_config_directory_source() {
    let frames = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_frame(&frames.path().join("001.png"), 0, None);

    let mut config = FacevecConfig::default();
    config.camera.source = CameraKind::Directory;
    config.camera.path = Some(frames.path().display().to_string());
    config.publish.targets = vec![out.path().join("vector.json").display().to_string()];
    config.detection.model_path = "/nonexistent/model.bin".to_string();

    match AppContext::from_config(&config) {
        Ok(ctx) => assert_eq!(ctx.camera_name(), "directory"),
        // With the rustface backend enabled the bogus model path must fail startup.
        Err(e) => assert!(cfg!(feature = "rustface"), "unexpected failure: {e:#}"),
    }
}

#[test]
fn directory_source_is_a_camera() {
    let frames = tempfile::tempdir().unwrap();
    write_frame(&frames.path().join("a.png"), 7, None);
    let mut cam: Box<dyn CameraSource> = Box::new(DirectorySource::open(frames.path()).unwrap());
    assert_eq!(cam.read_frame().unwrap().image().get_pixel(0, 0).0, [7, 0, 0]);
    cam.release();
    assert!(cam.read_frame().is_err());
}
