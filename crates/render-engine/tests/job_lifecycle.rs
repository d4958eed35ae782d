//! Job-level guarantees: up-front validation and scratch cleanup.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use framezoom_common::clock::FrameClock;
use framezoom_common::config::{AppConfig, CleanupSettings};
use framezoom_common::error::FramezoomError;
use framezoom_common::scratch::FileRemover;
use framezoom_keyframe_model::frame::{FrameBuffer, PixelFormat};
use framezoom_keyframe_model::keyframe::ZoomKeyframe;
use framezoom_render_engine::{MemorySink, MemorySource, StreamGeometry, ZoomJob};

fn config(root: &Path, attempts: u32) -> AppConfig {
    AppConfig {
        scratch_dir: root.to_path_buf(),
        cleanup: CleanupSettings {
            attempts,
            pause_ms: 1,
        },
        ..AppConfig::default()
    }
}

fn frames(n: usize) -> Vec<FrameBuffer> {
    (0..n)
        .map(|_| FrameBuffer::filled(16, 16, PixelFormat::Rgb24, &[1, 2, 3]).unwrap())
        .collect()
}

fn geometry() -> StreamGeometry {
    StreamGeometry {
        width: 16,
        height: 16,
        clock: FrameClock::new(30.0).unwrap(),
    }
}

/// Fails the first `failures` removals of every path, then really removes it.
struct FlakyRemover {
    failures: u32,
    attempts: Mutex<HashMap<PathBuf, u32>>,
}

impl FlakyRemover {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts_for(&self, path: &Path) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    fn busy(&self, path: &Path) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(path.to_path_buf()).or_insert(0);
        *count += 1;
        *count <= self.failures
    }
}

impl FileRemover for FlakyRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.busy(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "file is in use"));
        }
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        if self.busy(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "directory is in use"));
        }
        std::fs::remove_dir_all(path)
    }
}

#[test]
fn cleanup_succeeding_on_fifth_attempt_keeps_job_successful() {
    let dir = tempfile::tempdir().unwrap();
    let remover = Arc::new(FlakyRemover::new(4));
    let job = ZoomJob::new(
        vec![ZoomKeyframe::new(0.0, 1.0, 1.0, 2.0, 8.0, 8.0)],
        config(dir.path(), 5),
    )
    .unwrap()
    .with_remover(remover.clone());

    let mut intermediate = PathBuf::new();
    let mut scratch_dir = PathBuf::new();
    let summary = job
        .scoped(|scratch| {
            intermediate = scratch.file("intermediate.mkv");
            scratch_dir = scratch.path().to_path_buf();
            std::fs::write(&intermediate, b"lossless frames")?;

            let mut source = MemorySource::new(frames(30));
            let mut sink = MemorySink::new();
            job.run_streams(&mut source, &mut sink, geometry())
        })
        .unwrap();

    assert_eq!(summary.frames_processed, 30);
    assert!(!intermediate.exists());
    assert!(!scratch_dir.exists());
    assert_eq!(remover.attempts_for(&intermediate), 5);
    assert_eq!(remover.attempts_for(&scratch_dir), 5);
}

#[test]
fn exhausted_cleanup_is_logged_not_escalated() {
    let dir = tempfile::tempdir().unwrap();
    let remover = Arc::new(FlakyRemover::new(u32::MAX));
    let job = ZoomJob::new(Vec::new(), config(dir.path(), 3))
        .unwrap()
        .with_remover(remover.clone());

    let mut intermediate = PathBuf::new();
    let result = job.scoped(|scratch| {
        intermediate = scratch.file("intermediate.mkv");
        std::fs::write(&intermediate, b"stuck")?;
        Ok(42)
    });

    assert_eq!(result.unwrap(), 42);
    assert_eq!(remover.attempts_for(&intermediate), 3);
    assert!(intermediate.exists());
}

#[test]
fn degenerate_keyframe_is_rejected_before_any_frame() {
    let dir = tempfile::tempdir().unwrap();
    let payload = r#"[{"startTime": 2.0, "endTime": 2.0, "startZoom": 1.0, "endZoom": 2.0, "x": 8, "y": 8}]"#;

    let mut source = MemorySource::new(frames(10));
    let mut sink = MemorySink::new();
    let mut constructed = false;
    let result = ZoomJob::from_json(payload, config(dir.path(), 5)).and_then(|job| {
        constructed = true;
        job.run_streams(&mut source, &mut sink, geometry())
    });

    assert!(matches!(result, Err(FramezoomError::InvalidKeyframe { .. })));
    assert!(!constructed);
    assert_eq!(source.pulled(), 0);
    assert!(!sink.is_finished());
    assert!(sink.frames().is_empty());
}

#[test]
fn malformed_payload_is_invalid_keyframe() {
    let dir = tempfile::tempdir().unwrap();
    for payload in [r#"{"startTime": 1}"#, r#"[{"startTime": "soon"}]"#, "not json"] {
        let err = ZoomJob::from_json(payload, config(dir.path(), 5)).unwrap_err();
        assert!(
            matches!(err, FramezoomError::InvalidKeyframe { .. }),
            "payload {payload:?} gave {err:?}"
        );
    }
}

#[test]
fn overlapping_keyframes_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let job = ZoomJob::new(
        vec![
            ZoomKeyframe::new(0.0, 2.0, 1.0, 2.0, 8.0, 8.0),
            ZoomKeyframe::new(1.0, 3.0, 1.0, 3.0, 4.0, 4.0),
        ],
        config(dir.path(), 5),
    )
    .unwrap();
    assert_eq!(job.keyframes().len(), 2);
}
