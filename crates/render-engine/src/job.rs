//! Job context: one zoom edit from validated keyframes to a finished file.
//!
//! A [`ZoomJob`] owns everything a single edit needs (keyframes, configuration,
//! cancellation) and nothing is shared between jobs. Keyframes are validated
//! when the job is built, before any decoder is started. Every run happens
//! inside a [`ScratchSpace`] that is released on success and failure alike.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use framezoom_common::clock::FrameClock;
use framezoom_common::config::AppConfig;
use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_common::scratch::{FileRemover, RetryPolicy, ScratchSpace};
use framezoom_keyframe_model::keyframe::{
    parse_keyframes, validate_keyframe_geometry, validate_keyframes, ZoomKeyframe,
};
use framezoom_processing_core::resolver::KeyframeResolver;
use framezoom_processing_core::transform::build_transformer;

use crate::decode::{probe_video, FfmpegDecoder};
use crate::encode::{FfmpegEncoder, StreamSpec};
use crate::pipeline::{CancellationFlag, FrameSink, FrameSource, RunSummary, ZoomPipeline};

/// Frame dimensions and timing of the stream a job runs over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub clock: FrameClock,
}

/// Outcome of a completed job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub strategy: &'static str,
    pub frames_processed: u64,
    pub frames_zoomed: u64,
    pub elapsed_secs: f64,
}

/// A single zoom edit.
pub struct ZoomJob {
    keyframes: Vec<ZoomKeyframe>,
    config: AppConfig,
    cancel: CancellationFlag,
    remover: Option<Arc<dyn FileRemover>>,
}

impl std::fmt::Debug for ZoomJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoomJob")
            .field("keyframes", &self.keyframes)
            .field("strategy", &self.config.transform.strategy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ZoomJob {
    /// Build a job, rejecting malformed or degenerate keyframes up front.
    pub fn new(keyframes: Vec<ZoomKeyframe>, config: AppConfig) -> FramezoomResult<Self> {
        validate_keyframes(&keyframes)?;

        let resolver = KeyframeResolver::new(keyframes.clone())?;
        for (a, b) in resolver.overlapping_pairs() {
            tracing::warn!(
                first = a,
                second = b,
                "Keyframe windows overlap; the earlier keyframe wins"
            );
        }

        Ok(Self {
            keyframes,
            config,
            cancel: CancellationFlag::new(),
            remover: None,
        })
    }

    /// Build a job from a JSON keyframe list (`zoomPoints` payload).
    pub fn from_json(json: &str, config: AppConfig) -> FramezoomResult<Self> {
        Self::new(parse_keyframes(json)?, config)
    }

    /// Share an externally controlled cancellation flag.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the filesystem backend used to clean up scratch files.
    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn keyframes(&self) -> &[ZoomKeyframe] {
        &self.keyframes
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Run `body` inside a fresh scratch space, releasing it afterwards.
    ///
    /// Cleanup failures are logged and never change the result of `body`.
    pub fn scoped<T>(
        &self,
        body: impl FnOnce(&mut ScratchSpace) -> FramezoomResult<T>,
    ) -> FramezoomResult<T> {
        let policy = RetryPolicy::from(&self.config.cleanup);
        let mut scratch = ScratchSpace::create(&self.config.scratch_dir, policy)?;
        if let Some(remover) = &self.remover {
            scratch = scratch.with_remover(Arc::clone(remover));
        }

        let result = body(&mut scratch);

        let failures = scratch.release();
        if !failures.is_empty() {
            tracing::warn!(
                failures = failures.len(),
                dir = %scratch.path().display(),
                "Scratch cleanup incomplete"
            );
        }
        result
    }

    /// Zoom the frames of `source` into `sink`.
    ///
    /// Keyframe centers are checked against the stream geometry before the
    /// first frame is pulled.
    pub fn run_streams(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        geometry: StreamGeometry,
    ) -> FramezoomResult<RunSummary> {
        if let Err(err) = validate_keyframe_geometry(&self.keyframes, geometry.width, geometry.height)
        {
            sink.abort();
            if let Err(close_err) = source.close() {
                tracing::debug!(error = %close_err, "Ignoring source close error after rejected geometry");
            }
            return Err(err);
        }

        let pipeline = ZoomPipeline::new(
            KeyframeResolver::new(self.keyframes.clone())?,
            build_transformer(&self.config.transform),
            geometry.clock,
        );
        pipeline.run(source, sink, &self.cancel)
    }

    /// Decode `input`, zoom it, and encode the result to `output`.
    pub fn run(&self, input: &Path, output: &Path) -> FramezoomResult<JobReport> {
        self.ensure_live()?;
        let started = Instant::now();
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            keyframes = self.keyframes.len(),
            strategy = self.config.transform.strategy.as_str(),
            "Starting zoom job"
        );

        let result = self.scoped(|scratch| {
            let info = probe_video(input)?;
            let geometry = StreamGeometry {
                width: info.width,
                height: info.height,
                clock: info.clock()?,
            };
            // Reject out-of-frame centers before spawning any child process.
            validate_keyframe_geometry(&self.keyframes, info.width, info.height)?;

            let mut decoder = FfmpegDecoder::spawn(info.clone())?;
            let spec = StreamSpec::from_info(&info, decoder.format());
            let mut encoder = FfmpegEncoder::create(output, spec, &self.config.encoder, scratch)?;
            let summary = self.run_streams(&mut decoder, &mut encoder, geometry)?;

            Ok(JobReport {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                width: info.width,
                height: info.height,
                fps: info.fps(),
                strategy: self.config.transform.strategy.as_str(),
                frames_processed: summary.frames_processed,
                frames_zoomed: summary.frames_zoomed,
                elapsed_secs: started.elapsed().as_secs_f64(),
            })
        });

        match &result {
            Ok(report) => tracing::info!(
                frames = report.frames_processed,
                zoomed = report.frames_zoomed,
                elapsed_secs = report.elapsed_secs,
                "Zoom job finished"
            ),
            Err(err) => tracing::error!(
                category = err.category(),
                error = %err,
                "Zoom job failed"
            ),
        }
        result
    }

    /// Zoom an uploaded video held in memory and return the encoded bytes.
    ///
    /// The upload and the result only ever touch this job's scratch space.
    pub fn process_upload(&self, video: &[u8]) -> FramezoomResult<Vec<u8>> {
        if video.is_empty() {
            return Err(FramezoomError::decode("uploaded video is empty"));
        }
        self.ensure_live()?;

        let container = self.config.encoder.container.clone();
        self.scoped(|scratch| {
            let input = scratch.file("upload.bin");
            std::fs::write(&input, video)?;
            let output = scratch.file(&format!("edited_video.{container}"));

            self.run(&input, &output)?;
            Ok(std::fs::read(&output)?)
        })
    }

    fn ensure_live(&self) -> FramezoomResult<()> {
        if self.cancel.is_cancelled() {
            tracing::info!("Zoom job cancelled before start");
            return Err(FramezoomError::Cancelled);
        }
        Ok(())
    }
}
