//! Frame pipeline: pull decoded frames, zoom them, push them to a sink.
//!
//! Frames carry no timestamps. The pipeline derives `t = index / fps` from
//! a [`FrameClock`] and a running index, asks the resolver for the active
//! zoom, and hands the frame to the transformer. Output order and count
//! always match the input.

use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framezoom_common::clock::FrameClock;
use framezoom_common::config::TransformSettings;
use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_keyframe_model::frame::FrameBuffer;
use framezoom_keyframe_model::keyframe::ZoomKeyframe;
use framezoom_processing_core::resolver::KeyframeResolver;
use framezoom_processing_core::transform::{build_transformer, FrameTransformer};

/// A producer of decoded frames in presentation order.
pub trait FrameSource {
    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> FramezoomResult<Option<FrameBuffer>>;

    /// Release the underlying decoder. Safe to call more than once.
    fn close(&mut self) -> FramezoomResult<()> {
        Ok(())
    }
}

/// A consumer of output frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &FrameBuffer) -> FramezoomResult<()>;

    /// Finalize the output. Called once, after the last frame.
    fn finish(&mut self) -> FramezoomResult<()>;

    /// Discard everything written so far.
    fn abort(&mut self);
}

/// Cooperative cancellation shared between a job and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    /// Frames pulled, transformed and emitted.
    pub frames_processed: u64,
    /// Frames that fell inside a keyframe window.
    pub frames_zoomed: u64,
}

/// Keyframes, transformer and clock for one job.
pub struct ZoomPipeline {
    resolver: KeyframeResolver,
    transformer: Box<dyn FrameTransformer>,
    clock: FrameClock,
}

impl std::fmt::Debug for ZoomPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoomPipeline")
            .field("keyframes", &self.resolver.len())
            .field("transformer", &self.transformer.name())
            .field("fps", &self.clock.fps())
            .finish()
    }
}

impl ZoomPipeline {
    pub fn new(
        resolver: KeyframeResolver,
        transformer: Box<dyn FrameTransformer>,
        clock: FrameClock,
    ) -> Self {
        Self {
            resolver,
            transformer,
            clock,
        }
    }

    /// Validate `keyframes` and build the configured transformer.
    pub fn from_settings(
        keyframes: Vec<ZoomKeyframe>,
        settings: &TransformSettings,
        clock: FrameClock,
    ) -> FramezoomResult<Self> {
        Ok(Self::new(
            KeyframeResolver::new(keyframes)?,
            build_transformer(settings),
            clock,
        ))
    }

    pub fn resolver(&self) -> &KeyframeResolver {
        &self.resolver
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    /// Lazily zoom `frames`, one output per input, in order.
    ///
    /// The first error is yielded and ends the stream.
    pub fn process<I>(&self, frames: I) -> ProcessedFrames<'_, I::IntoIter>
    where
        I: IntoIterator<Item = FramezoomResult<FrameBuffer>>,
    {
        ProcessedFrames {
            pipeline: self,
            frames: frames.into_iter(),
            index: 0,
            zoomed: 0,
            done: false,
        }
    }

    /// Drive every frame of `source` into `sink`.
    ///
    /// On success the source is closed and the sink finished. On any error,
    /// or when `cancel` is raised between frames, the sink is aborted and the
    /// source closed before the error is returned.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancellationFlag,
    ) -> FramezoomResult<RunSummary> {
        let summary = match self.pump(source, sink, cancel) {
            Ok(summary) => summary,
            Err(err) => {
                sink.abort();
                if let Err(close_err) = source.close() {
                    tracing::debug!(error = %close_err, "Ignoring source close error after failure");
                }
                return Err(err);
            }
        };

        if let Err(err) = source.close() {
            sink.abort();
            return Err(err);
        }
        sink.finish()?;

        tracing::info!(
            frames = summary.frames_processed,
            zoomed = summary.frames_zoomed,
            transformer = self.transformer.name(),
            "Pipeline finished"
        );
        Ok(summary)
    }

    fn pump(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancellationFlag,
    ) -> FramezoomResult<RunSummary> {
        let mut frames = self.process(SourceFrames::new(source));
        loop {
            if cancel.is_cancelled() {
                tracing::info!(frames = frames.frames_processed(), "Pipeline cancelled");
                return Err(FramezoomError::Cancelled);
            }
            let Some(frame) = frames.next() else {
                break;
            };
            sink.write_frame(&frame?)?;
        }
        Ok(frames.summary())
    }

    fn apply(&self, index: u64, frame: FrameBuffer) -> FramezoomResult<(FrameBuffer, bool)> {
        let t = self.clock.time_of(index);
        let resolution = self.resolver.resolve(t);
        let zoomed = resolution.is_active();
        if zoomed {
            tracing::trace!(index, t, zoom = resolution.zoom_factor(), "Zooming frame");
        }
        let out = self.transformer.transform(frame, &resolution)?;
        Ok((out, zoomed))
    }
}

/// Iterator returned by [`ZoomPipeline::process`].
pub struct ProcessedFrames<'a, I> {
    pipeline: &'a ZoomPipeline,
    frames: I,
    index: u64,
    zoomed: u64,
    done: bool,
}

impl<I> ProcessedFrames<'_, I> {
    /// Frames emitted so far.
    pub fn frames_processed(&self) -> u64 {
        self.index
    }

    pub fn frames_zoomed(&self) -> u64 {
        self.zoomed
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames_processed: self.index,
            frames_zoomed: self.zoomed,
        }
    }
}

impl<I> Iterator for ProcessedFrames<'_, I>
where
    I: Iterator<Item = FramezoomResult<FrameBuffer>>,
{
    type Item = FramezoomResult<FrameBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let frame = match self.frames.next() {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                self.done = true;
                return Some(Err(err));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        match self.pipeline.apply(self.index, frame) {
            Ok((out, zoomed)) => {
                self.index += 1;
                if zoomed {
                    self.zoomed += 1;
                }
                Some(Ok(out))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<I> FusedIterator for ProcessedFrames<'_, I> where
    I: Iterator<Item = FramezoomResult<FrameBuffer>>
{
}

/// Adapts a [`FrameSource`] into an iterator that stops after the first error.
pub struct SourceFrames<'a> {
    source: &'a mut dyn FrameSource,
    done: bool,
}

impl<'a> SourceFrames<'a> {
    pub fn new(source: &'a mut dyn FrameSource) -> Self {
        Self {
            source,
            done: false,
        }
    }
}

impl Iterator for SourceFrames<'_> {
    type Item = FramezoomResult<FrameBuffer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for SourceFrames<'_> {}

/// In-memory [`FrameSource`] over pre-decoded frames.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: std::collections::VecDeque<FramezoomResult<FrameBuffer>>,
    pulled: u64,
    closed: bool,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = FrameBuffer>) -> Self {
        Self::from_results(frames.into_iter().map(Ok))
    }

    /// A source that replays the given results, errors included.
    pub fn from_results(frames: impl IntoIterator<Item = FramezoomResult<FrameBuffer>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pulled: 0,
            closed: false,
        }
    }

    /// Number of successful `next_frame` calls that returned a frame or error.
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> FramezoomResult<Option<FrameBuffer>> {
        match self.frames.pop_front() {
            Some(item) => {
                self.pulled += 1;
                item.map(Some)
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> FramezoomResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// In-memory [`FrameSink`] that keeps every frame written to it.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<FrameBuffer>,
    finished: bool,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<FrameBuffer> {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &FrameBuffer) -> FramezoomResult<()> {
        if self.finished || self.aborted {
            return Err(FramezoomError::encode("sink is already closed"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> FramezoomResult<()> {
        if self.aborted {
            return Err(FramezoomError::encode("sink was aborted"));
        }
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framezoom_common::config::{EdgeFill, TransformStrategy};
    use framezoom_keyframe_model::frame::PixelFormat;

    /// Uniform frame whose value encodes its index.
    fn tagged(index: u8) -> FrameBuffer {
        FrameBuffer::filled(4, 4, PixelFormat::Rgb24, &[index, index, index]).unwrap()
    }

    fn pipeline(keyframes: Vec<ZoomKeyframe>) -> ZoomPipeline {
        ZoomPipeline::from_settings(
            keyframes,
            &TransformSettings {
                strategy: TransformStrategy::Affine,
                edge_fill: EdgeFill::Replicate,
                min_zoom: 1.0,
            },
            FrameClock::new(10.0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_process_preserves_order_and_count() {
        let zoom = ZoomKeyframe::new(0.2, 0.5, 2.0, 3.0, 2.0, 2.0);
        let pipeline = pipeline(vec![zoom]);
        let input: Vec<_> = (0..12).map(|i| Ok(tagged(i))).collect();

        let out: Vec<_> = pipeline
            .process(input)
            .collect::<FramezoomResult<Vec<_>>>()
            .unwrap();

        assert_eq!(out.len(), 12);
        for (i, frame) in out.iter().enumerate() {
            assert_eq!(frame.pixel(0, 0)[0], i as u8);
        }
    }

    #[test]
    fn test_process_counts_zoomed_frames() {
        // Indices 2..=5 fall inside [0.2, 0.5] at 10 fps.
        let zoom = ZoomKeyframe::new(0.2, 0.5, 2.0, 3.0, 2.0, 2.0);
        let pipeline = pipeline(vec![zoom]);
        let mut frames = pipeline.process((0..10).map(|i| Ok(tagged(i))));
        for item in frames.by_ref() {
            item.unwrap();
        }
        assert_eq!(
            frames.summary(),
            RunSummary {
                frames_processed: 10,
                frames_zoomed: 4
            }
        );
    }

    #[test]
    fn test_process_fuses_after_error() {
        let pipeline = pipeline(Vec::new());
        let input = vec![
            Ok(tagged(0)),
            Err(FramezoomError::decode("corrupt packet")),
            Ok(tagged(2)),
        ];
        let mut frames = pipeline.process(input);

        assert!(frames.next().unwrap().is_ok());
        assert!(matches!(
            frames.next(),
            Some(Err(FramezoomError::Decode { .. }))
        ));
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        assert_eq!(frames.frames_processed(), 1);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let pipeline = pipeline(Vec::new());
        assert_eq!(pipeline.process(Vec::new()).count(), 0);
    }

    #[test]
    fn test_run_finishes_sink_and_closes_source() {
        let pipeline = pipeline(Vec::new());
        let mut source = MemorySource::new((0..5).map(tagged));
        let mut sink = MemorySink::new();

        let summary = pipeline
            .run(&mut source, &mut sink, &CancellationFlag::new())
            .unwrap();

        assert_eq!(summary.frames_processed, 5);
        assert!(sink.is_finished());
        assert!(source.is_closed());
        assert_eq!(sink.frames().len(), 5);
    }

    #[test]
    fn test_run_aborts_sink_on_decode_error() {
        let pipeline = pipeline(Vec::new());
        let mut source = MemorySource::from_results(vec![
            Ok(tagged(0)),
            Err(FramezoomError::decode("truncated frame")),
        ]);
        let mut sink = MemorySink::new();

        let err = pipeline
            .run(&mut source, &mut sink, &CancellationFlag::new())
            .unwrap_err();

        assert!(matches!(err, FramezoomError::Decode { .. }));
        assert!(sink.is_aborted());
        assert!(!sink.is_finished());
        assert!(sink.frames().is_empty());
        assert!(source.is_closed());
    }

    #[test]
    fn test_run_observes_pre_raised_cancellation() {
        let pipeline = pipeline(Vec::new());
        let mut source = MemorySource::new((0..5).map(tagged));
        let mut sink = MemorySink::new();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let err = pipeline.run(&mut source, &mut sink, &cancel).unwrap_err();
        assert!(matches!(err, FramezoomError::Cancelled));
        assert_eq!(source.pulled(), 0);
        assert!(sink.is_aborted());
    }

    #[test]
    fn test_cancellation_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
