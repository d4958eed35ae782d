//! FrameZoom Render Engine
//!
//! Streams a video through the zoom engine: frames are decoded by ffmpeg,
//! zoomed according to the job's keyframes, and re-encoded.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.webm ──► ffprobe (size, rate)
//!     │
//!     ▼
//! ffmpeg decode (rawvideo rgb24) ──► frame i
//!                                      │  t = i / fps
//! keyframes.json ──► Resolver ─────────┤
//!                                      ▼
//!                        Transformer (affine | center-crop)
//!                                      │
//!                                      ▼
//!                  ffmpeg encode (direct | ffv1 intermediate ──► transcode)
//!                                      │
//!                                      ▼
//!                                 output.webm
//! ```
//!
//! Scratch files live in a per-job directory that is removed on every exit path.

pub mod decode;
pub mod encode;
pub mod job;
pub mod pipeline;

pub use decode::{command_exists, probe_video, FfmpegDecoder, VideoInfo};
pub use encode::{FfmpegEncoder, StreamSpec};
pub use job::{JobReport, StreamGeometry, ZoomJob};
pub use pipeline::{
    CancellationFlag, FrameSink, FrameSource, MemorySink, MemorySource, ProcessedFrames,
    RunSummary, ZoomPipeline,
};
