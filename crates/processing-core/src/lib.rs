//! FrameZoom Processing Core — The Zoom Engine
//!
//! Turns a keyframe list and a frame timestamp into pixels:
//! - **Resolver:** Find the active keyframe window and interpolate its zoom
//! - **Transformers:** Apply the zoom to a frame (affine or center-crop)
//! - **Sampling:** Bilinear sampling with a deterministic border policy
//!
//! This crate is pure computation. It does no I/O and spawns no processes.
//! All inputs are data; all outputs are data.

pub mod resolver;
pub mod sample;
pub mod transform;

pub use resolver::{interpolate_zoom, resolve, KeyframeResolver};
pub use transform::{build_transformer, AffineZoom, CenterCropZoom, FrameTransformer};
