//! FrameZoom Keyframe Model
//!
//! Defines the core data contracts for a zoom job:
//! - **Keyframes:** Time windows with start/end zoom factors and a pixel-space center
//! - **Zoom state:** The interpolated zoom applied to a single frame
//! - **Frame buffers:** Decoded frames with a fixed pixel layout
//!
//! Keyframe centers are in source pixel coordinates; times are in seconds
//! from the start of the stream.

pub mod frame;
pub mod keyframe;
pub mod zoom;

pub use frame::*;
pub use keyframe::*;
pub use zoom::*;
