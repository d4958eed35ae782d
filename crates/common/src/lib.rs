//! FrameZoom Common Utilities
//!
//! Shared infrastructure for all FrameZoom crates:
//! - Error types and result aliases
//! - Frame clock for index-to-timestamp conversion
//! - Scratch storage with bounded-retry cleanup
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod scratch;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use scratch::*;
