//! Error types shared across FrameZoom crates.

use std::path::PathBuf;

/// Top-level error type for FrameZoom operations.
#[derive(Debug, thiserror::Error)]
pub enum FramezoomError {
    #[error("Invalid keyframe: {message}")]
    InvalidKeyframe { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Transform error: {message}")]
    Transform { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Cleanup of {path} failed: {message}")]
    Cleanup { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Job cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FramezoomError.
pub type FramezoomResult<T> = Result<T, FramezoomError>;

/// Message shown to remote callers regardless of the underlying failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error while editing the video";

impl FramezoomError {
    pub fn invalid_keyframe(msg: impl Into<String>) -> Self {
        Self::InvalidKeyframe {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable short label used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidKeyframe { .. } => "invalid_keyframe",
            Self::Decode { .. } => "decode",
            Self::Transform { .. } => "transform",
            Self::Encode { .. } => "encode",
            Self::Cleanup { .. } => "cleanup",
            Self::Config { .. } => "config",
            Self::Cancelled => "cancelled",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// Text safe to hand back across the request boundary.
    ///
    /// Internal detail (paths, ffmpeg stderr) stays in the logs.
    pub fn public_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }
}
