//! Per-frame zoom state derived from the active keyframe.

use serde::{Deserialize, Serialize};

/// A pixel-space zoom pivot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomCenter {
    pub x: f64,
    pub y: f64,
}

impl ZoomCenter {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Zoom applied to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    /// Magnification (1.0 = none).
    pub zoom_factor: f64,
    /// Pivot, taken verbatim from the active keyframe.
    pub center: ZoomCenter,
}

impl ZoomState {
    pub fn new(zoom_factor: f64, center: ZoomCenter) -> Self {
        Self {
            zoom_factor,
            center,
        }
    }
}

/// Outcome of resolving a timestamp against the keyframe list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomResolution {
    /// No window covers the timestamp; the frame passes through untouched.
    #[default]
    Inactive,
    /// A window is active with the given interpolated state.
    Active(ZoomState),
}

impl ZoomResolution {
    pub fn is_active(&self) -> bool {
        matches!(self, ZoomResolution::Active(_))
    }

    pub fn state(&self) -> Option<&ZoomState> {
        match self {
            ZoomResolution::Active(state) => Some(state),
            ZoomResolution::Inactive => None,
        }
    }

    /// Effective zoom factor (1.0 when inactive).
    pub fn zoom_factor(&self) -> f64 {
        self.state().map(|s| s.zoom_factor).unwrap_or(1.0)
    }
}
