//! Keyframe resolution: timestamp → active window → interpolated zoom.
//!
//! # Rules
//!
//! 1. Keyframes are scanned in the order they were supplied.
//! 2. The first window with `start_time <= t <= end_time` is active.
//! 3. The zoom factor ramps linearly from `start_zoom` to `end_zoom` over the
//!    window; the center is taken verbatim from the keyframe.
//! 4. No matching window means [`ZoomResolution::Inactive`].

use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_keyframe_model::keyframe::{validate_keyframes, ZoomKeyframe};
use framezoom_keyframe_model::zoom::{ZoomResolution, ZoomState};

/// Linear zoom interpolation, exact at both ends of the window.
pub fn interpolate_zoom(start_zoom: f64, end_zoom: f64, progress: f64) -> f64 {
    if start_zoom == end_zoom || progress == 0.0 {
        return start_zoom;
    }
    if progress == 1.0 {
        return end_zoom;
    }
    start_zoom + (end_zoom - start_zoom) * progress
}

/// Resolve `t` against an unvalidated keyframe list.
///
/// A matching window whose end does not come after its start is reported as
/// [`FramezoomError::InvalidKeyframe`] instead of producing a non-finite zoom.
pub fn resolve(keyframes: &[ZoomKeyframe], t: f64) -> FramezoomResult<ZoomResolution> {
    for (index, keyframe) in keyframes.iter().enumerate() {
        if !keyframe.contains(t) {
            continue;
        }
        if keyframe.end_time <= keyframe.start_time {
            return Err(FramezoomError::invalid_keyframe(format!(
                "keyframe {index}: window [{}, {}] has no duration",
                keyframe.start_time, keyframe.end_time
            )));
        }
        return Ok(ZoomResolution::Active(state_at(keyframe, t)));
    }
    Ok(ZoomResolution::Inactive)
}

fn state_at(keyframe: &ZoomKeyframe, t: f64) -> ZoomState {
    let progress = keyframe.progress(t);
    ZoomState::new(
        interpolate_zoom(keyframe.start_zoom, keyframe.end_zoom, progress),
        keyframe.center(),
    )
}

/// A validated, immutable keyframe list for one job.
#[derive(Debug, Clone, Default)]
pub struct KeyframeResolver {
    keyframes: Vec<ZoomKeyframe>,
}

impl KeyframeResolver {
    /// Validate and take ownership of the keyframes, keeping supplied order.
    pub fn new(keyframes: Vec<ZoomKeyframe>) -> FramezoomResult<Self> {
        validate_keyframes(&keyframes)?;
        tracing::debug!(keyframes = keyframes.len(), "Keyframes validated");
        Ok(Self { keyframes })
    }

    pub fn keyframes(&self) -> &[ZoomKeyframe] {
        &self.keyframes
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Index of the window active at `t`, if any.
    pub fn active_index(&self, t: f64) -> Option<usize> {
        self.keyframes.iter().position(|kf| kf.contains(t))
    }

    /// Zoom to apply at `t`.
    pub fn resolve(&self, t: f64) -> ZoomResolution {
        match self.active_index(t) {
            Some(index) => ZoomResolution::Active(state_at(&self.keyframes[index], t)),
            None => ZoomResolution::Inactive,
        }
    }

    /// Index pairs `(earlier, later)` of windows that share an instant.
    ///
    /// Overlaps are legal; the earlier entry shadows the later one.
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.keyframes.iter().enumerate() {
            for (j, b) in self.keyframes.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// End of the last window, in seconds.
    pub fn last_end_time(&self) -> Option<f64> {
        self.keyframes
            .iter()
            .map(|kf| kf.end_time)
            .max_by(f64::total_cmp)
    }
}
