//! Zoom keyframes: user-authored time windows with a zoom ramp.
//!
//! Keyframes arrive as a JSON array in request order. Order matters: when
//! windows overlap, the first one supplied is the active one.

use serde::{Deserialize, Serialize};

use framezoom_common::error::{FramezoomError, FramezoomResult};

use crate::zoom::ZoomCenter;

/// A single zoom instruction.
///
/// Serialized in camelCase to match the upload payload:
/// `{"startTime":2,"endTime":4,"startZoom":1,"endZoom":2,"x":960,"y":540}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomKeyframe {
    /// Window start (seconds).
    pub start_time: f64,
    /// Window end (seconds). Must be strictly after `start_time`.
    pub end_time: f64,
    /// Zoom factor at `start_time`.
    pub start_zoom: f64,
    /// Zoom factor at `end_time`.
    pub end_zoom: f64,
    /// Zoom center, horizontal pixel coordinate.
    pub x: f64,
    /// Zoom center, vertical pixel coordinate.
    pub y: f64,
}

impl ZoomKeyframe {
    pub fn new(start_time: f64, end_time: f64, start_zoom: f64, end_zoom: f64, x: f64, y: f64) -> Self {
        Self {
            start_time,
            end_time,
            start_zoom,
            end_zoom,
            x,
            y,
        }
    }

    /// The zoom pivot in pixel coordinates.
    pub fn center(&self) -> ZoomCenter {
        ZoomCenter::new(self.x, self.y)
    }

    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `t` falls inside the window (inclusive at both ends).
    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }

    /// Elapsed fraction of the window at `t`. Not clamped.
    pub fn progress(&self, t: f64) -> f64 {
        (t - self.start_time) / self.duration()
    }

    /// Whether the two windows share at least one instant.
    pub fn overlaps(&self, other: &ZoomKeyframe) -> bool {
        self.start_time <= other.end_time && other.start_time <= self.end_time
    }

    /// Check the time window and zoom factors.
    pub fn validate(&self) -> FramezoomResult<()> {
        let fields = [
            ("startTime", self.start_time),
            ("endTime", self.end_time),
            ("startZoom", self.start_zoom),
            ("endZoom", self.end_zoom),
            ("x", self.x),
            ("y", self.y),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FramezoomError::invalid_keyframe(format!(
                "{name} must be a finite number, got {value}"
            )));
        }

        if self.end_time <= self.start_time {
            return Err(FramezoomError::invalid_keyframe(format!(
                "endTime ({}) must be after startTime ({})",
                self.end_time, self.start_time
            )));
        }

        if self.start_zoom <= 0.0 || self.end_zoom <= 0.0 {
            return Err(FramezoomError::invalid_keyframe(format!(
                "zoom factors must be positive (startZoom {}, endZoom {})",
                self.start_zoom, self.end_zoom
            )));
        }

        Ok(())
    }

    /// Check that the center lies within a `width` x `height` frame.
    pub fn validate_geometry(&self, width: u32, height: u32) -> FramezoomResult<()> {
        let in_x = (0.0..=width as f64).contains(&self.x);
        let in_y = (0.0..=height as f64).contains(&self.y);
        if !in_x || !in_y {
            return Err(FramezoomError::invalid_keyframe(format!(
                "center ({}, {}) lies outside the {width}x{height} frame",
                self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Parse the keyframe list from its JSON payload.
///
/// Blank input is an empty list, as is `[]`.
pub fn parse_keyframes(json: &str) -> FramezoomResult<Vec<ZoomKeyframe>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
        .map_err(|e| FramezoomError::invalid_keyframe(format!("malformed keyframe list: {e}")))
}

/// Validate every keyframe, reporting the first offender by index.
pub fn validate_keyframes(keyframes: &[ZoomKeyframe]) -> FramezoomResult<()> {
    for (index, keyframe) in keyframes.iter().enumerate() {
        keyframe
            .validate()
            .map_err(|e| prefix_index(index, e))?;
    }
    Ok(())
}

/// Validate every keyframe center against the frame size.
pub fn validate_keyframe_geometry(
    keyframes: &[ZoomKeyframe],
    width: u32,
    height: u32,
) -> FramezoomResult<()> {
    for (index, keyframe) in keyframes.iter().enumerate() {
        keyframe
            .validate_geometry(width, height)
            .map_err(|e| prefix_index(index, e))?;
    }
    Ok(())
}

fn prefix_index(index: usize, err: FramezoomError) -> FramezoomError {
    match err {
        FramezoomError::InvalidKeyframe { message } => {
            FramezoomError::invalid_keyframe(format!("keyframe {index}: {message}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_payload() {
        let json = r#"[{"startTime":2,"endTime":4,"startZoom":1.0,"endZoom":2.0,"x":320,"y":180}]"#;
        let keyframes = parse_keyframes(json).unwrap();
        assert_eq!(keyframes.len(), 1);
        assert_eq!(keyframes[0], ZoomKeyframe::new(2.0, 4.0, 1.0, 2.0, 320.0, 180.0));
    }

    #[test]
    fn test_parse_preserves_supplied_order() {
        let json = r#"[
            {"startTime":5,"endTime":6,"startZoom":1,"endZoom":1,"x":0,"y":0},
            {"startTime":1,"endTime":2,"startZoom":1,"endZoom":1,"x":0,"y":0}
        ]"#;
        let keyframes = parse_keyframes(json).unwrap();
        assert_eq!(keyframes[0].start_time, 5.0);
        assert_eq!(keyframes[1].start_time, 1.0);
    }

    #[test]
    fn test_blank_payload_is_empty() {
        assert!(parse_keyframes("").unwrap().is_empty());
        assert!(parse_keyframes("[]").unwrap().is_empty());
    }

    #[test]
    fn test_missing_field_is_invalid_keyframe() {
        let err = parse_keyframes(r#"[{"startTime":1,"endTime":2}]"#).unwrap_err();
        assert!(matches!(err, FramezoomError::InvalidKeyframe { .. }));
    }

    #[test]
    fn test_window_before_zero_is_accepted() {
        let kf = ZoomKeyframe::new(-1.0, 1.0, 1.0, 2.0, 0.0, 0.0);
        assert!(kf.validate().is_ok());
        assert!(kf.contains(0.0));
        assert_eq!(kf.progress(0.0), 0.5);
    }

    #[test]
    fn test_degenerate_window_rejected() {
        let kf = ZoomKeyframe::new(3.0, 3.0, 1.0, 2.0, 10.0, 10.0);
        assert!(matches!(
            kf.validate(),
            Err(FramezoomError::InvalidKeyframe { .. })
        ));
    }

    #[test]
    fn test_reversed_window_rejected() {
        let kf = ZoomKeyframe::new(4.0, 2.0, 1.0, 2.0, 10.0, 10.0);
        assert!(kf.validate().is_err());
    }

    #[test]
    fn test_non_positive_zoom_rejected() {
        assert!(ZoomKeyframe::new(0.0, 1.0, 0.0, 2.0, 0.0, 0.0).validate().is_err());
        assert!(ZoomKeyframe::new(0.0, 1.0, 1.0, -2.0, 0.0, 0.0).validate().is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let kf = ZoomKeyframe::new(0.0, 1.0, 1.0, 2.0, f64::NAN, 0.0);
        let err = kf.validate().unwrap_err();
        assert!(err.to_string().contains("x must be a finite number"));
    }

    #[test]
    fn test_validate_keyframes_reports_index() {
        let keyframes = vec![
            ZoomKeyframe::new(0.0, 1.0, 1.0, 2.0, 0.0, 0.0),
            ZoomKeyframe::new(2.0, 2.0, 1.0, 2.0, 0.0, 0.0),
        ];
        let err = validate_keyframes(&keyframes).unwrap_err();
        assert!(err.to_string().contains("keyframe 1:"));
    }

    #[test]
    fn test_geometry_bounds() {
        let kf = ZoomKeyframe::new(0.0, 1.0, 1.0, 2.0, 640.0, 360.0);
        assert!(kf.validate_geometry(640, 360).is_ok());
        assert!(kf.validate_geometry(320, 360).is_err());
        assert!(validate_keyframe_geometry(&[kf], 100, 100)
            .unwrap_err()
            .to_string()
            .contains("keyframe 0:"));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let kf = ZoomKeyframe::new(2.0, 4.0, 1.0, 2.0, 0.0, 0.0);
        assert!(kf.contains(2.0));
        assert!(kf.contains(4.0));
        assert!(!kf.contains(1.999));
        assert!(!kf.contains(4.001));
    }

    #[test]
    fn test_progress_midpoint() {
        let kf = ZoomKeyframe::new(2.0, 4.0, 1.0, 2.0, 0.0, 0.0);
        assert_eq!(kf.progress(3.0), 0.5);
    }

    #[test]
    fn test_overlaps() {
        let a = ZoomKeyframe::new(0.0, 2.0, 1.0, 2.0, 0.0, 0.0);
        let b = ZoomKeyframe::new(2.0, 3.0, 1.0, 2.0, 0.0, 0.0);
        let c = ZoomKeyframe::new(2.5, 3.0, 1.0, 2.0, 0.0, 0.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let kf = ZoomKeyframe::new(1.0, 2.0, 1.0, 1.5, 3.0, 4.0);
        let value = serde_json::to_value(kf).unwrap();
        assert!(value.get("startTime").is_some());
        assert!(value.get("endZoom").is_some());
    }
}
