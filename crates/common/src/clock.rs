//! Frame timing utilities.
//!
//! Decoded frames carry no timestamps of their own; a frame's presentation
//! time is derived from its zero-based index and the stream frame rate.

use crate::error::{FramezoomError, FramezoomResult};

/// Maps frame indices to presentation timestamps for a constant-rate stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given frame rate.
    pub fn new(fps: f64) -> FramezoomResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(FramezoomError::decode(format!(
                "frame rate must be positive and finite, got {fps}"
            )));
        }
        Ok(Self { fps })
    }

    /// Create a clock from an ffmpeg-style rational rate (`30000/1001`).
    pub fn from_ratio(num: u32, den: u32) -> FramezoomResult<Self> {
        if den == 0 {
            return Err(FramezoomError::decode(format!(
                "frame rate denominator is zero ({num}/{den})"
            )));
        }
        Self::new(num as f64 / den as f64)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Timestamp in seconds of the frame at `index`.
    pub fn time_of(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }
}

/// Parse an ffmpeg rational such as `"30000/1001"` or `"25"`.
pub fn parse_rate(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();
    match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<u32>().ok()?;
            let den = den.trim().parse::<u32>().ok()?;
            if num == 0 || den == 0 {
                return None;
            }
            Some((num, den))
        }
        None => {
            let num = raw.parse::<u32>().ok()?;
            if num == 0 {
                return None;
            }
            Some((num, 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_index() {
        let clock = FrameClock::new(30.0).unwrap();
        assert_eq!(clock.time_of(0), 0.0);
        assert_eq!(clock.time_of(60), 2.0);
        assert_eq!(clock.time_of(90), 3.0);
        assert_eq!(clock.time_of(120), 4.0);
    }

    #[test]
    fn test_rejects_zero_fps() {
        assert!(FrameClock::new(0.0).is_err());
        assert!(FrameClock::new(f64::NAN).is_err());
        assert!(FrameClock::from_ratio(30, 0).is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_rate("25"), Some((25, 1)));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_ntsc_rate() {
        let clock = FrameClock::from_ratio(30000, 1001).unwrap();
        assert!((clock.fps() - 29.97).abs() < 0.01);
    }
}
