//! Calibration cache keys and measured anchors.

use std::path::Path;

use crate::profile::TargetFps;
use crate::source::normalize_path_key;

/// Identifies one calibration measurement.
///
/// Stable as long as the source path, the video filter chain and the target
/// frame rate stay the same. Changes to the file contents on disk are not
/// detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibrationKey {
    source: String,
    filter_chain: String,
    fps: u32,
}

impl CalibrationKey {
    pub fn new(source: &Path, filter_chain: &str, fps: TargetFps) -> Self {
        Self {
            source: normalize_path_key(source),
            filter_chain: filter_chain.to_string(),
            fps: fps.as_u32(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn filter_chain(&self) -> &str {
        &self.filter_chain
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

/// Video bitrates measured at the two quality extremes, in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationAnchors {
    /// Rate at [`Quality::BEST`](crate::Quality::BEST) (q=2), margin applied.
    pub best_bps: f64,

    /// Rate at [`Quality::WORST`](crate::Quality::WORST) (q=31), margin applied.
    pub worst_bps: f64,
}

impl CalibrationAnchors {
    /// Safety margin applied to raw samples.
    pub const SAFETY_MARGIN: f64 = 1.05;

    /// Build anchors from raw sampled rates, applying [`Self::SAFETY_MARGIN`].
    pub fn from_samples(best_raw_bps: f64, worst_raw_bps: f64) -> Self {
        Self {
            best_bps: best_raw_bps * Self::SAFETY_MARGIN,
            worst_bps: worst_raw_bps * Self::SAFETY_MARGIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_path() {
        let a = CalibrationKey::new(Path::new("/v/./a.mp4"), "scale=210:135", TargetFps::Twelve);
        let b = CalibrationKey::new(Path::new("/v/a.mp4"), "scale=210:135", TargetFps::Twelve);
        assert_eq!(a, b);
        assert_eq!(a.source(), b.source());
    }

    #[test]
    fn test_key_distinguishes_components() {
        let base = CalibrationKey::new(Path::new("/v/a.mp4"), "chain", TargetFps::Twelve);
        assert_ne!(
            base,
            CalibrationKey::new(Path::new("/v/a.mp4"), "chain", TargetFps::TwentyFour)
        );
        assert_ne!(
            base,
            CalibrationKey::new(Path::new("/v/a.mp4"), "other", TargetFps::Twelve)
        );
        assert_ne!(
            base,
            CalibrationKey::new(Path::new("/v/b.mp4"), "chain", TargetFps::Twelve)
        );
    }

    #[test]
    fn test_anchors_apply_margin() {
        let anchors = CalibrationAnchors::from_samples(100_000.0, 10_000.0);
        assert!((anchors.best_bps - 105_000.0).abs() < 1e-6);
        assert!((anchors.worst_bps - 10_500.0).abs() < 1e-6);
    }
}
