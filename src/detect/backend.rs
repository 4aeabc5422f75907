use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::result::Detection;
use crate::frame::Frame;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Caller-supplied detection thresholds, both in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectThresholds {
    /// Candidates below this confidence are dropped before return.
    pub confidence: f32,
    /// Overlap above which same-class candidates are suppressed.
    pub iou: f32,
}

impl Default for DetectThresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            iou: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl DetectThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.iou) {
            return Err(anyhow!("iou threshold {} is outside [0, 1]", self.iou));
        }
        Ok(())
    }
}

/// Detector backend trait.
///
/// A backend wraps one concrete model. It receives a frame whose layout has already
/// been checked, and returns boxes in frame pixel coordinates. Confidence filtering
/// and non-max suppression are the backend's job.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, thresholds: &DetectThresholds) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_common_detector_defaults() {
        let t = DetectThresholds::default();
        assert_eq!(t.confidence, 0.25);
        assert_eq!(t.iou, 0.5);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn thresholds_outside_unit_interval_are_rejected() {
        let t = DetectThresholds {
            confidence: 1.5,
            iou: 0.5,
        };
        assert!(t.validate().is_err());
        let t = DetectThresholds {
            confidence: 0.5,
            iou: -0.1,
        };
        assert!(t.validate().is_err());
    }
}
