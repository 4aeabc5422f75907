use anyhow::Result;

use crate::detect::backend::{DetectThresholds, DetectorBackend};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Scripted backend for testing and dry runs.
///
/// Each call returns the next entry of the script (wrapping around), after the same
/// confidence filter and NMS a real model applies. An empty script never detects.
#[derive(Default)]
pub struct StubBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }

    /// Same detections on every frame.
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::with_script(vec![detections])
    }

    fn next_candidates(&mut self) -> Vec<Detection> {
        if self.script.is_empty() {
            return Vec::new();
        }
        let candidates = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        candidates
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame, thresholds: &DetectThresholds) -> Result<Vec<Detection>> {
        let candidates: Vec<Detection> = self
            .next_candidates()
            .into_iter()
            .filter(|d| d.confidence >= thresholds.confidence)
            .collect();
        Ok(non_max_suppression(candidates, thresholds.iou))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::rgb(vec![0; 10 * 10 * 3], 10, 10)
    }

    #[test]
    fn empty_script_detects_nothing() {
        let mut backend = StubBackend::new();
        let out = backend
            .detect(&frame(), &DetectThresholds::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn script_cycles_per_frame() {
        let a = Detection::new(0, 0, 2, 2, 0.9, 0);
        let b = Detection::new(5, 5, 8, 8, 0.9, 1);
        let mut backend = StubBackend::with_script(vec![vec![a], vec![b]]);
        let t = DetectThresholds::default();

        assert_eq!(backend.detect(&frame(), &t).unwrap(), vec![a]);
        assert_eq!(backend.detect(&frame(), &t).unwrap(), vec![b]);
        assert_eq!(backend.detect(&frame(), &t).unwrap(), vec![a]);
    }

    #[test]
    fn low_confidence_candidates_are_filtered() {
        let weak = Detection::new(0, 0, 2, 2, 0.1, 0);
        let strong = Detection::new(5, 5, 8, 8, 0.8, 0);
        let mut backend = StubBackend::constant(vec![weak, strong]);
        let out = backend
            .detect(&frame(), &DetectThresholds::default())
            .unwrap();
        assert_eq!(out, vec![strong]);
    }
}
