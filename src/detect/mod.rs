//! Detector adapter.
//!
//! `Detector` owns one `DetectorBackend` and is the only way the pipeline talks to a
//! model. It checks the image and thresholds before inference and reports every
//! failure as `PipelineError::Model`, so callers never score on a failed call.

mod backend;
mod backends;
pub mod nms;
mod result;

use anyhow::anyhow;

pub use backend::{
    DetectThresholds, DetectorBackend, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD,
};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection};

use crate::config::DetectorSettings;
use crate::error::PipelineError;
use crate::frame::Frame;

pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    thresholds: DetectThresholds,
}

impl Detector {
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        thresholds: DetectThresholds,
    ) -> Result<Self, PipelineError> {
        thresholds.validate().map_err(PipelineError::model)?;
        Ok(Self {
            backend,
            thresholds,
        })
    }

    /// Build the backend named in the settings and wrap it.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self, PipelineError> {
        let backend = backend_from_settings(settings).map_err(PipelineError::model)?;
        Self::new(backend, settings.thresholds)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn thresholds(&self) -> DetectThresholds {
        self.thresholds
    }

    pub fn warm_up(&mut self) -> Result<(), PipelineError> {
        self.backend.warm_up().map_err(PipelineError::model)
    }

    /// Detect with the configured thresholds.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
        let thresholds = self.thresholds;
        self.detect_with(frame, thresholds)
    }

    /// Detect with caller-supplied thresholds.
    pub fn detect_with(
        &mut self,
        frame: &Frame,
        thresholds: DetectThresholds,
    ) -> Result<Vec<Detection>, PipelineError> {
        thresholds.validate().map_err(PipelineError::model)?;
        frame.check_layout().map_err(PipelineError::Model)?;
        let detections = self
            .backend
            .detect(frame, &thresholds)
            .map_err(|e| PipelineError::Model(format!("{} backend: {:#}", self.backend.name(), e)))?;
        log::debug!(
            "frame {}: {} detections from {}",
            frame.index,
            detections.len(),
            self.backend.name()
        );
        Ok(detections)
    }
}

/// Instantiate the backend selected by `settings.backend`.
pub fn backend_from_settings(
    settings: &DetectorSettings,
) -> anyhow::Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                let path = settings
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
                Ok(Box::new(TractBackend::new(
                    path,
                    settings.input_width,
                    settings.input_height,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!("tract backend requires the backend-tract feature"))
            }
        }
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct BrokenBackend;

    impl DetectorBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&mut self, _frame: &Frame, _t: &DetectThresholds) -> Result<Vec<Detection>> {
            Err(anyhow!("weights not loaded"))
        }
    }

    #[test]
    fn backend_failure_becomes_model_error() {
        let mut detector =
            Detector::new(Box::new(BrokenBackend), DetectThresholds::default()).unwrap();
        let frame = Frame::rgb(vec![0; 12], 2, 2);
        let err = detector.detect(&frame).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("weights not loaded"));
    }

    #[test]
    fn malformed_image_is_model_error() {
        let mut detector =
            Detector::new(Box::new(StubBackend::new()), DetectThresholds::default()).unwrap();
        let frame = Frame::new(vec![0; 8], 2, 2, 2);
        assert!(matches!(
            detector.detect(&frame),
            Err(PipelineError::Model(_))
        ));
    }

    #[test]
    fn invalid_thresholds_rejected_at_construction() {
        let thresholds = DetectThresholds {
            confidence: 2.0,
            iou: 0.5,
        };
        assert!(Detector::new(Box::new(StubBackend::new()), thresholds).is_err());
    }

    #[test]
    fn unknown_backend_name_fails() {
        let settings = DetectorSettings {
            backend: "darknet".to_string(),
            ..DetectorSettings::default()
        };
        let err = Detector::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("unknown detector backend"));
    }
}
