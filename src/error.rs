//! Error taxonomy for the per-frame pipeline.
//!
//! Only [`PipelineError::Model`] halts a run. Every other kind is caught at the
//! frame boundary and degrades the frame (skip it, or drop a field) so a long
//! capture loop never terminates on a single bad frame.

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Detector failed to load or run, or rejected the image.
    #[error("model error: {0}")]
    Model(String),

    /// Zero-area or malformed frame. Fatal to that frame only.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Geolocation lookup failed. The event proceeds with null coordinates.
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    /// Network send failed or the sink answered with a non-2xx status.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl PipelineError {
    pub fn model(err: impl std::fmt::Display) -> Self {
        Self::Model(err.to_string())
    }

    pub fn delivery(err: impl std::fmt::Display) -> Self {
        Self::Delivery(err.to_string())
    }

    pub fn location(err: impl std::fmt::Display) -> Self {
        Self::LocationUnavailable(err.to_string())
    }

    /// True when the error must stop the capture loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}
