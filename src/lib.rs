//! Road condition monitor (roadwatch)
//!
//! Scores road surface condition from video frames and forwards the scores to a
//! dashboard.
//!
//! # Architecture
//!
//! Per frame the capture side runs:
//!
//! 1. **Detect**: a pretrained detector finds damage as bounding boxes.
//! 2. **Score**: `1 - boxes_area / frame_area`, so 1.0 is a clean road.
//! 3. **Locate**: a location fix and local timestamp are attached.
//! 4. **Deliver**: the score event goes to the dashboard, at most once.
//!
//! The dashboard side ingests events into a bounded ring buffer and serves the data
//! behind a live map, a trend line and a condition distribution.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (synthetic, image directories, video files)
//! - `detect`: Detector adapter and backends
//! - `score`, `event`, `location`, `sink`: Per-frame scoring and delivery
//! - `pipeline`: The frame loop and its error policy
//! - `annotate`: Annotated PNG copies of scored frames (feature: save-frames)
//! - `dashboard`, `geocode`: Ingest service, statistics, location names
//! - `config`: JSON config files with environment overrides

pub mod annotate;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod error;
pub mod event;
pub mod frame;
pub mod geocode;
pub mod ingest;
pub mod location;
pub mod pipeline;
pub mod score;
pub mod sink;

pub use config::{IngestConfig, MonitorConfig};
pub use detect::{BoundingBox, Detection, Detector, DetectorBackend};
pub use error::PipelineError;
pub use event::{ScoreEvent, ScoreScale};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource};
pub use pipeline::{FrameOutcome, Pipeline, PipelineStats};
pub use score::{score_frame, AreaMode, FrameScore, ScoringPolicy};
