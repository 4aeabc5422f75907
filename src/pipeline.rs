//! Per-frame scoring loop.
//!
//! One frame at a time: detect, score, stamp with a location fix, assemble the event,
//! deliver it. Only a model failure stops the loop. Invalid frames are skipped and
//! failed deliveries are dropped, each with a warning.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::annotate::FrameRecorder;
use crate::config::MonitorConfig;
use crate::detect::Detector;
use crate::error::PipelineError;
use crate::event::{assemble_event, EventPolicy, ScoreEvent};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::location::{acquire_fix, provider_from_settings, LocationProvider};
use crate::score::{score_frame, ScoringPolicy};
use crate::sink::{sink_from_settings, EventSink};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Delivered(ScoreEvent),
    /// Scored, but the sink did not accept the event.
    Dropped { event: ScoreEvent, reason: String },
    /// Not scored at all.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub frames: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub below_threshold: u64,
    /// Last 0..1 score, before output scaling.
    pub last_score: Option<f64>,
    score_sum: f64,
    scored: u64,
}

impl PipelineStats {
    pub fn mean_score(&self) -> Option<f64> {
        if self.scored == 0 {
            None
        } else {
            Some(self.score_sum / self.scored as f64)
        }
    }

    fn record_score(&mut self, score: f64, below_threshold: bool) {
        self.last_score = Some(score);
        self.score_sum += score;
        self.scored += 1;
        if below_threshold {
            self.below_threshold += 1;
        }
    }
}

pub struct Pipeline {
    detector: Detector,
    location: Box<dyn LocationProvider>,
    sink: Box<dyn EventSink>,
    scoring: ScoringPolicy,
    events: EventPolicy,
    recorder: Option<Box<dyn FrameRecorder>>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        detector: Detector,
        location: Box<dyn LocationProvider>,
        sink: Box<dyn EventSink>,
        scoring: ScoringPolicy,
        events: EventPolicy,
    ) -> Self {
        Self {
            detector,
            location,
            sink,
            scoring,
            events,
            recorder: None,
            stats: PipelineStats::default(),
        }
    }

    /// Hand every scored frame to `recorder` as well.
    pub fn with_recorder(mut self, recorder: Box<dyn FrameRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Wire up detector, location provider and sink from a loaded config.
    pub fn from_config(cfg: &MonitorConfig) -> Result<Self> {
        let detector = Detector::from_settings(&cfg.detector)?;
        let location =
            provider_from_settings(&cfg.location).context("configure location provider")?;
        let sink = sink_from_settings(&cfg.sink).context("configure event sink")?;
        log::info!(
            "pipeline: detector={} location={} sink={} area_mode={:?} scale={:?}",
            detector.backend_name(),
            location.name(),
            sink.name(),
            cfg.scoring.area_mode,
            cfg.events.scale
        );
        let pipeline = Self::new(detector, location, sink, cfg.scoring, cfg.events);
        match frame_recorder(cfg)? {
            Some(recorder) => Ok(pipeline.with_recorder(recorder)),
            None => Ok(pipeline),
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.backend_name()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn warm_up(&mut self) -> Result<(), PipelineError> {
        self.detector.warm_up()
    }

    /// Score one frame and hand the event to the sink.
    ///
    /// Returns `Err` only for [`PipelineError::Model`].
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome, PipelineError> {
        self.stats.frames += 1;

        if let Err(reason) = check_geometry(frame) {
            let err = PipelineError::InvalidFrame(reason);
            log::warn!("frame {} skipped: {}", frame.index, err);
            self.stats.skipped += 1;
            return Ok(FrameOutcome::Skipped {
                reason: err.to_string(),
            });
        }

        let detections = self.detector.detect(frame)?;
        let score = match score_frame(frame.width, frame.height, &detections, &self.scoring) {
            Ok(score) => score,
            Err(err) => {
                log::warn!("frame {} skipped: {}", frame.index, err);
                self.stats.skipped += 1;
                return Ok(FrameOutcome::Skipped {
                    reason: err.to_string(),
                });
            }
        };

        let fix = acquire_fix(self.location.as_mut());
        let event = assemble_event(&score, &fix, &self.events);
        self.stats.record_score(score.score, event.below_threshold);
        log::debug!(
            "frame {}: {} detections, boxes_area={} frame_area={} score={:.4} age={:?}",
            frame.index,
            detections.len(),
            score.boxes_area,
            score.frame_area,
            score.score,
            frame.age()
        );
        if event.below_threshold {
            log::info!(
                "frame {}: score {:.3} below warning threshold {:.2}",
                frame.index,
                score.score,
                self.events.score_threshold
            );
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(frame, &detections, &event) {
                log::warn!("frame {}: {} failed: {:#}", frame.index, recorder.name(), e);
            }
        }

        match self.sink.deliver(&event) {
            Ok(()) => {
                self.stats.delivered += 1;
                Ok(FrameOutcome::Delivered(event))
            }
            Err(e) => {
                let err = PipelineError::delivery(format!("{}: {:#}", self.sink.name(), e));
                log::warn!("frame {}: {}; event dropped", frame.index, err);
                self.stats.dropped += 1;
                Ok(FrameOutcome::Dropped {
                    event,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Pull frames until the source ends, `shutdown` is set or `max_frames` is reached.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        shutdown: &AtomicBool,
        max_frames: Option<u64>,
    ) -> Result<PipelineStats> {
        log::info!("pipeline running on {}", source.describe());
        let mut last_health_log = Instant::now();
        let mut processed = 0u64;

        while !shutdown.load(Ordering::SeqCst) {
            if max_frames.is_some_and(|max| processed >= max) {
                log::info!("frame budget of {} reached", processed);
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream after {} frames", source.frames_read());
                    break;
                }
                Err(e) => match e.downcast::<PipelineError>() {
                    Ok(err @ PipelineError::InvalidFrame(_)) => {
                        processed += 1;
                        self.stats.frames += 1;
                        self.stats.skipped += 1;
                        log::warn!("frame {} skipped: {}", source.frames_read(), err);
                        continue;
                    }
                    Ok(err) => {
                        log::warn!("failed to read frame, stopping: {}", err);
                        break;
                    }
                    Err(e) => {
                        log::warn!("failed to read frame, stopping: {:#}", e);
                        break;
                    }
                },
            };

            processed += 1;
            if let Err(err) = self.process_frame(&frame) {
                log::error!("frame {}: {}", frame.index, err);
                return Err(anyhow!(err));
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                self.log_health();
                last_health_log = Instant::now();
            }
        }

        self.log_health();
        Ok(self.stats.clone())
    }

    fn log_health(&self) {
        let stats = &self.stats;
        log::info!(
            "frames={} delivered={} dropped={} skipped={} below_threshold={} mean_score={}",
            stats.frames,
            stats.delivered,
            stats.dropped,
            stats.skipped,
            stats.below_threshold,
            stats
                .mean_score()
                .map(|m| format!("{:.3}", m))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

#[cfg(feature = "save-frames")]
fn frame_recorder(cfg: &MonitorConfig) -> Result<Option<Box<dyn FrameRecorder>>> {
    let writer = crate::annotate::AnnotatedFrameWriter::from_settings(&cfg.output)
        .context("configure frame output")?;
    Ok(writer.map(|w| Box::new(w) as Box<dyn FrameRecorder>))
}

#[cfg(not(feature = "save-frames"))]
fn frame_recorder(cfg: &MonitorConfig) -> Result<Option<Box<dyn FrameRecorder>>> {
    match &cfg.output.save_dir {
        Some(dir) => Err(anyhow!(
            "saving frames to {} requires the save-frames feature",
            dir.display()
        )),
        None => Ok(None),
    }
}

fn check_geometry(frame: &Frame) -> Result<(), String> {
    if frame.area() == 0 {
        return Err(format!("{}x{} frame has zero area", frame.width, frame.height));
    }
    frame.check_layout()
}
