//! Dashboard ingest side.
//!
//! Score events arrive over HTTP (`POST /add_point`) or over the socket feed and are
//! normalized into [`ScorePoint`]s in one shared [`EventRing`]. The HTTP server also
//! serves the ring contents and summary data as JSON. Rendering is someone else's job.

mod feed;
mod ring;
mod server;
pub mod stats;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub use feed::{FeedHandle, FeedListener};
pub use ring::{EventRing, ScorePoint, SnapshotReader};
pub use server::{IngestHandle, IngestServer};
pub use stats::{distribution, marker_color, summarize, BandCount, ConditionBand, Summary};

use crate::event::ScoreScale;
use crate::geocode::LocationNamer;

const REQUIRED_FIELDS: [&str; 4] = ["latitude", "longitude", "timestamp", "score"];

/// Why an incoming payload was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Missing required fields")]
    MissingFields,
    #[error("{0}")]
    InvalidField(String),
}

/// Incoming event as the capture side sends it, score on its own scale.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingEvent {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: String,
    pub score: f64,
    pub below_threshold: bool,
}

/// Parse one event body. All four keys must be present; coordinates may be `null`.
pub fn parse_event(body: &[u8]) -> Result<IncomingEvent, PayloadError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| PayloadError::InvalidJson)?;
    let Value::Object(map) = value else {
        return Err(PayloadError::InvalidJson);
    };
    if !REQUIRED_FIELDS.iter().all(|k| map.contains_key(*k)) {
        return Err(PayloadError::MissingFields);
    }

    let latitude = optional_number(&map["latitude"], "latitude")?;
    let longitude = optional_number(&map["longitude"], "longitude")?;
    let score = optional_number(&map["score"], "score")?
        .ok_or_else(|| PayloadError::InvalidField("score must not be null".to_string()))?;
    let timestamp = match &map["timestamp"] {
        Value::String(s) => s.clone(),
        Value::Null => {
            return Err(PayloadError::InvalidField(
                "timestamp must not be null".to_string(),
            ))
        }
        other => other.to_string(),
    };
    let below_threshold = map
        .get("below_threshold")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(IncomingEvent {
        latitude,
        longitude,
        timestamp,
        score,
        below_threshold,
    })
}

fn optional_number(value: &Value, field: &str) -> Result<Option<f64>, PayloadError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(PayloadError::InvalidField(format!(
            "{} must be a number, got {}",
            field, value
        ))),
    }
}

/// Shared entry point of both transports.
pub struct Ingestor {
    ring: Arc<EventRing>,
    input_scale: ScoreScale,
    namer: Option<Mutex<LocationNamer>>,
}

impl Ingestor {
    pub fn new(ring: Arc<EventRing>, input_scale: ScoreScale) -> Self {
        Self {
            ring,
            input_scale,
            namer: None,
        }
    }

    pub fn with_namer(mut self, namer: LocationNamer) -> Self {
        self.namer = Some(Mutex::new(namer));
        self
    }

    pub fn ring(&self) -> &Arc<EventRing> {
        &self.ring
    }

    /// Read-only side for the rendering routes.
    pub fn view(&self) -> DashboardView {
        DashboardView {
            reader: self.ring.reader(),
        }
    }

    /// Normalize and store in one step.
    pub fn ingest(&self, event: IncomingEvent) -> ScorePoint {
        self.store(self.normalize(event))
    }

    /// Rescale the score to 0..100. Nothing is stored yet.
    pub fn normalize(&self, event: IncomingEvent) -> ScorePoint {
        ScorePoint {
            latitude: event.latitude,
            longitude: event.longitude,
            timestamp: event.timestamp,
            score: event.score * (ScoreScale::Percent.factor() / self.input_scale.factor()),
            below_threshold: event.below_threshold,
            location_name: None,
        }
    }

    /// Attach a location name when naming is on, then push into the ring.
    ///
    /// Naming may block on a reverse geocode lookup.
    pub fn store(&self, mut point: ScorePoint) -> ScorePoint {
        if let (Some(namer), Some(lat), Some(lon)) = (&self.namer, point.latitude, point.longitude)
        {
            let mut namer = namer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            point.location_name = Some(namer.name_for(lat, lon));
        }
        if let Some(evicted) = self.ring.push(point.clone()) {
            log::debug!("ring full, evicted point from {}", evicted.timestamp);
        }
        point
    }

    /// Write back the location name cache, if any.
    pub fn flush(&self) -> Result<()> {
        if let Some(namer) = &self.namer {
            namer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .flush()?;
        }
        Ok(())
    }
}

/// What `GET /points` and `GET /summary` serve.
#[derive(Clone, Debug)]
pub struct DashboardView {
    reader: SnapshotReader,
}

impl DashboardView {
    pub fn summary(&self) -> DashboardSummary {
        let scores = self.reader.scores();
        DashboardSummary {
            count: scores.len(),
            statistics: summarize(&scores),
            distribution: distribution(&scores),
        }
    }

    pub fn points(&self) -> Vec<PointView> {
        self.reader
            .snapshot()
            .into_iter()
            .map(|point| PointView {
                color: marker_color(point.score),
                point,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub count: usize,
    pub statistics: Option<Summary>,
    pub distribution: Vec<BandCount>,
}

/// A stored point plus its map marker colour.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PointView {
    #[serde(flatten)]
    pub point: ScorePoint,
    pub color: &'static str,
}
