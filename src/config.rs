use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectThresholds, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::event::{EventPolicy, ScoreScale, DEFAULT_SCORE_THRESHOLD};
use crate::location::{Coordinates, DEFAULT_GEOLOCATION_URL};
use crate::score::{AreaMode, ScoringPolicy};
use crate::sink::SinkKind;

const DEFAULT_SOURCE_URL: &str = "stub://road";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_SINK_URL: &str = "http://127.0.0.1:8050/add_point";
const DEFAULT_FEED_ADDR: &str = "127.0.0.1:8051";
const DEFAULT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_MOCK_START: (f64, f64) = (43.6532, -79.3832);
const DEFAULT_MOCK_END: (f64, f64) = (43.6629, -79.3957);
const DEFAULT_MOCK_DURATION_SECS: u64 = 300;

const DEFAULT_INGEST_ADDR: &str = "127.0.0.1:8050";
const DEFAULT_RING_CAPACITY: usize = 100;
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_GEOCODE_CACHE: &str = "location_cache.json";

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    scoring: Option<ScoringConfigFile>,
    location: Option<LocationConfigFile>,
    sink: Option<SinkConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    frame_limit: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ScoringConfigFile {
    area_mode: Option<AreaMode>,
    clamp_negative: Option<bool>,
    scale: Option<ScoreScale>,
    score_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct LocationConfigFile {
    provider: Option<LocationProviderKind>,
    api_url: Option<String>,
    api_key: Option<String>,
    timeout_ms: Option<u64>,
    fixed: Option<Coordinates>,
    mock: Option<MockConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct MockConfigFile {
    start: Option<Coordinates>,
    end: Option<Coordinates>,
    duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SinkConfigFile {
    kind: Option<SinkKind>,
    url: Option<String>,
    socket_addr: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    save_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

/// Settings of the capture and scoring daemon.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub scoring: ScoringPolicy,
    pub events: EventPolicy,
    pub location: LocationSettings,
    pub sink: SinkSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    /// `stub://<name>`, an image directory or a video file path.
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
            frame_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub thresholds: DetectThresholds,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR_BACKEND.to_string(),
            model_path: None,
            input_width: DEFAULT_MODEL_INPUT,
            input_height: DEFAULT_MODEL_INPUT,
            thresholds: DetectThresholds::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProviderKind {
    None,
    Fixed,
    #[default]
    Mock,
    Geolocation,
}

impl std::str::FromStr for LocationProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "fixed" => Ok(Self::Fixed),
            "mock" => Ok(Self::Mock),
            "geolocation" | "google" => Ok(Self::Geolocation),
            other => Err(anyhow!(
                "unknown location provider '{}'; expected none, fixed, mock or geolocation",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockPathSettings {
    pub start: Coordinates,
    pub end: Coordinates,
    pub duration: Duration,
}

impl Default for MockPathSettings {
    fn default() -> Self {
        Self {
            start: Coordinates::new(DEFAULT_MOCK_START.0, DEFAULT_MOCK_START.1),
            end: Coordinates::new(DEFAULT_MOCK_END.0, DEFAULT_MOCK_END.1),
            duration: Duration::from_secs(DEFAULT_MOCK_DURATION_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationSettings {
    pub provider: LocationProviderKind,
    pub api_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub fixed: Option<Coordinates>,
    pub mock: MockPathSettings,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            provider: LocationProviderKind::default(),
            api_url: DEFAULT_GEOLOCATION_URL.to_string(),
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            fixed: None,
            mock: MockPathSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkSettings {
    pub kind: SinkKind,
    pub url: String,
    pub socket_addr: String,
    pub timeout: Duration,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            url: DEFAULT_SINK_URL.to_string(),
            socket_addr: DEFAULT_FEED_ADDR.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Annotated copies of processed frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    /// Write one PNG per scored frame here. Off when `None`.
    pub save_dir: Option<PathBuf>,
    /// TrueType font for the text overlay. Without one only shapes are drawn.
    pub font_path: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROADWATCH_CONFIG").ok();
        let file_cfg: Option<MonitorConfigFile> = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source_defaults = SourceSettings::default();
        let source = SourceSettings {
            url: source_file.url.unwrap_or(source_defaults.url),
            width: source_file.width.unwrap_or(source_defaults.width),
            height: source_file.height.unwrap_or(source_defaults.height),
            frame_limit: source_file.frame_limit,
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: detector_file.model_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            thresholds: DetectThresholds {
                confidence: detector_file
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                iou: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            },
        };

        let scoring_file = file.scoring.unwrap_or_default();
        let scoring = ScoringPolicy {
            area_mode: scoring_file.area_mode.unwrap_or_default(),
            clamp_negative: scoring_file.clamp_negative.unwrap_or(false),
        };
        let events = EventPolicy {
            scale: scoring_file.scale.unwrap_or_default(),
            score_threshold: scoring_file
                .score_threshold
                .unwrap_or(DEFAULT_SCORE_THRESHOLD),
        };

        let location_file = file.location.unwrap_or_default();
        let mock_file = location_file.mock.unwrap_or_default();
        let mock_defaults = MockPathSettings::default();
        let location = LocationSettings {
            provider: location_file.provider.unwrap_or_default(),
            api_url: location_file
                .api_url
                .unwrap_or_else(|| DEFAULT_GEOLOCATION_URL.to_string()),
            api_key: location_file.api_key,
            timeout: Duration::from_millis(location_file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            fixed: location_file.fixed,
            mock: MockPathSettings {
                start: mock_file.start.unwrap_or(mock_defaults.start),
                end: mock_file.end.unwrap_or(mock_defaults.end),
                duration: mock_file
                    .duration_secs
                    .map(Duration::from_secs)
                    .unwrap_or(mock_defaults.duration),
            },
        };

        let sink_file = file.sink.unwrap_or_default();
        let sink = SinkSettings {
            kind: sink_file.kind.unwrap_or_default(),
            url: sink_file.url.unwrap_or_else(|| DEFAULT_SINK_URL.to_string()),
            socket_addr: sink_file
                .socket_addr
                .unwrap_or_else(|| DEFAULT_FEED_ADDR.to_string()),
            timeout: Duration::from_millis(sink_file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
        };

        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            save_dir: output_file.save_dir,
            font_path: output_file.font_path,
        };

        Ok(Self {
            source,
            detector,
            scoring,
            events,
            location,
            sink,
            output,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = non_empty_env("ROADWATCH_SOURCE") {
            self.source.url = source;
        }
        if let Some(path) = non_empty_env("ROADWATCH_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(url) = non_empty_env("ROADWATCH_SINK_URL") {
            self.sink.url = url;
        }
        if let Some(kind) = non_empty_env("ROADWATCH_SINK_KIND") {
            self.sink.kind = kind.parse()?;
        }
        if let Some(scale) = non_empty_env("ROADWATCH_SCORE_SCALE") {
            self.events.scale = scale.parse()?;
        }
        if let Some(threshold) = non_empty_env("ROADWATCH_SCORE_THRESHOLD") {
            self.events.score_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("ROADWATCH_SCORE_THRESHOLD must be a number"))?;
        }
        if let Some(key) = non_empty_env("ROADWATCH_GEOLOCATION_KEY") {
            self.location.api_key = Some(key);
        }
        if let Some(timeout) = non_empty_env("ROADWATCH_DELIVERY_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|_| {
                anyhow!("ROADWATCH_DELIVERY_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.sink.timeout = Duration::from_millis(millis);
        }
        if let Some(dir) = non_empty_env("ROADWATCH_SAVE_DIR") {
            self.output.save_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.detector
            .thresholds
            .validate()
            .map_err(|e| anyhow!("detector: {}", e))?;
        if !(0.0..=1.0).contains(&self.events.score_threshold) {
            return Err(anyhow!(
                "scoring.score_threshold must be within [0, 1], got {}",
                self.events.score_threshold
            ));
        }
        if self.sink.kind == SinkKind::Http {
            validate_http_url("sink.url", &self.sink.url)?;
        }
        if self.sink.timeout.is_zero() {
            return Err(anyhow!("sink timeout must be greater than zero"));
        }
        if self.location.timeout.is_zero() {
            return Err(anyhow!("location timeout must be greater than zero"));
        }
        if let Some(fixed) = self.location.fixed {
            fixed.validate()?;
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source.url must not be empty"));
        }
        if let Some(font) = &self.output.font_path {
            if !font.is_file() {
                return Err(anyhow!("output.font_path {} is not a file", font.display()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct IngestConfigFile {
    http_addr: Option<String>,
    feed_addr: Option<String>,
    capacity: Option<usize>,
    input_scale: Option<ScoreScale>,
    geocode: Option<GeocodeConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct GeocodeConfigFile {
    enabled: Option<bool>,
    cache_path: Option<PathBuf>,
    base_url: Option<String>,
}

/// Settings of the dashboard ingest service.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub http_addr: String,
    /// Socket feed listener; `None` disables it.
    pub feed_addr: Option<String>,
    pub capacity: usize,
    /// Scale the capture side reports scores on.
    pub input_scale: ScoreScale,
    pub geocode: GeocodeSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeSettings {
    pub enabled: bool,
    pub cache_path: PathBuf,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_path: PathBuf::from(DEFAULT_GEOCODE_CACHE),
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_INGEST_ADDR.to_string(),
            feed_addr: Some(DEFAULT_FEED_ADDR.to_string()),
            capacity: DEFAULT_RING_CAPACITY,
            input_scale: ScoreScale::default(),
            geocode: GeocodeSettings::default(),
        }
    }
}

impl IngestConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROADWATCH_INGEST_CONFIG").ok();
        let file_cfg: Option<IngestConfigFile> = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: IngestConfigFile) -> Self {
        let defaults = Self::default();
        let geocode_file = file.geocode.unwrap_or_default();
        let geocode = GeocodeSettings {
            enabled: geocode_file.enabled.unwrap_or(defaults.geocode.enabled),
            cache_path: geocode_file
                .cache_path
                .unwrap_or(defaults.geocode.cache_path),
            base_url: geocode_file.base_url.unwrap_or(defaults.geocode.base_url),
            timeout: defaults.geocode.timeout,
        };
        Self {
            http_addr: file.http_addr.unwrap_or(defaults.http_addr),
            feed_addr: match file.feed_addr {
                Some(addr) if addr.trim().is_empty() => None,
                Some(addr) => Some(addr),
                None => defaults.feed_addr,
            },
            capacity: file.capacity.unwrap_or(defaults.capacity),
            input_scale: file.input_scale.unwrap_or(defaults.input_scale),
            geocode,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env("ROADWATCH_INGEST_ADDR") {
            self.http_addr = addr;
        }
        if let Ok(addr) = std::env::var("ROADWATCH_FEED_ADDR") {
            self.feed_addr = if addr.trim().is_empty() || addr.trim() == "off" {
                None
            } else {
                Some(addr)
            };
        }
        if let Some(capacity) = non_empty_env("ROADWATCH_RING_CAPACITY") {
            self.capacity = capacity
                .parse()
                .map_err(|_| anyhow!("ROADWATCH_RING_CAPACITY must be a positive integer"))?;
        }
        if let Some(scale) = non_empty_env("ROADWATCH_INPUT_SCALE") {
            self.input_scale = scale.parse()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(anyhow!("capacity must be greater than zero"));
        }
        if self.http_addr.trim().is_empty() {
            return Err(anyhow!("http_addr must not be empty"));
        }
        if self.geocode.enabled {
            validate_http_url("geocode.base_url", &self.geocode.base_url)?;
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed =
        url::Url::parse(value).map_err(|e| anyhow!("{} '{}' is not a valid URL: {}", field, value, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!(
            "{} must use http or https, got '{}'",
            field,
            other
        )),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        assert_eq!(cfg.source, SourceSettings::default());
        assert_eq!(cfg.detector, DetectorSettings::default());
        assert_eq!(cfg.scoring, ScoringPolicy::default());
        assert_eq!(cfg.events, EventPolicy::default());
        assert_eq!(cfg.sink.url, DEFAULT_SINK_URL);
        assert_eq!(cfg.sink.timeout, Duration::from_secs(3));
    }

    #[test]
    fn file_sections_override_defaults() {
        let file: MonitorConfigFile = serde_json::from_str(
            r#"{
                "scoring": {"area_mode": "union", "clamp_negative": true, "scale": "percent"},
                "sink": {"kind": "socket", "socket_addr": "10.0.0.2:9000"},
                "location": {"provider": "fixed", "fixed": {"latitude": 1.5, "longitude": 2.5}}
            }"#,
        )
        .unwrap();
        let cfg = MonitorConfig::from_file(file).unwrap();
        assert_eq!(cfg.scoring.area_mode, AreaMode::Union);
        assert!(cfg.scoring.clamp_negative);
        assert_eq!(cfg.events.scale, ScoreScale::Percent);
        assert_eq!(cfg.sink.kind, SinkKind::Socket);
        assert_eq!(cfg.sink.socket_addr, "10.0.0.2:9000");
        assert_eq!(cfg.location.provider, LocationProviderKind::Fixed);
        assert_eq!(cfg.location.fixed, Some(Coordinates::new(1.5, 2.5)));
    }

    #[test]
    fn validate_rejects_non_http_sink() {
        let mut cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        cfg.sink.url = "ftp://example.com/add_point".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_warning_threshold() {
        let mut cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        cfg.events.score_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ingest_capacity_must_be_positive() {
        let cfg = IngestConfig {
            capacity: 0,
            ..IngestConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_feed_addr_disables_feed() {
        let file: IngestConfigFile = serde_json::from_str(r#"{"feed_addr": ""}"#).unwrap();
        assert_eq!(IngestConfig::from_file(file).feed_addr, None);
    }
}
