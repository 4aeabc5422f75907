use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use roadwatch::config::{IngestConfig, LocationProviderKind, MonitorConfig};
use roadwatch::sink::SinkKind;
use roadwatch::{AreaMode, ScoreScale};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ROADWATCH_CONFIG",
        "ROADWATCH_SOURCE",
        "ROADWATCH_MODEL_PATH",
        "ROADWATCH_SINK_URL",
        "ROADWATCH_SINK_KIND",
        "ROADWATCH_SCORE_SCALE",
        "ROADWATCH_SCORE_THRESHOLD",
        "ROADWATCH_GEOLOCATION_KEY",
        "ROADWATCH_DELIVERY_TIMEOUT_MS",
        "ROADWATCH_SAVE_DIR",
        "ROADWATCH_INGEST_CONFIG",
        "ROADWATCH_INGEST_ADDR",
        "ROADWATCH_FEED_ADDR",
        "ROADWATCH_RING_CAPACITY",
        "ROADWATCH_INPUT_SCALE",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_monitor_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "source": {"url": "/var/lib/roadwatch/frames", "width": 1280, "height": 720, "frame_limit": 500},
            "detector": {"backend": "stub", "confidence_threshold": 0.4, "iou_threshold": 0.6},
            "scoring": {"area_mode": "union", "clamp_negative": true, "scale": "unit", "score_threshold": 0.6},
            "location": {"provider": "geolocation", "timeout_ms": 1500},
            "sink": {"kind": "http", "url": "http://dashboard.local:8050/add_point"}
        }"#,
    );

    std::env::set_var("ROADWATCH_CONFIG", file.path());
    std::env::set_var("ROADWATCH_SCORE_SCALE", "percent");
    std::env::set_var("ROADWATCH_GEOLOCATION_KEY", "test-key");
    std::env::set_var("ROADWATCH_DELIVERY_TIMEOUT_MS", "750");

    let cfg = MonitorConfig::load().expect("load config");

    assert_eq!(cfg.source.url, "/var/lib/roadwatch/frames");
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.source.frame_limit, Some(500));
    assert_eq!(cfg.detector.thresholds.confidence, 0.4);
    assert_eq!(cfg.detector.thresholds.iou, 0.6);
    assert_eq!(cfg.scoring.area_mode, AreaMode::Union);
    assert!(cfg.scoring.clamp_negative);
    assert_eq!(cfg.events.scale, ScoreScale::Percent);
    assert_eq!(cfg.events.score_threshold, 0.6);
    assert_eq!(cfg.location.provider, LocationProviderKind::Geolocation);
    assert_eq!(cfg.location.api_key.as_deref(), Some("test-key"));
    assert_eq!(cfg.location.timeout, Duration::from_millis(1500));
    assert_eq!(cfg.sink.kind, SinkKind::Http);
    assert_eq!(cfg.sink.url, "http://dashboard.local:8050/add_point");
    assert_eq!(cfg.sink.timeout, Duration::from_millis(750));

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load defaults");
    assert_eq!(cfg.source.url, "stub://road");
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.scoring.area_mode, AreaMode::Summed);
    assert!(!cfg.scoring.clamp_negative);
    assert_eq!(cfg.events.scale, ScoreScale::Unit);
    assert_eq!(cfg.events.score_threshold, 0.7);
    assert_eq!(cfg.sink.url, "http://127.0.0.1:8050/add_point");
    assert_eq!(cfg.sink.timeout, Duration::from_secs(3));

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ROADWATCH_SINK_URL", "not a url");
    assert!(MonitorConfig::load().is_err());
    clear_env();

    std::env::set_var("ROADWATCH_SCORE_SCALE", "per-mille");
    assert!(MonitorConfig::load().is_err());
    clear_env();

    std::env::set_var("ROADWATCH_DELIVERY_TIMEOUT_MS", "0");
    assert!(MonitorConfig::load().is_err());
    clear_env();
}

#[test]
fn loads_ingest_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "http_addr": "0.0.0.0:8050",
            "feed_addr": "0.0.0.0:8051",
            "capacity": 250,
            "input_scale": "unit",
            "geocode": {"enabled": true, "cache_path": "/tmp/names.json"}
        }"#,
    );
    std::env::set_var("ROADWATCH_INGEST_CONFIG", file.path());
    std::env::set_var("ROADWATCH_RING_CAPACITY", "40");
    std::env::set_var("ROADWATCH_FEED_ADDR", "off");

    let cfg = IngestConfig::load().expect("load ingest config");
    assert_eq!(cfg.http_addr, "0.0.0.0:8050");
    assert_eq!(cfg.feed_addr, None);
    assert_eq!(cfg.capacity, 40);
    assert_eq!(cfg.input_scale, ScoreScale::Unit);
    assert!(cfg.geocode.enabled);
    assert_eq!(cfg.geocode.cache_path, std::path::PathBuf::from("/tmp/names.json"));

    std::env::set_var("ROADWATCH_RING_CAPACITY", "0");
    assert!(IngestConfig::load().is_err());

    clear_env();
}

#[test]
fn frame_output_is_off_unless_configured() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("defaults");
    assert_eq!(cfg.output.save_dir, None);

    let file = write_config(r#"{"output": {"save_dir": "/tmp/roadwatch-frames"}}"#);
    std::env::set_var("ROADWATCH_CONFIG", file.path());
    let cfg = MonitorConfig::load().expect("file");
    assert_eq!(
        cfg.output.save_dir.as_deref(),
        Some(std::path::Path::new("/tmp/roadwatch-frames"))
    );

    std::env::set_var("ROADWATCH_SAVE_DIR", "/srv/frames");
    let cfg = MonitorConfig::load().expect("env");
    assert_eq!(
        cfg.output.save_dir.as_deref(),
        Some(std::path::Path::new("/srv/frames"))
    );

    let missing_font = write_config(r#"{"output": {"font_path": "/nonexistent/font.ttf"}}"#);
    std::env::set_var("ROADWATCH_CONFIG", missing_font.path());
    assert!(MonitorConfig::load().is_err());

    clear_env();
}
