//! roadwatchd - road condition capture and scoring daemon
//!
//! This daemon:
//! 1. Reads frames from the configured source (synthetic, image directory, video file)
//! 2. Runs the damage detector on each frame
//! 3. Scores the frame and stamps it with a location fix
//! 4. Delivers one score event per frame to the dashboard
//!
//! Stops at end of stream, after `--max-frames`, on Ctrl-C, or on a model failure.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use roadwatch::{open_source, MonitorConfig, Pipeline};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: stub://<name>, an image directory or a video file.
    #[arg(long, env = "ROADWATCH_SOURCE")]
    source: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Save an annotated PNG of every scored frame here (feature: save-frames).
    #[arg(long, value_name = "DIR")]
    save_frames: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let mut cfg = {
        let _stage = ui.stage("Load config");
        MonitorConfig::load()?
    };
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(dir) = args.save_frames {
        cfg.output.save_dir = Some(dir);
    }

    let mut source = {
        let mut stage = ui.stage("Open frame source");
        let source = open_source(&cfg.source)?;
        stage.done(source.describe());
        source
    };

    let mut pipeline = {
        let mut stage = ui.stage("Load detector");
        let pipeline = Pipeline::from_config(&cfg)?;
        stage.done(pipeline.detector_name());
        pipeline
    };
    {
        let _stage = ui.stage("Warm up detector");
        pipeline.warm_up()?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "roadwatchd {} running. source={} sink={}",
        env!("CARGO_PKG_VERSION"),
        source.describe(),
        match cfg.sink.kind {
            roadwatch::sink::SinkKind::Http => cfg.sink.url.as_str(),
            roadwatch::sink::SinkKind::Socket => cfg.sink.socket_addr.as_str(),
        }
    );

    let started = Instant::now();
    let stats = pipeline.run(source.as_mut(), &shutdown, args.max_frames)?;
    if shutdown.load(Ordering::SeqCst) {
        log::info!("shutdown signal received, stopped after {} frames", stats.frames);
    }
    ui.report(&stats, started.elapsed());
    Ok(())
}
