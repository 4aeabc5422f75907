//! roadwatch_ingest - dashboard ingest service
//!
//! This daemon:
//! 1. Accepts score events over HTTP (`POST /add_point`) and the socket feed
//! 2. Keeps the most recent points in a bounded ring buffer
//! 3. Serves points, summary statistics and the condition distribution as JSON

use anyhow::{anyhow, Result};
use std::sync::mpsc;
use std::sync::Arc;

use roadwatch::config::IngestConfig;
use roadwatch::dashboard::{EventRing, FeedListener, IngestServer, Ingestor};
use roadwatch::geocode::LocationNamer;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = IngestConfig::load()?;
    let ring = Arc::new(EventRing::new(config.capacity)?);
    let mut ingestor = Ingestor::new(ring, config.input_scale);
    if config.geocode.enabled {
        let namer = LocationNamer::from_settings(&config.geocode)?;
        log::info!(
            "location naming enabled, cache at {}",
            config.geocode.cache_path.display()
        );
        ingestor = ingestor.with_namer(namer);
    }
    let ingestor = Arc::new(ingestor);

    let http_handle = IngestServer::new(&config.http_addr, ingestor.clone()).spawn()?;
    log::info!("ingest api listening on {}", http_handle.addr);
    let feed_handle = match &config.feed_addr {
        Some(addr) => {
            let handle = FeedListener::new(addr, ingestor.clone()).spawn()?;
            log::info!("socket feed listening on {}", handle.addr);
            Some(handle)
        }
        None => None,
    };
    log::info!(
        "roadwatch_ingest running. capacity={} input_scale={:?}",
        config.capacity,
        config.input_scale
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("roadwatch_ingest waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping ingest...");
    http_handle.stop()?;
    if let Some(handle) = feed_handle {
        handle.stop()?;
    }
    ingestor.flush()?;

    Ok(())
}
