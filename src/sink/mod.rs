//! Delivery of score events to a dashboard.
//!
//! Delivery is best effort and at most once: one network write per event, no retry,
//! no backoff, no queue. A failed send is the caller's `DeliveryError` to log.

mod http;
mod socket;

use anyhow::Result;
use serde::Deserialize;

pub use http::HttpSink;
pub use socket::SocketSink;

use crate::config::SinkSettings;
use crate::event::ScoreEvent;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Http,
    Socket,
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "socket" | "tcp" => Ok(Self::Socket),
            other => Err(anyhow::anyhow!(
                "unknown sink kind '{}'; expected http or socket",
                other
            )),
        }
    }
}

pub trait EventSink: Send {
    fn name(&self) -> &'static str;

    /// Send one event. Any error means the event is lost.
    fn deliver(&mut self, event: &ScoreEvent) -> Result<()>;
}

pub fn sink_from_settings(settings: &SinkSettings) -> Result<Box<dyn EventSink>> {
    let sink: Box<dyn EventSink> = match settings.kind {
        SinkKind::Http => Box::new(HttpSink::new(&settings.url, settings.timeout)?),
        SinkKind::Socket => Box::new(SocketSink::new(&settings.socket_addr, settings.timeout)?),
    };
    Ok(sink)
}
