use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::EventSink;
use crate::event::ScoreEvent;

/// Socket feed: one connection per event, the event as a single JSON line.
pub struct SocketSink {
    addr: String,
    timeout: Duration,
}

impl SocketSink {
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        if addr.trim().is_empty() {
            return Err(anyhow!("socket sink address is empty"));
        }
        if timeout.is_zero() {
            return Err(anyhow!("socket sink timeout must be greater than zero"));
        }
        Ok(Self {
            addr: addr.to_string(),
            timeout,
        })
    }

    fn resolve(&self) -> Result<SocketAddr> {
        self.addr
            .to_socket_addrs()
            .with_context(|| format!("resolve feed address {}", self.addr))?
            .next()
            .ok_or_else(|| anyhow!("feed address {} resolved to nothing", self.addr))
    }
}

impl EventSink for SocketSink {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn deliver(&mut self, event: &ScoreEvent) -> Result<()> {
        let addr = self.resolve()?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)
            .with_context(|| format!("connect to feed {}", addr))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        stream
            .write_all(&line)
            .with_context(|| format!("write event to feed {}", addr))?;
        stream.flush()?;
        Ok(())
    }
}
