//! Socket feed: newline-delimited JSON score events over TCP.

use anyhow::{anyhow, Result};
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{parse_event, Ingestor};

const READ_POLL: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct FeedHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("feed listener thread panicked"))?;
        }
        Ok(())
    }
}

pub struct FeedListener {
    addr: String,
    ingestor: Arc<Ingestor>,
}

impl FeedListener {
    pub fn new(addr: &str, ingestor: Arc<Ingestor>) -> Self {
        Self {
            addr: addr.to_string(),
            ingestor,
        }
    }

    pub fn spawn(self) -> Result<FeedHandle> {
        let listener = TcpListener::bind(&self.addr)
            .map_err(|e| anyhow!("bind feed listener on {}: {}", self.addr, e))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let ingestor = self.ingestor;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_feed(listener, ingestor, shutdown_thread) {
                log::error!("feed listener stopped: {}", err);
            }
        });

        Ok(FeedHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_feed(listener: TcpListener, ingestor: Arc<Ingestor>, shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut connections = Vec::new();
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let ingestor = ingestor.clone();
                let shutdown = shutdown.clone();
                connections.push(std::thread::spawn(move || {
                    if let Err(err) = read_lines(stream, &ingestor, &shutdown) {
                        log::warn!("feed connection from {} failed: {}", peer, err);
                    }
                }));
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => return Err(err.into()),
        }
        connections.retain(|c: &JoinHandle<()>| !c.is_finished());
    }
    for connection in connections {
        let _ = connection.join();
    }
    Ok(())
}

fn read_lines(stream: TcpStream, ingestor: &Ingestor, shutdown: &AtomicBool) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_POLL))?;
    let mut reader = BufReader::new(stream);
    // Raw bytes: a line may stop mid-character when the poll times out.
    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with(b"\n") {
                    ingest_line(&line, ingestor);
                    line.clear();
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    // Peer closed without a trailing newline.
    ingest_line(&line, ingestor);
    Ok(())
}

fn ingest_line(line: &[u8], ingestor: &Ingestor) {
    if line.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    match parse_event(line) {
        Ok(event) => {
            let point = ingestor.ingest(event);
            log::debug!("feed: score {:.1} at {}", point.score, point.timestamp);
        }
        Err(err) => log::warn!("feed: skipping line: {}", err),
    }
}
