use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{parse_event, DashboardView, Ingestor};

const MAX_HEADER_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug)]
pub struct IngestHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl IngestHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("ingest server thread panicked"))?;
        }
        Ok(())
    }
}

/// HTTP/1.1 ingest endpoint, one request per connection.
pub struct IngestServer {
    addr: String,
    ingestor: Arc<Ingestor>,
}

impl IngestServer {
    pub fn new(addr: &str, ingestor: Arc<Ingestor>) -> Self {
        Self {
            addr: addr.to_string(),
            ingestor,
        }
    }

    pub fn spawn(self) -> Result<IngestHandle> {
        let listener = TcpListener::bind(&self.addr)
            .map_err(|e| anyhow!("bind ingest server on {}: {}", self.addr, e))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let ingestor = self.ingestor;
        let view = ingestor.view();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_server(listener, &ingestor, &view, shutdown_thread) {
                log::error!("ingest server stopped: {}", err);
            }
        });

        Ok(IngestHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    ingestor: &Ingestor,
    view: &DashboardView,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = handle_connection(stream, ingestor, view) {
                    log::warn!("ingest request from {} failed: {}", peer, err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    ingestor: &Ingestor,
    view: &DashboardView,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(RequestError::TooLarge) => {
            return write_message(&mut stream, 413, "error", "Request body too large");
        }
        Err(RequestError::Malformed(err)) => {
            write_message(&mut stream, 400, "error", "Malformed request")?;
            return Err(err);
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/add_point") => match parse_event(&request.body) {
            Ok(event) => {
                // Reply and close before naming, which may wait on a geocode lookup.
                let point = ingestor.normalize(event);
                let reply = write_message(&mut stream, 200, "success", "Data received");
                drop(stream);
                let point = ingestor.store(point);
                log::debug!("ingested score {:.1} at {}", point.score, point.timestamp);
                reply
            }
            Err(err) => {
                log::warn!("rejected /add_point payload: {}", err);
                write_message(&mut stream, 400, "error", &err.to_string())
            }
        },
        ("GET", "/points") => {
            let body = serde_json::to_vec(&view.points())?;
            write_response(&mut stream, 200, "application/json", &body)
        }
        ("GET", "/summary") => {
            let body = serde_json::to_vec(&view.summary())?;
            write_response(&mut stream, 200, "application/json", &body)
        }
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        (_, "/add_point" | "/points" | "/summary" | "/health") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

enum RequestError {
    TooLarge,
    Malformed(anyhow::Error),
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        Self::Malformed(err.into())
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest, RequestError> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data.len();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(RequestError::TooLarge);
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| RequestError::Malformed(anyhow!("empty request")))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(anyhow!("missing method")))?;
    let raw_path = parts
        .next()
        .ok_or_else(|| RequestError::Malformed(anyhow!("missing path")))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| RequestError::Malformed(anyhow!("bad content-length '{}'", value)))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(RequestError::TooLarge);
    }

    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(RequestError::Malformed(anyhow!(
                "body ended after {} of {} bytes",
                body.len(),
                content_length
            )));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_message(stream: &mut TcpStream, status: u16, kind: &str, message: &str) -> Result<()> {
    let body = serde_json::json!({ "status": kind, "message": message });
    write_response(stream, status, "application/json", &serde_json::to_vec(&body)?)
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}
