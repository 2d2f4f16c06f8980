//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed table of paths, each with a canned behavior (plain body,
//! error status, redirect, slow trickle, or silence). Unknown paths get 404.
//! Counts GET requests per path so tests can assert on dedup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// 200 with this body.
    Body(Vec<u8>),
    /// Given status with this body.
    Status(u16, Vec<u8>),
    /// 302 to another path on this server.
    Redirect(&'static str),
    /// 200 with Content-Length up front, then each chunk after `delay`.
    Trickle { chunks: Vec<Vec<u8>>, delay: Duration },
    /// Accept and read the request, then say nothing for this long.
    Silent(Duration),
}

pub struct TestServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    /// Full URL for `path` (which must start with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Number of requests seen for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(routes: Vec<(&str, Behavior)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Behavior>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, b)| (p.to_string(), b))
            .collect(),
    );
    let hits = Arc::new(Mutex::new(HashMap::new()));
    let hits_srv = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&hits_srv);
            thread::spawn(move || handle(stream, &routes, &hits));
        }
    });
    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        hits,
    }
}

/// A port on localhost that nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/gone", port)
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Behavior>,
    hits: &Mutex<HashMap<String, usize>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let Some(path) = read_request_path(&mut stream) else {
        return;
    };
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    match routes.get(&path) {
        None => respond(&mut stream, 404, "Not Found", b"no such path"),
        Some(Behavior::Body(body)) => respond(&mut stream, 200, "OK", body),
        Some(Behavior::Status(code, body)) => respond(&mut stream, *code, "Status", body),
        Some(Behavior::Redirect(to)) => {
            let response = format!(
                "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                to
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Some(Behavior::Trickle { chunks, delay }) => {
            let total: usize = chunks.iter().map(Vec::len).sum();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                total
            );
            if stream.write_all(head.as_bytes()).is_err() {
                return;
            }
            for (i, chunk) in chunks.iter().enumerate() {
                if i > 0 {
                    thread::sleep(*delay);
                }
                if stream.write_all(chunk).is_err() || stream.flush().is_err() {
                    return;
                }
            }
        }
        Some(Behavior::Silent(d)) => thread::sleep(*d),
    }
}

fn respond(stream: &mut TcpStream, code: u16, reason: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        code,
        reason,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

/// Reads until the end of the request head and returns the request path.
fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 || buf.len() > 64 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}
