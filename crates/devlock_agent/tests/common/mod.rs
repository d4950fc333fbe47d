//! A minimal HTTP authority for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How the stub answers the next requests.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with a status code and a body.
    Body(u16, String),
    /// Answer with status 200 and a body, but only after a pause.
    Delayed(Duration, String),
    /// Hold the connection open without answering.
    Hang(Duration),
}

struct Shared {
    reply: Mutex<Reply>,
    requests: Mutex<Vec<String>>,
    hits: AtomicUsize,
}

/// A status authority listening on localhost.
pub struct StubAuthority {
    port: u16,
    shared: Arc<Shared>,
}

impl StubAuthority {
    /// Starts the stub on an ephemeral port. It answers `{}` until told
    /// otherwise.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared {
            reply: Mutex::new(Reply::Body(200, "{}".into())),
            requests: Mutex::new(Vec::new()),
            hits: AtomicUsize::new(0),
        });

        let accept = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let shared = Arc::clone(&accept);
                thread::spawn(move || serve(stream, &shared));
            }
        });

        Self { port, shared }
    }

    /// Returns the status endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/api/devices/sync", self.port)
    }

    /// Answers following requests with `body` and status 200.
    pub fn respond_json(&self, body: &str) {
        self.reply(Reply::Body(200, body.to_string()));
    }

    /// Sets the reply for following requests.
    pub fn reply(&self, reply: Reply) {
        *self.shared.reply.lock() = reply;
    }

    /// Number of requests served.
    pub fn hits(&self) -> usize {
        self.shared.hits.load(Ordering::SeqCst)
    }

    /// Request targets seen so far (path and query).
    pub fn requests(&self) -> Vec<String> {
        self.shared.requests.lock().clone()
    }
}

fn serve(stream: TcpStream, shared: &Shared) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header == "\r\n" => break,
            Ok(_) => {}
            Err(_) => return,
        }
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    shared.requests.lock().push(target);
    shared.hits.fetch_add(1, Ordering::SeqCst);

    let reply = shared.reply.lock().clone();
    let mut stream = reader.into_inner();
    match reply {
        Reply::Body(code, body) => respond(&mut stream, code, &body),
        Reply::Delayed(pause, body) => {
            thread::sleep(pause);
            respond(&mut stream, 200, &body);
        }
        Reply::Hang(duration) => thread::sleep(duration),
    }
}

fn respond(stream: &mut TcpStream, code: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason(code),
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
