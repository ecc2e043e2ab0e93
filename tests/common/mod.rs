#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use cie::errors::{CieError, Result};
use cie::querier::{FactStore, Querier, StoreRows};
use cie::types::{CellValue, TabularResult};

/// Builds a row of cells from JSON values.
pub fn row(cells: Vec<Value>) -> Vec<CellValue> {
    cells
        .into_iter()
        .map(|v| CellValue::try_from(v).unwrap())
        .collect()
}

pub fn table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> TabularResult {
    TabularResult::new(headers.iter().map(|h| h.to_string()).collect(), rows)
}

enum Scripted {
    Table(TabularResult),
    Fail(String),
}

/// In-memory querier answering scripts by substring match.
///
/// Rules are checked in insertion order; a script matching none of them
/// returns an empty result. Every script is recorded.
#[derive(Default)]
pub struct FakeQuerier {
    rules: Vec<(String, Scripted)>,
    scripts: Mutex<Vec<String>>,
}

impl FakeQuerier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, result: TabularResult) -> Self {
        self.rules.push((needle.to_string(), Scripted::Table(result)));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), Scripted::Fail(message.to_string())));
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl Querier for FakeQuerier {
    async fn query(&self, _cancel: &CancellationToken, script: &str) -> Result<TabularResult> {
        self.scripts.lock().unwrap().push(script.to_string());
        for (needle, scripted) in &self.rules {
            if script.contains(needle.as_str()) {
                return match scripted {
                    Scripted::Table(t) => Ok(t.clone()),
                    Scripted::Fail(m) => Err(CieError::Transport { message: m.clone() }),
                };
            }
        }
        Ok(TabularResult::default())
    }
}

/// In-memory fact store answering scripts by substring match.
#[derive(Default, Clone)]
pub struct MemoryStore {
    rules: Vec<(String, std::result::Result<StoreRows, String>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, needle: &str, headers: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let rows = StoreRows {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        };
        self.rules.push((needle.to_string(), Ok(rows)));
        self
    }

    pub fn with_error(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Err(message.to_string())));
        self
    }
}

impl FactStore for MemoryStore {
    fn run_read_only(&self, script: &str) -> std::result::Result<StoreRows, String> {
        for (needle, outcome) in &self.rules {
            if script.contains(needle.as_str()) {
                return outcome.clone();
            }
        }
        Ok(StoreRows::default())
    }
}

/// HTTP response produced by a mock endpoint handler.
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Arc<dyn Fn(&Value) -> MockResponse + Send + Sync>;

/// A query endpoint on a local port, served by a background thread.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockServer {
    pub fn start(handler: impl Fn(&Value) -> MockResponse + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let seen = Arc::clone(&requests);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let handler = Arc::clone(&handler);
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || serve_one(stream, handler, seen));
            }
        });

        Self { addr, requests }
    }

    /// Serves `store` the way a real query endpoint would: rows as
    /// `{Headers, Rows}` with status 200, engine errors with status 500.
    pub fn backed_by(store: MemoryStore) -> Self {
        Self::start(move |body| {
            let script = body["script"].as_str().unwrap_or_default();
            match store.run_read_only(script) {
                Ok(rows) => MockResponse::new(
                    200,
                    json!({ "Headers": rows.headers, "Rows": rows.rows }).to_string(),
                ),
                Err(message) => MockResponse::new(500, message),
            }
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request paths and JSON bodies received so far.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve_one(stream: TcpStream, handler: Handler, seen: Arc<Mutex<Vec<(String, Value)>>>) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let body = if headers
        .get("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        read_chunked(&mut reader)
    } else {
        let len: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).unwrap();
        buf
    };

    let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    seen.lock().unwrap().push((path, parsed.clone()));

    let response = handler(&parsed);
    if !response.delay.is_zero() {
        std::thread::sleep(response.delay);
    }

    let reason = if response.status < 300 { "OK" } else { "Error" };
    let raw = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.body.len(),
        response.body
    );
    let mut writer = stream;
    let _ = writer.write_all(raw.as_bytes());
    let _ = writer.flush();
}

fn read_chunked(reader: &mut BufReader<TcpStream>) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).unwrap();
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
        let mut chunk = vec![0u8; size + 2];
        reader.read_exact(&mut chunk).unwrap();
        if size == 0 {
            break;
        }
        chunk.truncate(size);
        body.extend_from_slice(&chunk);
    }
    body
}
