//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use hostplane::builder::{Builder, Document};
use hostplane::config::{BuildConfig, ReconcileConfig};
use hostplane::engine::{AdaptError, AdminError, ConfigAdapter, EngineAdmin, Validator};
use hostplane::model::{ProxyHost, Upstream};
use hostplane::observability::ReconcileMetrics;
use hostplane::reconciler::Reconciler;
use hostplane::store::MemoryStore;

/// Adapter that accepts any JSON text, unless told to reject.
#[derive(Default)]
pub struct FakeAdapter {
    pub version: Mutex<String>,
    pub reject_with: Mutex<Option<String>>,
    pub adapt_calls: AtomicU32,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            version: Mutex::new("v2.7.6 h1:abc".to_string()),
            ..Default::default()
        })
    }

    pub fn reject(&self, diagnostic: &str) {
        *self.reject_with.lock().unwrap() = Some(diagnostic.to_string());
    }

    pub fn adapts(&self) -> u32 {
        self.adapt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigAdapter for FakeAdapter {
    async fn version(&self) -> Result<String, AdaptError> {
        Ok(self.version.lock().unwrap().clone())
    }

    async fn adapt(&self, text: &str) -> Result<Document, AdaptError> {
        self.adapt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(diagnostic) = self.reject_with.lock().unwrap().clone() {
            return Err(AdaptError::Rejected { status: Some(1), diagnostic });
        }
        Document::parse(text).map_err(|e| AdaptError::MalformedOutput { diagnostic: e.to_string() })
    }
}

/// In-process stand-in for the engine's admin endpoint.
#[derive(Default)]
pub struct FakeEngine {
    pub active: Mutex<Option<Document>>,
    /// Errors returned by the next applies, in order.
    pub apply_failures: Mutex<VecDeque<AdminError>>,
    /// Every apply fails with this while set.
    pub down: Mutex<Option<AdminError>>,
    /// Replaces what `fetch` reports.
    pub fetch_override: Mutex<Option<Document>>,
    pub apply_delay: Mutex<Duration>,
    pub apply_calls: AtomicU32,
    pub accepted: Mutex<Vec<Document>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, errors: impl IntoIterator<Item = AdminError>) {
        self.apply_failures.lock().unwrap().extend(errors);
    }

    pub fn set_down(&self, error: Option<AdminError>) {
        *self.down.lock().unwrap() = error;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = delay;
    }

    pub fn active(&self) -> Option<Document> {
        self.active.lock().unwrap().clone()
    }

    pub fn applies(&self) -> u32 {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> Vec<Document> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineAdmin for FakeEngine {
    async fn apply(&self, document: &Document) -> Result<(), AdminError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.apply_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.down.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(err) = self.apply_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        *self.active.lock().unwrap() = Some(document.clone());
        self.accepted.lock().unwrap().push(document.clone());
        Ok(())
    }

    async fn fetch(&self) -> Result<Document, AdminError> {
        if let Some(doc) = self.fetch_override.lock().unwrap().clone() {
            return Ok(doc);
        }
        Ok(self.active().unwrap_or_default())
    }
}

pub fn refused() -> AdminError {
    AdminError::ConnectionRefused {
        endpoint: "http://127.0.0.1:2019/load".to_string(),
        message: "Connection refused (os error 111)".to_string(),
    }
}

pub fn host(id: u64, domain: &str, upstream: &str, port: u16) -> ProxyHost {
    ProxyHost::new(id, vec![domain.to_string()], Upstream::new(upstream, port))
}

pub fn fast_config() -> ReconcileConfig {
    ReconcileConfig {
        apply_retry_base_ms: 1,
        apply_retry_max_ms: 5,
        ..ReconcileConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub adapter: Arc<FakeAdapter>,
    pub engine: Arc<FakeEngine>,
    pub reconciler: Reconciler,
}

pub fn harness_with(config: ReconcileConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let adapter = FakeAdapter::new();
    let engine = FakeEngine::new();
    let reconciler = Reconciler::new(
        &config,
        store.clone(),
        Builder::new(BuildConfig::default()),
        Validator::new(adapter.clone()),
        engine.clone(),
        ReconcileMetrics::noop(),
    );
    Harness { store, adapter, engine, reconciler }
}

pub fn harness() -> Harness {
    harness_with(fast_config())
}

/// A request seen by the mock admin server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable mock admin endpoint on an ephemeral port.
pub async fn start_admin_server<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(request.clone());
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            _ => "418 I'm a teapot",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(SeenRequest { method, path, body })
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
