//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

use resilient_transport::auth::{CredentialStore, InMemoryCredentialStore, TokenPair};
use resilient_transport::config::TransportConfig;
use resilient_transport::error::TransportError;
use resilient_transport::http::{Attempt, HttpSender, Method, OutboundRequest, Response, X_REQUEST_ID};
use resilient_transport::{ApiError, Transport};

pub const BASE_URL: &str = "http://api.test/v1/";

/// One send as seen by the scripted sender.
#[derive(Debug, Clone)]
pub struct Sent {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub request_id: Option<String>,
    pub attempt: Attempt,
    pub at: Instant,
}

type Responder = dyn Fn(&OutboundRequest, usize) -> Result<Response, TransportError> + Send + Sync;

/// `HttpSender` double driven by a closure.
///
/// The closure receives the request and the zero-based index of this call
/// among calls to the same path. Every call sleeps for `delay` first.
pub struct ScriptedSender {
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedSender {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&OutboundRequest, usize) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, responder)
    }

    pub fn with_delay<F>(delay: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&OutboundRequest, usize) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay,
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Always answer `status` with `body`.
    pub fn fixed(status: u16, body: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(Response::new(status, body)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.sent().iter().filter(|s| s.path == path).count()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSender for ScriptedSender {
    async fn send(&self, request: OutboundRequest) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = {
            let mut sent = self.sent.lock().unwrap();
            let index = sent.iter().filter(|s| s.path == request.url.path()).count();
            sent.push(Sent {
                method: request.method,
                path: request.url.path().to_string(),
                query: request.url.query().map(str::to_string),
                bearer: request.bearer_token().map(str::to_string),
                request_id: request.header(X_REQUEST_ID).map(str::to_string),
                attempt: request.attempt,
                at: Instant::now(),
            });
            index
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(&request, index)
    }
}

/// Config tuned for deterministic timing: no jitter, 100ms base delay.
pub fn test_config() -> TransportConfig {
    let mut config = TransportConfig::default();
    config.client.base_url = BASE_URL.to_string();
    config.retries.base_delay_ms = 100;
    config.retries.jitter = false;
    config
}

pub fn store(access: &str, refresh: &str) -> Arc<InMemoryCredentialStore> {
    Arc::new(InMemoryCredentialStore::with_tokens(&TokenPair::new(access, refresh)))
}

/// Build a transport over `sender` with an in-memory store.
pub fn transport(
    config: TransportConfig,
    sender: Arc<dyn HttpSender>,
    credentials: Arc<dyn CredentialStore>,
) -> Transport {
    Transport::builder(config)
        .sender(sender)
        .credentials(credentials)
        .build()
        .unwrap()
}

/// Session-expired handler that counts invocations.
pub fn counting_handler(count: Arc<AtomicUsize>) -> impl Fn(&ApiError) + Send + Sync + 'static {
    move |_: &ApiError| {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serve `app` on an ephemeral local port.
pub async fn start_backend(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}
