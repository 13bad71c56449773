//! Request descriptors and per-attempt outbound requests.
//!
//! # Responsibilities
//! - Describe a logical request (method, path, query, body, headers)
//! - Generate the request ID shared by every attempt of that request
//! - Carry attempt metadata alongside the descriptor, never inside it
//!
//! # Design Decisions
//! - The descriptor is immutable once handed to the transport; each attempt
//!   is rendered into a fresh [`OutboundRequest`]
//! - Query parameters keep caller order for the wire; the fingerprinter
//!   sorts its own copy

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::TransportError;

/// Header carrying the per-request identifier.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the client send time in unix milliseconds.
pub const X_CLIENT_TIMESTAMP: &str = "x-client-timestamp";

/// Bearer token header.
pub const AUTHORIZATION: &str = "authorization";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Unique identifier for a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an attempt is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Original,
    /// Replay after a successful token refresh. A 401 here is terminal.
    RefreshedRetry,
    /// Reissue after a transient failure and backoff delay.
    BackoffRetry,
    /// Reissue after a 429 wait.
    ThrottledRetry,
}

/// Attempt metadata carried beside the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub kind: AttemptKind,
    /// 1-based count of network sends for this logical request.
    pub number: u32,
}

impl Attempt {
    pub fn first() -> Self {
        Self {
            kind: AttemptKind::Original,
            number: 1,
        }
    }

    pub fn next(self, kind: AttemptKind) -> Self {
        Self {
            kind,
            number: self.number + 1,
        }
    }
}

/// A logical request as issued by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the configured base URL, or an absolute URL.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    /// Opt-in to in-flight deduplication. Only honored for GET.
    pub dedupe: bool,
    /// Surface 401 directly instead of refreshing credentials.
    pub skip_auth_refresh: bool,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            dedupe: false,
            skip_auth_refresh: false,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Deduplication applies only to opted-in GETs.
    pub fn is_dedupable(&self) -> bool {
        self.dedupe && self.method == Method::Get
    }
}

/// A fully-resolved request for one network send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub attempt: Attempt,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Bearer token this attempt was sent with, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Set a header, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// Resolve a descriptor's URL against the base, without its query pairs.
///
/// Relative paths are appended to the base path, so `customers` and
/// `/customers` both land under `https://host/api/` when that is the base.
pub fn resolve_url(base: &url::Url, target: &str) -> Result<url::Url, TransportError> {
    if let Ok(absolute) = url::Url::parse(target) {
        return Ok(absolute);
    }

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(target.trim_start_matches('/'))
        .map_err(|e| TransportError::InvalidRequest {
            message: format!("cannot resolve '{}': {}", target, e),
        })
}

/// Current wall clock in unix milliseconds.
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupable_only_for_opted_in_get() {
        assert!(RequestDescriptor::get("/customers").dedupe(true).is_dedupable());
        assert!(!RequestDescriptor::get("/customers").is_dedupable());
        assert!(!RequestDescriptor::post("/customers").dedupe(true).is_dedupable());
        assert!(!RequestDescriptor::delete("/customers/1").dedupe(true).is_dedupable());
    }

    #[test]
    fn test_set_header_replaces() {
        let mut req = OutboundRequest {
            method: Method::Get,
            url: url::Url::parse("http://localhost/x").unwrap(),
            headers: vec![(AUTHORIZATION.into(), "Bearer old".into())],
            body: None,
            timeout: Duration::from_secs(1),
            attempt: Attempt::first(),
        };
        req.set_header("Authorization", "Bearer new");

        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.bearer_token(), Some("new"));
    }

    #[test]
    fn test_resolve_url_keeps_base_path() {
        let base = url::Url::parse("https://inventory.example.com/api").unwrap();

        let a = resolve_url(&base, "/customers/search").unwrap();
        let b = resolve_url(&base, "customers/search").unwrap();
        assert_eq!(a.as_str(), "https://inventory.example.com/api/customers/search");
        assert_eq!(a, b);

        let abs = resolve_url(&base, "https://auth.example.com/token").unwrap();
        assert_eq!(abs.as_str(), "https://auth.example.com/token");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
    }
}
