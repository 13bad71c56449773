//! Error types for the transport core.
//!
//! Two layers:
//! - [`TransportError`]: what a single send (or the refresh call) can fail
//!   with. `Clone` so one failure can be fanned out to every caller sharing
//!   a deduplicated or refresh future.
//! - [`ApiError`]: the normalized terminal error a caller receives once all
//!   recovery (retry, refresh, throttle wait) has been exhausted.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single network exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TransportError {
    /// True when no response was received and the exchange may succeed if
    /// reissued.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure, timeout or retryable status after the retry budget ran out.
    Transient,
    /// The server kept answering 429 past the throttle bound.
    Throttled,
    /// The refresh call failed; credentials have been cleared.
    SessionExpired,
    /// 401 on a path excluded from refresh, or on the replay after a refresh.
    Unauthorized,
    /// 400/403/404/422 surfaced with server details.
    Client,
    /// Any other non-success status.
    Unclassified,
    /// The request could not be built or a background task failed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Throttled => "throttled",
            Self::SessionExpired => "session_expired",
            Self::Unauthorized => "unauthorized",
            Self::Client => "client",
            Self::Unclassified => "unclassified",
            Self::Internal => "internal",
        }
    }
}

/// Normalized error surfaced to callers on terminal failure.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub http_status: Option<u16>,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            http_status: None,
            request_id: String::new(),
            details: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_session_expired(&self) -> bool {
        self.kind == ErrorKind::SessionExpired
    }

    /// The error every waiter receives when the refresh call fails.
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionExpired, "SESSION_EXPIRED", message).with_status(401)
    }
}
