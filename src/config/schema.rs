//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the transport.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the transport.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL and per-request defaults.
    pub client: ClientConfig,

    /// Retry engine settings.
    pub retries: RetryConfig,

    /// In-flight deduplication settings.
    pub dedup: DedupConfig,

    /// 429 handling.
    pub rate_limit: RateLimitConfig,

    /// Token refresh settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL that relative request paths are joined onto.
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// User-Agent sent on every request.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("resilient-transport/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total network attempts per logical request, original included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add 0-10% jitter to each backoff delay.
    pub jitter: bool,

    /// Status codes handled by the retry engine.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 300,
            max_delay_ms: 10_000,
            jitter: true,
            retryable_statuses: vec![408, 500, 502, 503, 504],
        }
    }
}

/// Deduplication cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    /// Honor per-request dedupe opt-in. When false every request goes out.
    pub enabled: bool,

    /// Maximum age of an in-flight entry in milliseconds.
    pub ttl_ms: u64,
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 5_000,
        }
    }
}

/// Rate-limit handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Wait used when a 429 carries no retry-after.
    pub default_retry_after_secs: u64,

    /// Upper cap on any single throttle wait.
    pub max_wait_secs: u64,

    /// Consecutive 429s tolerated per logical request before giving up.
    pub max_throttles: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_retry_after_secs: 5,
            max_wait_secs: 60,
            max_throttles: 10,
        }
    }
}

/// Token refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh endpoint path, joined onto the base URL.
    pub refresh_path: String,

    /// Path prefixes whose 401s are surfaced without refreshing.
    pub excluded_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            excluded_paths: vec!["/auth/login".to_string(), "/auth/refresh".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error or a full directive).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
