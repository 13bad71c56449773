//! Rate-limit (429) handling.
//!
//! # Responsibilities
//! - Read the server's retry-after hint
//! - Cap the wait and bound the number of consecutive throttles
//!
//! # Design Decisions
//! - The server dictates timing: no exponential growth
//! - Throttle waits do not consume retry-engine attempts
//! - Only the delta-seconds form of retry-after is understood; anything
//!   else falls back to the configured default

use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::http::Response;

const RETRY_AFTER: &str = "retry-after";

#[derive(Debug, Clone)]
pub struct RateLimitHandler {
    default_wait: Duration,
    max_wait: Duration,
    max_throttles: u32,
}

impl RateLimitHandler {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            default_wait: Duration::from_secs(config.default_retry_after_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
            max_throttles: config.max_throttles,
        }
    }

    /// How long to wait before reissuing after this 429.
    pub fn delay_for(&self, response: &Response) -> Duration {
        response
            .header(RETRY_AFTER)
            .and_then(parse_retry_after)
            .unwrap_or(self.default_wait)
            .min(self.max_wait)
    }

    /// Whether another wait is allowed after `throttled` consecutive 429s.
    pub fn allows(&self, throttled: u32) -> bool {
        throttled <= self.max_throttles
    }
}

impl Default for RateLimitHandler {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Parse a delta-seconds retry-after value. Fractions are accepted.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
