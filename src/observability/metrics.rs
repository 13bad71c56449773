//! Metrics collection.
//!
//! # Metrics
//! - `transport_requests_total` (counter): logical requests by method, outcome
//! - `transport_request_duration_seconds` (histogram): end-to-end latency
//! - `transport_retries_total` (counter): backoff retries scheduled
//! - `transport_dedup_hits_total` (counter): callers joined onto an in-flight request
//! - `transport_refresh_total` (counter): refresh calls by result
//! - `transport_throttled_total` (counter): 429 waits
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application
//!   installs whatever recorder/exporter it wants
//! - Without a recorder every call is a no-op

use ::metrics::{counter, histogram};
use std::time::Instant;

/// Record a finished logical request.
pub fn record_request(method: &str, outcome: &'static str, start: Instant) {
    counter!(
        "transport_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("transport_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(status: Option<u16>) {
    let reason = status.map(|s| s.to_string()).unwrap_or_else(|| "network".to_string());
    counter!("transport_retries_total", "reason" => reason).increment(1);
}

pub fn record_dedup_hit() {
    counter!("transport_dedup_hits_total").increment(1);
}

pub fn record_refresh(result: &'static str) {
    counter!("transport_refresh_total", "result" => result).increment(1);
}

pub fn record_throttled() {
    counter!("transport_throttled_total").increment(1);
}
