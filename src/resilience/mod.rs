//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Each network send:
//!     → timeouts.rs (per-attempt deadline)
//! On 429:
//!     → rate_limit.rs (server-dictated wait, bounded)
//! On network failure / retryable status:
//!     → retries.rs (budget check) → backoff.rs (delay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every send has a deadline
//! - Throttle waits and backoff retries are budgeted separately
//! - All delays are per-request and never block other requests

pub mod backoff;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use rate_limit::RateLimitHandler;
pub use retries::{Failure, RetryDecision, RetryPolicy, RetryState};
