//! Resilient API transport.
//!
//! Wraps an HTTP client with request deduplication, retry with exponential
//! backoff, single-flight token refresh, rate-limit handling and error
//! normalization, behind one `execute` call.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

// Request handling
pub mod auth;
pub mod dedup;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

pub use config::TransportConfig;
pub use error::{ApiError, ErrorKind, TransportError};
pub use http::{Method, RequestDescriptor, Response};
pub use transport::{Transport, TransportBuilder};
