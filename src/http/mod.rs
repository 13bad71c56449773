//! HTTP wire types and the network seam.
//!
//! # Data Flow
//! ```text
//! caller
//!     → request.rs (RequestDescriptor, immutable)
//!     → [transport pipeline renders an OutboundRequest per attempt]
//!     → client.rs (HttpSender::send, one network exchange)
//!     → response.rs (buffered Response, shared by deduplicated callers)
//! ```

pub mod client;
pub mod request;
pub mod response;

pub use client::{HttpSender, ReqwestSender};
pub use request::{
    Attempt, AttemptKind, Method, OutboundRequest, RequestDescriptor, RequestId, AUTHORIZATION,
    X_CLIENT_TIMESTAMP, X_REQUEST_ID,
};
pub use response::Response;
