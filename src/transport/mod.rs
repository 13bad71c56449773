//! The transport façade.
//!
//! # Data Flow
//! ```text
//! Transport::execute(RequestDescriptor)
//!     → pipeline::prepare (resolve URL + query, serialize body once)
//!     → opted-in GET? → dedup cache (join or start the logical request)
//!     → per attempt:
//!         render (request ID, client timestamp, bearer token)
//!         → HttpSender::send under a deadline
//!         → pipeline::classify
//!             2xx          → Response
//!             401          → refresh coordinator → replay once
//!             429          → rate-limit wait → reissue
//!             transient    → retry engine → backoff → reissue
//!             anything else → pipeline::normalize → ApiError
//! ```
//!
//! # Design Decisions
//! - One request ID per logical request, reused on every attempt
//! - Non-GET requests never touch the dedup cache
//! - A request is replayed after refresh at most once

pub mod builder;
pub mod facade;
pub mod pipeline;

pub use builder::TransportBuilder;
pub use facade::Transport;
pub use pipeline::{classify, Outcome, PreparedRequest};
