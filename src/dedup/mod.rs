//! Request deduplication subsystem.
//!
//! # Data Flow
//! ```text
//! opted-in GET
//!     → fingerprint.rs (method + url + sorted query + canonical body)
//!     → cache.rs acquire()
//!         live entry  → join its shared future
//!         no entry    → spawn the logical request, store its shared future
//!     → on settle the spawned task releases its own entry
//! ```
//!
//! # Design Decisions
//! - Only GETs the caller opted in are eligible; lookups keyed by
//!   user-typed identifiers stay opted out, since two identical texts a
//!   moment apart may target different records
//! - Entries expire after a fixed TTL even if still in flight
//! - Retries happen inside the shared task and never re-enter the cache

pub mod cache;
pub mod fingerprint;

pub use cache::{DedupCache, SharedOutcome, SharedResult};
pub use fingerprint::{fingerprint, Fingerprint};
