//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Transport decision points produce:
//!     → logging.rs (structured events keyed by request_id)
//!     → metrics.rs (counters, histograms)
//! ```
//!
//! # Design Decisions
//! - The request ID flows through every event for one logical request
//! - The library never installs a subscriber or recorder on its own;
//!   the binary calls `init_logging`

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
