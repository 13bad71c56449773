//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply TRANSPORT_* env overrides)
//!     → validation.rs (semantic checks)
//!     → TransportConfig (validated, immutable)
//!     → injected into the Transport at construction
//! ```
//!
//! # Design Decisions
//! - Read once at startup; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_env, load_config, ConfigError};
pub use schema::{
    AuthConfig, ClientConfig, DedupConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    RetryConfig, TransportConfig,
};
