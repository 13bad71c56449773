//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! outbound: credentials.rs (current access token → bearer header)
//! inbound 401:
//!     → refresh.rs (join or start the single refresh call)
//!         success → credentials.rs set_tokens → replay once with new token
//!         failure → credentials.rs clear → session.rs handler → SESSION_EXPIRED
//! ```
//!
//! # Design Decisions
//! - The credential store is an injected collaborator; the transport never
//!   decodes tokens or infers expiry
//! - One canonical key per token for reads and writes

pub mod credentials;
pub mod refresh;
pub mod session;

pub use credentials::{CredentialStore, FileCredentialStore, InMemoryCredentialStore, TokenPair};
pub use refresh::RefreshCoordinator;
pub use session::{LogSessionExpired, SessionExpiredHandler};
