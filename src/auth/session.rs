//! Session-expired notification seam.
//!
//! The transport only reports that the session ended. Redirects, toasts
//! and anything else user-facing belong to the implementation.

use crate::error::ApiError;

/// Called once per failed refresh, after credentials have been cleared.
pub trait SessionExpiredHandler: Send + Sync {
    fn on_session_expired(&self, error: &ApiError);
}

impl<F> SessionExpiredHandler for F
where
    F: Fn(&ApiError) + Send + Sync,
{
    fn on_session_expired(&self, error: &ApiError) {
        self(error)
    }
}

/// Default handler: logs and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSessionExpired;

impl SessionExpiredHandler for LogSessionExpired {
    fn on_session_expired(&self, error: &ApiError) {
        tracing::warn!(code = %error.code, message = %error.message, "Session expired");
    }
}
