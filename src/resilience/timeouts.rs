//! Timeout enforcement.
//!
//! Every network send gets its own deadline. Backoff and throttle sleeps
//! run outside it.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Run `future` with a deadline, mapping expiry to [`TransportError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout { timeout }),
    }
}
