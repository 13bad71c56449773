//! Single-flight token refresh.
//!
//! # States
//! - Idle: no refresh call outstanding
//! - Refreshing: one refresh call in flight; every 401 joins it
//!
//! # State Transitions
//! ```text
//! Idle → Refreshing: first 401 whose token is still the stored one
//! Refreshing → Idle: refresh call settles (success or failure)
//! ```
//!
//! # Design Decisions
//! - The refresh call runs on its own task so a cancelled caller never
//!   aborts it for the others
//! - Tokens are stored before the slot is cleared, so a 401 that lands
//!   after the refresh sees the new token and replays without refreshing
//! - On failure credentials are cleared and the handler notified once per
//!   refresh call, not once per waiter

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::auth::credentials::{CredentialStore, TokenPair};
use crate::auth::session::SessionExpiredHandler;
use crate::error::{ApiError, ErrorKind};
use crate::http::request::{unix_millis, Attempt, OutboundRequest, RequestId, X_CLIENT_TIMESTAMP, X_REQUEST_ID};
use crate::http::{HttpSender, Method};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;

/// Resolves to the new access token.
type SharedRefresh = Shared<BoxFuture<'static, Result<String, ApiError>>>;

struct InFlight {
    future: SharedRefresh,
    generation: u64,
}

/// Refresh endpoint response. A missing refresh token keeps the old one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access_token: String,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default, alias = "expires_in")]
    expires_in: Option<u64>,
}

/// Everything the spawned refresh task needs.
#[derive(Clone)]
struct RefreshContext {
    sender: Arc<dyn HttpSender>,
    credentials: Arc<dyn CredentialStore>,
    session_handler: Arc<dyn SessionExpiredHandler>,
    refresh_url: url::Url,
    timeout: Duration,
}

/// Coordinates token refresh across concurrent 401s.
pub struct RefreshCoordinator {
    context: RefreshContext,
    excluded_paths: Vec<String>,
    slot: Arc<Mutex<Option<InFlight>>>,
    generations: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        sender: Arc<dyn HttpSender>,
        credentials: Arc<dyn CredentialStore>,
        session_handler: Arc<dyn SessionExpiredHandler>,
        refresh_url: url::Url,
        timeout: Duration,
    ) -> Self {
        Self {
            context: RefreshContext {
                sender,
                credentials,
                session_handler,
                refresh_url,
                timeout,
            },
            excluded_paths: Vec::new(),
            slot: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Absolute URL paths whose 401s must not trigger a refresh.
    pub fn with_excluded_paths(mut self, paths: Vec<String>) -> Self {
        self.excluded_paths = paths;
        self
    }

    /// Whether a 401 on `url` must be surfaced without refreshing.
    ///
    /// Excluded paths match whole segments: `/auth/login` covers
    /// `/auth/login/otp` but not `/auth/login-history`.
    pub fn is_excluded(&self, url: &url::Url) -> bool {
        let path = url.path();
        path == self.context.refresh_url.path()
            || self
                .excluded_paths
                .iter()
                .any(|prefix| covers_segment(prefix, path))
    }

    /// Number of refresh calls started so far.
    pub fn refresh_count(&self) -> u64 {
        self.generations.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Obtain a token to replay a request that got 401 with `sent_token`.
    pub async fn recover(&self, sent_token: Option<&str>) -> Result<String, ApiError> {
        let future = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(in_flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    in_flight.future.clone()
                }
                None => {
                    let credentials = &self.context.credentials;
                    match credentials.access_token() {
                        Some(current) if Some(current.as_str()) != sent_token => {
                            tracing::debug!("Token already refreshed, replaying");
                            return Ok(current);
                        }
                        None if sent_token.is_some() && credentials.refresh_token().is_none() => {
                            // Credentials were cleared by an earlier failed refresh.
                            return Err(ApiError::session_expired("session has already ended"));
                        }
                        _ => {}
                    }

                    let generation = self.generations.fetch_add(1, Ordering::SeqCst);
                    let future = self.start(generation);
                    *slot = Some(InFlight {
                        future: future.clone(),
                        generation,
                    });
                    future
                }
            }
        };

        future.await
    }

    fn start(&self, generation: u64) -> SharedRefresh {
        let context = self.context.clone();
        let slot = Arc::clone(&self.slot);

        let handle = tokio::spawn(async move {
            let result = context.run().await;
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().map(|f| f.generation) == Some(generation) {
                *slot = None;
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::new(
                    ErrorKind::Internal,
                    "INTERNAL",
                    format!("token refresh task failed: {}", e),
                ))
            })
        }
        .boxed()
        .shared()
    }
}

fn covers_segment(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl RefreshContext {
    async fn run(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            return Err(self.fail("no refresh token available"));
        };

        tracing::info!(url = %self.refresh_url, "Refreshing access token");

        let body = serde_json::json!({ "refreshToken": refresh_token });
        let request_id = RequestId::new();
        let request = OutboundRequest {
            method: Method::Post,
            url: self.refresh_url.clone(),
            headers: vec![
                (X_REQUEST_ID.to_string(), request_id.to_string()),
                (X_CLIENT_TIMESTAMP.to_string(), unix_millis().to_string()),
            ],
            body: Some(body.to_string().into()),
            timeout: self.timeout,
            attempt: Attempt::first(),
        };

        let response = match with_timeout(self.timeout, self.sender.send(request)).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&format!("refresh call failed: {}", e))),
        };
        if !response.is_success() {
            return Err(self.fail(&format!("refresh endpoint returned {}", response.status)));
        }

        let parsed: RefreshResponse = match response.json() {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.fail(&format!("malformed refresh response: {}", e))),
        };

        let tokens = TokenPair {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token.unwrap_or(refresh_token),
            expires_in: parsed.expires_in,
        };
        self.credentials.set_tokens(&tokens);

        metrics::record_refresh("success");
        tracing::info!("Access token refreshed");
        Ok(tokens.access_token)
    }

    fn fail(&self, reason: &str) -> ApiError {
        let error = ApiError::session_expired(format!("session expired: {}", reason));

        self.credentials.clear();
        self.session_handler.on_session_expired(&error);

        metrics::record_refresh("failure");
        tracing::warn!(reason = %reason, "Token refresh failed, credentials cleared");
        error
    }
}
