//! The transport façade and the per-request recovery loop.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{CredentialStore, RefreshCoordinator};
use crate::dedup::{fingerprint, DedupCache};
use crate::error::{ApiError, ErrorKind};
use crate::http::{Attempt, AttemptKind, HttpSender, Method, RequestDescriptor, RequestId, Response};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{Failure, RateLimitHandler, RetryPolicy};
use crate::transport::pipeline::{self, classify, normalize, Outcome, PreparedRequest};

pub(crate) struct Inner {
    pub(crate) base_url: url::Url,
    pub(crate) timeout: Duration,
    pub(crate) dedup_enabled: bool,
    pub(crate) sender: Arc<dyn HttpSender>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) retry: RetryPolicy,
    pub(crate) rate_limit: RateLimitHandler,
    pub(crate) dedup: DedupCache,
    pub(crate) refresh: RefreshCoordinator,
}

/// Handle on a configured transport. Clones share caches and the refresh slot.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Execute one logical request through the full pipeline.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, ApiError> {
        let start = Instant::now();
        let method = descriptor.method;
        let request_id = RequestId::new();

        let result = self.dispatch(descriptor, request_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                tracing::warn!(
                    request_id = %e.request_id,
                    method = %method,
                    code = %e.code,
                    status = ?e.http_status,
                    "Request failed"
                );
                e.kind.as_str()
            }
        };
        metrics::record_request(method.as_str(), outcome, start);
        result
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, dedupe: bool) -> Result<T, ApiError> {
        let response = self.execute(RequestDescriptor::get(path).dedupe(dedupe)).await?;
        decode(&response)
    }

    /// Send `body` as JSON with `method` and decode the JSON reply.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| {
            ApiError::new(ErrorKind::Internal, "INVALID_REQUEST", format!("cannot encode body: {}", e))
        })?;
        let response = self
            .execute(RequestDescriptor::new(method, path).json(body))
            .await?;
        decode(&response)
    }

    pub fn dedup_cache(&self) -> &DedupCache {
        &self.inner.dedup
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    async fn dispatch(&self, descriptor: RequestDescriptor, request_id: RequestId) -> Result<Response, ApiError> {
        let inner = &self.inner;
        let prepared = pipeline::prepare(descriptor, &inner.base_url, inner.timeout)
            .map_err(|e| normalize::fatal(&e, &request_id))?;

        if inner.dedup_enabled && prepared.descriptor.is_dedupable() {
            let key = fingerprint(&prepared.descriptor, &inner.base_url)
                .map_err(|e| normalize::fatal(&e, &request_id))?;
            let inner = Arc::clone(inner);
            // Joined callers receive the originating request's outcome,
            // request ID included.
            return self
                .inner
                .dedup
                .acquire(key, move || inner.run(prepared, request_id))
                .await;
        }

        Arc::clone(inner).run(prepared, request_id).await
    }
}

fn decode<T: DeserializeOwned>(response: &Response) -> Result<T, ApiError> {
    response.json().map_err(|e| {
        ApiError::new(ErrorKind::Unclassified, "INVALID_RESPONSE", format!("cannot decode body: {}", e))
            .with_status(response.status)
    })
}

impl Inner {
    async fn run(self: Arc<Self>, prepared: PreparedRequest, request_id: RequestId) -> Result<Response, ApiError> {
        let mut retry = self.retry.start();
        let mut attempt = Attempt::first();
        let mut refreshed = false;
        // Consecutive 429s; any other reissue resets it.
        let mut throttled = 0u32;
        let mut replay_token: Option<String> = None;

        loop {
            let token = replay_token.take().or_else(|| self.credentials.access_token());
            let outbound = prepared.render(&request_id, attempt, token.as_deref());

            tracing::debug!(
                request_id = %request_id,
                method = %prepared.descriptor.method,
                url = %prepared.url,
                attempt = attempt.number,
                kind = ?attempt.kind,
                "Sending request"
            );

            let result = with_timeout(prepared.timeout, self.sender.send(outbound)).await;

            match classify(result, &self.retry) {
                Outcome::Success(response) => {
                    tracing::debug!(
                        request_id = %request_id,
                        status = response.status,
                        attempt = attempt.number,
                        "Request succeeded"
                    );
                    return Ok(response);
                }

                Outcome::AuthExpired(response) => {
                    if refreshed
                        || prepared.descriptor.skip_auth_refresh
                        || self.refresh.is_excluded(&prepared.url)
                    {
                        return Err(normalize::unauthorized(&response, &request_id));
                    }
                    refreshed = true;

                    tracing::info!(request_id = %request_id, url = %prepared.url, "Got 401, recovering session");
                    let fresh = self
                        .refresh
                        .recover(token.as_deref())
                        .await
                        .map_err(|e| e.with_request_id(request_id.as_str()))?;

                    replay_token = Some(fresh);
                    throttled = 0;
                    attempt = attempt.next(AttemptKind::RefreshedRetry);
                }

                Outcome::Throttled(response) => {
                    throttled += 1;
                    if !self.rate_limit.allows(throttled) {
                        return Err(normalize::throttled(&response, throttled - 1, &request_id));
                    }

                    let delay = self.rate_limit.delay_for(&response);
                    metrics::record_throttled();
                    tracing::warn!(
                        request_id = %request_id,
                        url = %prepared.url,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, waiting before retry"
                    );

                    tokio::time::sleep(delay).await;
                    attempt = attempt.next(AttemptKind::ThrottledRetry);
                }

                Outcome::Transient { failure, last } => {
                    let decision = self.retry.should_retry(failure, &mut retry);
                    if !decision.retry {
                        tracing::warn!(
                            request_id = %request_id,
                            url = %prepared.url,
                            attempts = retry.sends(),
                            "Retry budget exhausted"
                        );
                        return Err(normalize::exhausted(&last, retry.sends(), &request_id));
                    }

                    let status = match failure {
                        Failure::Status(status) => Some(status),
                        Failure::NoResponse => None,
                    };
                    metrics::record_retry(status);
                    tracing::warn!(
                        request_id = %request_id,
                        url = %prepared.url,
                        status = ?status,
                        retry = retry.attempt,
                        delay_ms = decision.delay.as_millis() as u64,
                        "Transient failure, backing off"
                    );

                    tokio::time::sleep(decision.delay).await;
                    throttled = 0;
                    attempt = attempt.next(AttemptKind::BackoffRetry);
                }

                Outcome::Client(response) => return Err(normalize::client(&response, &request_id)),
                Outcome::Unclassified(response) => return Err(normalize::unclassified(&response, &request_id)),
                Outcome::Fatal(error) => return Err(normalize::fatal(&error, &request_id)),
            }
        }
    }
}
