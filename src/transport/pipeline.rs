//! Pipeline stages: prepare → send → classify → recover → normalize.
//!
//! `classify` is the single place that fixes the recovery priority:
//! 401 before 429 before transient failures, then client errors, then
//! everything else.

use bytes::Bytes;
use std::time::Duration;

use crate::error::{ApiError, ErrorKind, TransportError};
use crate::http::request::{resolve_url, unix_millis, AUTHORIZATION, X_CLIENT_TIMESTAMP, X_REQUEST_ID};
use crate::http::{Attempt, OutboundRequest, RequestDescriptor, RequestId, Response};
use crate::resilience::{Failure, RetryPolicy};

/// The parts of a descriptor that stay fixed across attempts.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub descriptor: RequestDescriptor,
    pub url: url::Url,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

impl PreparedRequest {
    /// Resolve the URL (with query) and serialize the body once.
    pub fn new(
        descriptor: RequestDescriptor,
        base: &url::Url,
        default_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut url = resolve_url(base, &descriptor.url)?;
        if !descriptor.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(descriptor.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let body = descriptor
            .body
            .as_ref()
            .map(|value| Bytes::from(value.to_string()));
        let timeout = descriptor.timeout.unwrap_or(default_timeout);

        Ok(Self {
            descriptor,
            url,
            body,
            timeout,
        })
    }

    /// Outbound stage: render one attempt with fresh tracing headers and the
    /// current bearer token.
    pub fn render(&self, request_id: &RequestId, attempt: Attempt, token: Option<&str>) -> OutboundRequest {
        let mut outbound = OutboundRequest {
            method: self.descriptor.method,
            url: self.url.clone(),
            headers: self.descriptor.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            attempt,
        };

        outbound.set_header(X_REQUEST_ID, request_id.as_str());
        outbound.set_header(X_CLIENT_TIMESTAMP, unix_millis().to_string());
        if let Some(token) = token {
            outbound.set_header(AUTHORIZATION, format!("Bearer {}", token));
        }
        outbound
    }
}

/// Outbound stage entry point.
pub fn prepare(
    descriptor: RequestDescriptor,
    base: &url::Url,
    default_timeout: Duration,
) -> Result<PreparedRequest, TransportError> {
    PreparedRequest::new(descriptor, base, default_timeout)
}

/// Classified result of one send.
#[derive(Debug)]
pub enum Outcome {
    Success(Response),
    AuthExpired(Response),
    Throttled(Response),
    /// Retry engine territory. `last` is kept for the terminal error.
    Transient {
        failure: Failure,
        last: Result<Response, TransportError>,
    },
    Client(Response),
    Unclassified(Response),
    /// A send that failed for a reason reissuing cannot fix.
    Fatal(TransportError),
}

/// Inbound stage: decide which recovery path, if any, applies.
pub fn classify(result: Result<Response, TransportError>, retry: &RetryPolicy) -> Outcome {
    match result {
        Err(e) if e.is_transient() => Outcome::Transient {
            failure: Failure::NoResponse,
            last: Err(e),
        },
        Err(e) => Outcome::Fatal(e),
        Ok(r) if r.is_success() => Outcome::Success(r),
        Ok(r) if r.status == 401 => Outcome::AuthExpired(r),
        Ok(r) if r.status == 429 => Outcome::Throttled(r),
        Ok(r) if retry.is_retryable(Failure::Status(r.status)) => Outcome::Transient {
            failure: Failure::Status(r.status),
            last: Ok(r),
        },
        Ok(r) if matches!(r.status, 400 | 403 | 404 | 422) => Outcome::Client(r),
        Ok(r) => Outcome::Unclassified(r),
    }
}

/// Terminal error construction.
pub mod normalize {
    use super::*;

    /// Message and details taken from the server's body when it is JSON.
    fn server_details(response: &Response) -> (Option<String>, Option<serde_json::Value>) {
        match response.json::<serde_json::Value>() {
            Ok(value) => {
                let message = ["message", "error", "detail"]
                    .iter()
                    .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
                    .map(str::to_string);
                (message, Some(value))
            }
            Err(_) if !response.body.is_empty() => (None, Some(serde_json::Value::String(response.text()))),
            Err(_) => (None, None),
        }
    }

    fn reason(status: u16) -> String {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string()
    }

    fn from_response(kind: ErrorKind, code: &str, response: &Response, request_id: &RequestId) -> ApiError {
        let (message, details) = server_details(response);
        let error = ApiError::new(kind, code, message.unwrap_or_else(|| reason(response.status)))
            .with_status(response.status)
            .with_request_id(request_id.as_str());
        match details {
            Some(details) => error.with_details(details),
            None => error,
        }
    }

    pub fn client(response: &Response, request_id: &RequestId) -> ApiError {
        let code = match response.status {
            400 => "BAD_REQUEST",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            422 => "VALIDATION_FAILED",
            _ => "CLIENT_ERROR",
        };
        from_response(ErrorKind::Client, code, response, request_id)
    }

    pub fn unauthorized(response: &Response, request_id: &RequestId) -> ApiError {
        from_response(ErrorKind::Unauthorized, "UNAUTHORIZED", response, request_id)
    }

    pub fn unclassified(response: &Response, request_id: &RequestId) -> ApiError {
        from_response(ErrorKind::Unclassified, "HTTP_ERROR", response, request_id)
    }

    pub fn throttled(response: &Response, throttles: u32, request_id: &RequestId) -> ApiError {
        let mut error = from_response(ErrorKind::Throttled, "RATE_LIMITED", response, request_id);
        error.message = format!("still rate limited after {} waits", throttles);
        error
    }

    pub fn exhausted(last: &Result<Response, TransportError>, sends: u32, request_id: &RequestId) -> ApiError {
        match last {
            Ok(response) => {
                let code = if response.status == 408 { "REQUEST_TIMEOUT" } else { "SERVER_ERROR" };
                let mut error = from_response(ErrorKind::Transient, code, response, request_id);
                error.message = format!("{} after {} attempts", error.message, sends);
                error
            }
            Err(e) => {
                let code = match e {
                    TransportError::Timeout { .. } => "TIMEOUT",
                    _ => "NETWORK_ERROR",
                };
                ApiError::new(ErrorKind::Transient, code, format!("{} after {} attempts", e, sends))
                    .with_request_id(request_id.as_str())
            }
        }
    }

    pub fn fatal(error: &TransportError, request_id: &RequestId) -> ApiError {
        let code = match error {
            TransportError::InvalidRequest { .. } => "INVALID_REQUEST",
            _ => "INTERNAL",
        };
        ApiError::new(ErrorKind::Internal, code, error.to_string()).with_request_id(request_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{AttemptKind, Method};

    fn classify_status(status: u16) -> Outcome {
        classify(Ok(Response::new(status, "")), &RetryPolicy::default())
    }

    #[test]
    fn test_classification_priority() {
        assert!(matches!(classify_status(200), Outcome::Success(_)));
        assert!(matches!(classify_status(204), Outcome::Success(_)));
        assert!(matches!(classify_status(401), Outcome::AuthExpired(_)));
        assert!(matches!(classify_status(429), Outcome::Throttled(_)));
        assert!(matches!(
            classify_status(503),
            Outcome::Transient { failure: Failure::Status(503), .. }
        ));
        assert!(matches!(classify_status(408), Outcome::Transient { .. }));
        for status in [400, 403, 404, 422] {
            assert!(matches!(classify_status(status), Outcome::Client(_)), "{}", status);
        }
        assert!(matches!(classify_status(409), Outcome::Unclassified(_)));
        assert!(matches!(classify_status(501), Outcome::Unclassified(_)));
        assert!(matches!(classify_status(302), Outcome::Unclassified(_)));
    }

    #[test]
    fn test_transport_errors() {
        let policy = RetryPolicy::default();
        let network = classify(Err(TransportError::Network { message: "reset".into() }), &policy);
        assert!(matches!(network, Outcome::Transient { failure: Failure::NoResponse, .. }));

        let invalid = classify(Err(TransportError::InvalidRequest { message: "x".into() }), &policy);
        assert!(matches!(invalid, Outcome::Fatal(_)));
    }

    #[test]
    fn test_render_sets_headers_and_replaces_bearer() {
        let base = url::Url::parse("https://inventory.example.com/api/").unwrap();
        let descriptor = RequestDescriptor::get("/customers/search")
            .query("term", "ali")
            .header("Authorization", "Bearer caller");
        let prepared = PreparedRequest::new(descriptor, &base, Duration::from_secs(30)).unwrap();
        let request_id = RequestId::new();

        let first = prepared.render(&request_id, Attempt::first(), Some("t1"));
        assert_eq!(first.url.as_str(), "https://inventory.example.com/api/customers/search?term=ali");
        assert_eq!(first.method, Method::Get);
        assert_eq!(first.header(X_REQUEST_ID), Some(request_id.as_str()));
        assert!(first.header(X_CLIENT_TIMESTAMP).is_some());
        assert_eq!(first.bearer_token(), Some("t1"));

        let replay = prepared.render(&request_id, Attempt::first().next(AttemptKind::RefreshedRetry), Some("t2"));
        let bearers: Vec<_> = replay
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(AUTHORIZATION))
            .collect();
        assert_eq!(bearers.len(), 1);
        assert_eq!(replay.bearer_token(), Some("t2"));
        assert_eq!(replay.attempt.number, 2);
        assert_eq!(replay.header(X_REQUEST_ID), Some(request_id.as_str()));
    }

    #[test]
    fn test_client_error_preserves_server_details() {
        let response = Response::new(
            422,
            r#"{"message":"quantity must be positive","field":"quantity"}"#,
        );
        let error = normalize::client(&response, &RequestId::new());

        assert_eq!(error.code, "VALIDATION_FAILED");
        assert_eq!(error.message, "quantity must be positive");
        assert_eq!(error.http_status, Some(422));
        assert_eq!(error.details.unwrap()["field"], "quantity");
    }

    #[test]
    fn test_exhausted_messages() {
        let id = RequestId::new();
        let err = normalize::exhausted(&Ok(Response::new(503, "")), 3, &id);
        assert_eq!(err.code, "SERVER_ERROR");
        assert_eq!(err.message, "Service Unavailable after 3 attempts");
        assert_eq!(err.request_id, id.as_str());

        let err = normalize::exhausted(
            &Err(TransportError::Timeout { timeout: Duration::from_secs(30) }),
            3,
            &id,
        );
        assert_eq!(err.code, "TIMEOUT");
        assert_eq!(err.http_status, None);
    }
}
