//! The send seam between the transport core and the network.
//!
//! # Responsibilities
//! - Define [`HttpSender`], the single operation the core needs from an HTTP
//!   client
//! - Provide [`ReqwestSender`], the production implementation
//!
//! # Design Decisions
//! - Any status code is a successful send; classification happens upstream
//! - Each send carries its own timeout
//! - The sender never retries or follows redirects on its own

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::http::request::{Method, OutboundRequest};
use crate::http::response::Response;
use crate::resilience::timeouts::with_timeout;

/// Performs one network exchange.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<Response, TransportError>;
}

/// `reqwest`-backed sender.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn map_error(error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout { timeout }
        } else if error.is_builder() {
            TransportError::InvalidRequest {
                message: error.to_string(),
            }
        } else {
            TransportError::Network {
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: OutboundRequest) -> Result<Response, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder
                .header("content-type", "application/json")
                .body(body);
        }

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|e| Self::map_error(e, timeout))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| {
                    v.to_str()
                        .ok()
                        .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response
                .bytes()
                .await
                .map_err(|e| Self::map_error(e, timeout))?;

            Ok(Response {
                status,
                headers,
                body,
            })
        };

        with_timeout(timeout, exchange).await
    }
}
