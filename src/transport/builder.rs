//! Transport construction.
//!
//! # Responsibilities
//! - Validate configuration before anything is built
//! - Fill in default collaborators the caller did not inject
//! - Resolve the refresh endpoint and excluded paths against the base URL
//!
//! # Design Decisions
//! - Fail fast: an invalid config never yields a transport
//! - Every collaborator is injectable so tests can script the network

use std::sync::Arc;

use crate::auth::{
    CredentialStore, InMemoryCredentialStore, LogSessionExpired, RefreshCoordinator,
    SessionExpiredHandler,
};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, TransportConfig};
use crate::dedup::DedupCache;
use crate::http::request::resolve_url;
use crate::http::{HttpSender, ReqwestSender};
use crate::resilience::{RateLimitHandler, RetryPolicy};
use crate::transport::facade::{Inner, Transport};

pub struct TransportBuilder {
    config: TransportConfig,
    sender: Option<Arc<dyn HttpSender>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    session_handler: Option<Arc<dyn SessionExpiredHandler>>,
}

impl TransportBuilder {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            sender: None,
            credentials: None,
            session_handler: None,
        }
    }

    /// Replace the network seam. Defaults to [`ReqwestSender`].
    pub fn sender(mut self, sender: Arc<dyn HttpSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn session_handler(mut self, handler: Arc<dyn SessionExpiredHandler>) -> Self {
        self.session_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Transport, ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;
        let config = self.config;

        let base_url = url::Url::parse(&config.client.base_url).map_err(|e| {
            ConfigError::Client(crate::error::TransportError::InvalidRequest {
                message: format!("invalid base_url '{}': {}", config.client.base_url, e),
            })
        })?;

        let sender: Arc<dyn HttpSender> = match self.sender {
            Some(sender) => sender,
            None => Arc::new(ReqwestSender::new(&config.client.user_agent)?),
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let session_handler = self
            .session_handler
            .unwrap_or_else(|| Arc::new(LogSessionExpired));

        let refresh_url = resolve_url(&base_url, &config.auth.refresh_path)?;
        let excluded_paths = config
            .auth
            .excluded_paths
            .iter()
            .map(|path| resolve_url(&base_url, path).map(|url| url.path().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        let refresh = RefreshCoordinator::new(
            Arc::clone(&sender),
            Arc::clone(&credentials),
            session_handler,
            refresh_url,
            config.client.timeout(),
        )
        .with_excluded_paths(excluded_paths);

        tracing::info!(
            base_url = %base_url,
            max_attempts = config.retries.max_attempts,
            dedup_ttl_ms = config.dedup.ttl_ms,
            "Transport configured"
        );

        Ok(Transport::from_inner(Inner {
            base_url,
            timeout: config.client.timeout(),
            dedup_enabled: config.dedup.enabled,
            sender,
            credentials,
            retry: RetryPolicy::from_config(&config.retries),
            rate_limit: RateLimitHandler::from_config(&config.rate_limit),
            dedup: DedupCache::new(config.dedup.ttl()),
            refresh,
        }))
    }
}

impl Transport {
    pub fn builder(config: TransportConfig) -> TransportBuilder {
        TransportBuilder::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupConfig;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TransportConfig {
            dedup: DedupConfig {
                ttl_ms: 0,
                ..DedupConfig::default()
            },
            ..TransportConfig::default()
        };
        let result = TransportBuilder::new(config).build();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_defaults_build() {
        let mut config = TransportConfig::default();
        config.client.base_url = "https://inventory.example.com/api/".into();

        let transport = Transport::builder(config).build().unwrap();
        let login = url::Url::parse("https://inventory.example.com/api/auth/login").unwrap();
        let refresh = url::Url::parse("https://inventory.example.com/api/auth/refresh").unwrap();
        let orders = url::Url::parse("https://inventory.example.com/api/orders").unwrap();

        assert!(transport.refresh_coordinator().is_excluded(&login));
        assert!(transport.refresh_coordinator().is_excluded(&refresh));
        assert!(!transport.refresh_coordinator().is_excluded(&orders));
        assert!(transport.dedup_cache().is_empty());
    }
}
