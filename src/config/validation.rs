//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field rules.
//! Every problem is reported, not just the first.

use thiserror::Error;

use crate::config::schema::TransportConfig;

/// A single semantic problem in the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &TransportConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.client.base_url) {
        Ok(url) if url.cannot_be_a_base() => {
            errors.push(ValidationError::new("client.base_url", "must be a base URL"));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "client.base_url",
            format!("invalid URL '{}': {}", config.client.base_url, e),
        )),
    }

    if config.client.timeout_ms == 0 {
        errors.push(ValidationError::new("client.timeout_ms", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be smaller than base_delay_ms",
        ));
    }
    for status in &config.retries.retryable_statuses {
        match status {
            401 | 429 => errors.push(ValidationError::new(
                "retries.retryable_statuses",
                format!("{} is handled by its own recovery path", status),
            )),
            100..=599 => {}
            _ => errors.push(ValidationError::new(
                "retries.retryable_statuses",
                format!("{} is not an HTTP status code", status),
            )),
        }
    }

    if config.dedup.ttl_ms == 0 {
        errors.push(ValidationError::new("dedup.ttl_ms", "must be greater than 0"));
    }

    if config.rate_limit.max_wait_secs < config.rate_limit.default_retry_after_secs {
        errors.push(ValidationError::new(
            "rate_limit.max_wait_secs",
            "must not be smaller than default_retry_after_secs",
        ));
    }

    if !config.auth.refresh_path.starts_with('/') {
        errors.push(ValidationError::new("auth.refresh_path", "must start with '/'"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
