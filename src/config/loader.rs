//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::TransportConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::error::TransportError;

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("HTTP client error: {0}")]
    Client(#[from] TransportError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub const ENV_BASE_URL: &str = "TRANSPORT_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "TRANSPORT_TIMEOUT_MS";
pub const ENV_MAX_RETRY_ATTEMPTS: &str = "TRANSPORT_MAX_RETRY_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "TRANSPORT_RETRY_BASE_DELAY_MS";
pub const ENV_DEDUP_TTL_MS: &str = "TRANSPORT_DEDUP_TTL_MS";
pub const ENV_RETRYABLE_STATUSES: &str = "TRANSPORT_RETRYABLE_STATUSES";

/// Load a TOML file, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<TransportConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: TransportConfig = toml::from_str(&content)?;

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn from_env() -> Result<TransportConfig, ConfigError> {
    let mut config = TransportConfig::default();

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `TRANSPORT_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut TransportConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_BASE_URL) {
        config.client.base_url = url;
    }
    if let Some(v) = lookup(ENV_TIMEOUT_MS) {
        config.client.timeout_ms = parse_number(ENV_TIMEOUT_MS, &v)?;
    }
    if let Some(v) = lookup(ENV_MAX_RETRY_ATTEMPTS) {
        config.retries.max_attempts = parse_number(ENV_MAX_RETRY_ATTEMPTS, &v)?;
    }
    if let Some(v) = lookup(ENV_RETRY_BASE_DELAY_MS) {
        config.retries.base_delay_ms = parse_number(ENV_RETRY_BASE_DELAY_MS, &v)?;
    }
    if let Some(v) = lookup(ENV_DEDUP_TTL_MS) {
        config.dedup.ttl_ms = parse_number(ENV_DEDUP_TTL_MS, &v)?;
    }
    if let Some(v) = lookup(ENV_RETRYABLE_STATUSES) {
        config.retries.retryable_statuses = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_number(ENV_RETRYABLE_STATUSES, s))
            .collect::<Result<_, _>>()?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (ENV_BASE_URL, "https://api.example.com/v1/"),
            (ENV_TIMEOUT_MS, "1500"),
            (ENV_MAX_RETRY_ATTEMPTS, "5"),
            (ENV_RETRYABLE_STATUSES, "500, 503"),
        ]);
        let mut config = TransportConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.client.base_url, "https://api.example.com/v1/");
        assert_eq!(config.client.timeout_ms, 1500);
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.retries.retryable_statuses, vec![500, 503]);
        assert_eq!(config.dedup.ttl_ms, 5_000);
    }

    #[test]
    fn test_bad_env_value() {
        let vars = env(&[(ENV_DEDUP_TTL_MS, "soon")]);
        let mut config = TransportConfig::default();
        let err = apply_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();

        assert!(matches!(err, ConfigError::Env { var: ENV_DEDUP_TTL_MS, .. }));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TransportConfig = toml::from_str(
            r#"
            [client]
            base_url = "https://inventory.example.com/api/"

            [retries]
            max_attempts = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.client.base_url, "https://inventory.example.com/api/");
        assert_eq!(config.client.timeout_ms, 30_000);
        assert_eq!(config.retries.max_attempts, 4);
        assert_eq!(config.retries.retryable_statuses, vec![408, 500, 502, 503, 504]);
        assert_eq!(config.rate_limit.default_retry_after_secs, 5);
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("transport-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[dedup]\nttl_ms = 0\n").unwrap();

        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap_or_default();

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
