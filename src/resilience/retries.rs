//! Retry engine.
//!
//! # Responsibilities
//! - Classify a failed attempt as retryable or terminal
//! - Track attempts per logical request against the budget
//! - Compute the backoff delay for the next attempt
//!
//! # Design Decisions
//! - `max_attempts` counts network sends, original included
//! - No response (network failure, timeout) is always retryable
//! - 401 and 429 never reach this module; they have their own recovery paths

use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::{calculate_backoff, calculate_backoff_with_jitter};

/// What went wrong with an attempt, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Network failure or timeout.
    NoResponse,
    /// A response arrived with this status.
    Status(u16),
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Shared retry settings, built once from config.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter: bool,
    retryable_statuses: BTreeSet<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
            retryable_statuses: config.retryable_statuses.iter().copied().collect(),
        }
    }

    /// Fresh state for one logical request.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn is_retryable(&self, failure: Failure) -> bool {
        match failure {
            Failure::NoResponse => true,
            Failure::Status(status) => self.retryable_statuses.contains(&status),
        }
    }

    /// Decide whether to reissue, advancing `state` when it does.
    pub fn should_retry(&self, failure: Failure, state: &mut RetryState) -> RetryDecision {
        if !self.is_retryable(failure) || state.exhausted() {
            return RetryDecision::stop();
        }

        state.attempt += 1;
        let delay = if self.jitter {
            calculate_backoff_with_jitter(state.attempt, self.base_delay_ms, self.max_delay_ms)
        } else {
            calculate_backoff(state.attempt, self.base_delay_ms, self.max_delay_ms)
        };

        RetryDecision { retry: true, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Per-request retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries taken so far.
    pub attempt: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryState {
    /// True once the next send would exceed `max_attempts`.
    pub fn exhausted(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    /// Network sends made so far, assuming the current one has gone out.
    pub fn sends(&self) -> u32 {
        self.attempt + 1
    }
}
