//! Retry policy for the fetch client
//!
//! The policy is a plain value: it owns the attempt cap, the delay schedule and
//! the retryable-status predicate, and answers "retry or give up" without
//! touching the network.

use crate::config::FetchConfig;
use std::time::Duration;

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Connection-level failure: refused, reset, timeout, truncated body
    Network(String),
    /// The origin answered with a non-2xx status
    Status(u16),
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again
    RetryAfter(Duration),
    /// Stop and surface the failure
    GiveUp,
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        retryable_statuses: Vec<u16>,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            retryable_statuses,
        }
    }

    /// Builds the policy described by the `[fetch]` configuration section
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
            config.retry_statuses.clone(),
        )
    }

    /// A policy that never retries
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, Vec::new())
    }

    /// Replaces the retry cap, keeping the schedule
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total attempts allowed, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based): `min(base * 2^retry, max)`
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use sumi_mirror::mirror::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(3), vec![]);
    /// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    /// assert_eq!(policy.delay_for(2), Duration::from_secs(3));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Decides whether to retry after `attempts_made` attempts ended in `failure`
    ///
    /// Network failures are always retryable; statuses only when listed.
    pub fn decide(&self, attempts_made: u32, failure: &AttemptFailure) -> RetryDecision {
        let retryable = match failure {
            AttemptFailure::Network(_) => true,
            AttemptFailure::Status(status) => self.is_retryable_status(*status),
        };

        if !retryable || attempts_made >= self.max_attempts() {
            return RetryDecision::GiveUp;
        }

        RetryDecision::RetryAfter(self.delay_for(attempts_made.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}
