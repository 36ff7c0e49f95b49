//! Retry timing and concurrency limits for provider API calls.
//!
//! Provides:
//! - Exponential backoff for rate-limited attempts, fixed delay for others
//! - A counting-semaphore governor bounding in-flight calls

mod governor;

pub use governor::{Governor, GovernorError, GovernorPermit, DEFAULT_PARALLEL, MAX_PARALLEL};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base of the exponential backoff applied to rate-limited attempts.
pub const DEFAULT_RATE_LIMIT_BASE_MS: u64 = 1_000;

/// Delay before retrying any other failure.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Calculate exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

/// Check whether a provider error message describes rate limiting.
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
        || lower.contains("quota")
        || lower.contains("too many requests")
        || lower.contains("429")
}

/// Bounded retry policy for a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Backoff base for rate-limited attempts, in milliseconds.
    pub rate_limit_base_ms: u64,
    /// Delay before retrying other failures, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit_base_ms: DEFAULT_RATE_LIMIT_BASE_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Policy that retries immediately. Used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            rate_limit_base_ms: 0,
            retry_delay_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32, rate_limited: bool) -> Duration {
        if rate_limited {
            backoff_delay(retry, self.rate_limit_base_ms)
        } else {
            Duration::from_millis(self.retry_delay_ms)
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1, 1000), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 1000), Duration::from_secs(4));
        assert_eq!(backoff_delay(30, 1000), Duration::from_secs(60));
    }

    #[test]
    fn test_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, true), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, true), Duration::from_secs(4));
        assert_eq!(policy.delay_for(1, false), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, false), Duration::from_secs(2));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(4);
        assert_eq!(policy.delay_for(3, true), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn test_rate_limit_messages() {
        assert!(is_rate_limit_message("429 Too Many Requests"));
        assert!(is_rate_limit_message("RESOURCE_EXHAUSTED: quota exceeded"));
        assert!(is_rate_limit_message("Rate limit reached for gpt-4o"));
        assert!(!is_rate_limit_message("invalid image payload"));
    }
}
