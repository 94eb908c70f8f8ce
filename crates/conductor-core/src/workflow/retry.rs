//! Retry policy for failing steps.
//!
//! Retries are explicit and structured: the engine consults `RetryHandler`
//! after each failed attempt and bumps the context's `retry_count` itself for
//! every re-attempt it makes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of attempts when a policy is built with `Default`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How often, and how patiently, a failing step is re-attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Pause between attempts, in milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
    /// Whether a timed-out attempt may be retried.
    #[serde(default = "default_retry_timeouts")]
    pub retry_timeouts: bool,
}

fn default_retry_timeouts() -> bool {
    true
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` total attempts, with no backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_ms: 0,
            retry_timeouts: true,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn retry_timeouts(mut self, retry: bool) -> Self {
        self.retry_timeouts = retry;
        self
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Stateless retry decisions.
pub struct RetryHandler;

impl RetryHandler {
    /// Whether another attempt should be made.
    ///
    /// `attempt` is 1-based (the first execution is attempt 1). Without a
    /// policy a step gets exactly one attempt.
    pub fn should_retry(policy: Option<&RetryPolicy>, attempt: u32, timed_out: bool) -> bool {
        match policy {
            Some(policy) => {
                if timed_out && !policy.retry_timeouts {
                    return false;
                }
                attempt < policy.max_attempts.max(1)
            }
            None => false,
        }
    }
}
