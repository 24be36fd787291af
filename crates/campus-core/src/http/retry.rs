//! Retry policy with exponential backoff
//!
//! Only transient failures are retried: an attempt that got no response at
//! all, or a `429 Too Many Requests`. Everything else is terminal. Each call
//! owns a fresh [`RetryHandler`], so budgets never leak between calls.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::http::context::{CallContext, CallFailure};

/// Status the server uses to signal rate limiting
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Whether non-idempotent calls may be retried after a network failure.
///
/// A POST whose response was lost may already have been applied, so
/// repeating it can duplicate the side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationRetry {
    /// Retry every verb after a network failure, logging a warning for
    /// non-idempotent ones
    #[default]
    Always,
    /// Retry network failures only for idempotent verbs
    IdempotentOnly,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries beyond the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Randomize delays. Consecutive delays are then no longer guaranteed to
    /// increase.
    pub jitter: bool,
    /// Handling of non-idempotent verbs after network failures
    pub mutation_retry: MutationRetry,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
            mutation_retry: MutationRetry::Always,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with a custom retry budget
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// A policy that never retries
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    ///
    /// Delays that would exceed it are clamped, so a cap below the last
    /// scheduled delay makes consecutive delays plateau.
    /// [`crate::ClientConfig::validate`] rejects that when jitter is off.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Choose how mutations are treated after network failures
    pub fn with_mutation_retry(mut self, mutation_retry: MutationRetry) -> Self {
        self.mutation_retry = mutation_retry;
        self
    }

    /// Delay before the final retry, before any clamping or jitter
    pub fn last_delay(&self) -> Duration {
        if self.max_retries == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(self.max_retries - 1).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .unwrap_or(Duration::MAX)
    }

    /// Create an exponential backoff instance
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let randomization = if self.jitter { 0.5 } else { 0.0 };
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(randomization)
            // The attempt budget bounds retries, not wall-clock time
            .with_max_elapsed_time(None)
            .build()
    }

    /// Whether `failure` of `context` may be retried at all
    pub fn is_eligible(&self, context: &CallContext, failure: &CallFailure) -> bool {
        match failure {
            CallFailure::Status { status, .. } => *status == TOO_MANY_REQUESTS,
            CallFailure::NoResponse { .. } => {
                context.is_idempotent() || self.mutation_retry == MutationRetry::Always
            }
            CallFailure::Unsendable { .. } => false,
        }
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Per-call retry state
#[derive(Debug)]
pub struct RetryHandler {
    policy: RetryPolicy,
    retries: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    /// Create a new retry handler with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            retries: 0,
            backoff,
        }
    }

    /// Decide whether the failed attempt described by `context` is retried
    pub fn should_retry(&mut self, context: &CallContext, failure: &CallFailure) -> RetryDecision {
        if self.retries >= self.policy.max_retries {
            return RetryDecision::NoRetry;
        }

        if !self.policy.is_eligible(context, failure) {
            return RetryDecision::NoRetry;
        }

        if failure.is_no_response() && !context.is_idempotent() {
            tracing::warn!(
                method = %context.method,
                path = %context.path,
                trace_id = %context.trace_id,
                "retrying a non-idempotent request after a network failure; \
                 the server may already have applied it"
            );
        }

        self.retries += 1;
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.policy.max_delay);

        RetryDecision::Retry { delay }
    }

    /// Number of retries granted so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
