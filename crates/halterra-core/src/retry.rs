//! Bounded exponential-backoff retry for one-shot upstream calls.
//!
//! Streaming calls are never retried: once deltas have been forwarded to a
//! client there is nothing sensible to replay.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::ports::UpstreamError;

/// Decides whether a failed attempt is worth repeating.
pub type RetryClassifier = fn(&UpstreamError) -> bool;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each one after.
    pub base_delay: Duration,
    pub classifier: RetryClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }
}

impl RetryPolicy {
    /// Policy using [`UpstreamError::is_transient`] as the classifier.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            classifier: UpstreamError::is_transient,
        }
    }

    #[must_use]
    pub const fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is 1-indexed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns `true` when the full duration elapsed.
pub async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Run `operation` under `policy`, retrying transient failures.
///
/// Each attempt calls `operation` afresh. A non-retryable failure, the last
/// attempt's failure, or cancellation during a backoff wait ends the loop
/// with the most recent error.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retryable = (policy.classifier)(&err);
        if !retryable || attempt >= max_attempts {
            error!(
                attempt,
                max_attempts,
                retryable,
                error = %err,
                "Upstream call failed"
            );
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "Transient upstream failure, retrying"
        );

        if !sleep_cancellable(delay, cancel).await {
            warn!(attempt, "Retry abandoned on shutdown");
            return Err(err);
        }
        attempt += 1;
    }
}
