//! Retry logic with exponential backoff.
//!
//! Two flavours are provided:
//! - [`with_retry`] drives a read-only operation with the `backon` crate.
//! - [`with_retry_cancellable`] runs a hand-rolled loop that races every attempt and every
//!   backoff sleep against a [`CancellationToken`]. The registry writer uses it for the
//!   index update so a disconnected session stops retrying immediately.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{
    config::RetryPolicy,
    error::{Result, SdkError},
};

/// Execute an async operation with retry using exponential backoff.
///
/// The operation is retried according to the provided [`RetryPolicy`] if it fails
/// with a retryable error (as determined by [`SdkError::is_retryable`]). Non-retryable
/// errors are returned immediately. When attempts run out on a retryable error, the
/// result is [`SdkError::RetryExhausted`].
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, method: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    // backon's max_times counts retries, not total attempts.
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let mut backoff = ExponentialBuilder::new()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);
    if policy.jitter > 0.0 {
        backoff = backoff.with_jitter();
    }

    let attempt_count = std::sync::atomic::AtomicU32::new(0);

    operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(|e: &SdkError| e.is_retryable())
        .notify(|err: &SdkError, dur: Duration| {
            let attempt = attempt_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            tracing::debug!(
                method,
                attempt,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying after backoff"
            );
        })
        .await
        .map_err(|e| {
            if e.is_retryable() {
                let attempts = attempt_count.load(std::sync::atomic::Ordering::SeqCst) + 1;
                SdkError::RetryExhausted { attempts, last_error: e.to_string() }
            } else {
                e
            }
        })
}

/// Execute an async operation with retry and cancellation support.
///
/// Behaves like [`with_retry`], but races each attempt and each backoff sleep against
/// `token`. A cancelled token yields [`SdkError::Cancelled`] without further attempts.
pub async fn with_retry_cancellable<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    method: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_cancellable_with(policy, token, method, operation, |attempts, err| {
        SdkError::RetryExhausted { attempts, last_error: err.to_string() }
    })
    .await
}

/// Like [`with_retry_cancellable`], with a caller-supplied mapping of the last
/// retryable error once attempts are exhausted.
pub(crate) async fn retry_cancellable_with<F, Fut, T, E>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    method: &str,
    mut operation: F,
    on_exhausted: E,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    E: FnOnce(u32, SdkError) -> SdkError,
{
    if token.is_cancelled() {
        return Err(SdkError::Cancelled);
    }

    let mut attempt: u32 = 0;
    let mut backoff_duration = policy.initial_backoff;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            () = token.cancelled() => return Err(SdkError::Cancelled),
            result = operation() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= policy.max_attempts {
            return Err(on_exhausted(attempt, err));
        }

        let jittered = apply_jitter(backoff_duration, policy.jitter);
        tracing::debug!(
            method,
            attempt,
            backoff_ms = jittered.as_millis() as u64,
            error = %err,
            "retrying after backoff (cancellable)"
        );

        tokio::select! {
            biased;
            () = token.cancelled() => return Err(SdkError::Cancelled),
            () = tokio::time::sleep(jittered) => {}
        }

        backoff_duration = std::cmp::min(
            Duration::from_nanos((backoff_duration.as_nanos() as f64 * policy.multiplier) as u64),
            policy.max_backoff,
        );
    }
}

/// Apply jitter to a duration.
///
/// Jitter adds randomness in the range `[dur * (1 - factor), dur * (1 + factor)]`
/// so that competing writers do not retry in lockstep.
fn apply_jitter(dur: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return dur;
    }

    let factor = factor.clamp(0.0, 1.0);
    let base_nanos = dur.as_nanos() as f64;
    let min_nanos = base_nanos * (1.0 - factor);
    let max_nanos = base_nanos * (1.0 + factor);

    let jittered_nanos = rand::rng().random_range(min_nanos..=max_nanos);
    Duration::from_nanos(jittered_nanos as u64)
}
