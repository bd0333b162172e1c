// Attempt-ceiling retry shared by variant resolution and playlist fetching.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, counting the first one.
    pub max_attempts: u32,
    /// Fixed pause between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Retry straight away, with no pause between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed and may be attempted again.
    Retry(E),
    /// Operation failed and must not be attempted again.
    Fail(E),
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("{0}")]
    Fatal(E),
}

/// Run `operation` until it succeeds, fails fatally, or the attempt ceiling is
/// reached.
///
/// The closure receives the 0-indexed attempt number. Cancellation is checked
/// before every attempt and interrupts the pause between attempts.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(RetryError::Fatal(err)),
            RetryAction::Retry(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = policy.delay;
                warn!(
                    attempt,
                    max = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after error"
                );
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
