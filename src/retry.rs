//! Bounded retry with fixed delay for creation attempts

use std::time::Duration;

use tracing::debug;

use crate::errors::{PoolError, PoolResult};

/// Wraps a fallible async operation with a bounded number of attempts and a
/// constant delay between them (the delay is fixed, not exponential).
///
/// The error of the final attempt propagates unchanged. A
/// [`CircuitOpen`](PoolError::CircuitOpen) result is a refusal rather than a
/// failed attempt and is surfaced immediately without retrying; the breaker
/// check itself is the caller's responsibility, performed inside the wrapped
/// operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `operation`, retrying failures up to the attempt budget.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> PoolResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PoolResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(PoolError::CircuitOpen) => return Err(PoolError::CircuitOpen),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    debug!(attempt, max_attempts = self.max_attempts, %err, "attempt failed; retrying after fixed delay");
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
