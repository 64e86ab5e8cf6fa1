//! Bounded-concurrency execution of creation batches

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::errors::{PoolError, PoolResult};

/// Runs a batch of independent tasks with at most `limit` in flight.
///
/// As soon as any task finishes, the next queued one takes its permit; a slow
/// or stuck task only occupies its own slot. Every task's outcome is reported
/// individually, in submission order.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Execute `tasks` and collect each outcome.
    pub async fn run<T, F>(&self, tasks: Vec<F>) -> Vec<PoolResult<T>>
    where
        F: Future<Output = PoolResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Err(PoolError::Cancelled)),
                };
                let outcome = task.await;
                drop(permit);
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<PoolResult<T>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => warn!(%err, "batch task aborted before reporting"),
            }
        }

        outcomes
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(PoolError::Cancelled)))
            .collect()
    }
}
