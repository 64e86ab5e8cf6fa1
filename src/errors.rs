//! Error types for the exchange pool

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("tier {0} is not configured")]
    InvalidTier(u32),

    #[error("could not acquire the pool lock within {0:?}")]
    LockTimeout(Duration),

    #[error("exchange creation failed: {0}")]
    Creation(String),

    #[error("circuit breaker is open - creation attempts suspended")]
    CircuitOpen,

    #[error("failed to persist pool state: {0}")]
    Persistence(String),

    #[error("a replenishment batch is already in flight")]
    AlreadyReplenishing,

    #[error("task was cancelled before completing")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;
