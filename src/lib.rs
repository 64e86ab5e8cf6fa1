//! # exchange_pool
//!
//! Tiered pool of pre-created exchange records: deliver a prepared record
//! instantly instead of paying the latency of creating one on demand.
//!
//! ## Features
//!
//! - Per-tier FIFO queues persisted as a single JSON document
//! - Atomic snapshot writes (temp file + rename), crash-safe
//! - Cross-process locking around every read-modify-write
//! - Background replenishment with per-tier single-flight batches
//! - Bounded concurrency against the slow, metered creation dependency
//! - Bounded retries with fixed delay
//! - Global circuit breaker across all tiers
//! - Manual record import and administrative full reconcile
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use exchange_pool::{PoolConfiguration, PoolManager, TierConfig};
//! # use exchange_pool::{ExchangeCreator, PoolResult, ExchangeRecord};
//! # struct MyCreator;
//! # #[async_trait::async_trait]
//! # impl ExchangeCreator for MyCreator {
//! #     async fn create(&self, amount: u32) -> PoolResult<ExchangeRecord> { unimplemented!() }
//! # }
//!
//! # #[tokio::main] async fn main() -> PoolResult<()> {
//! let config = PoolConfiguration::new(
//!     vec![TierConfig::new(19, 3, 1), TierConfig::new(29, 5, 2)],
//!     "/var/lib/exchange-pool/pool.json",
//!     "/var/lib/exchange-pool/pool.lock",
//! );
//! let pool = PoolManager::new(config, Arc::new(MyCreator));
//!
//! let delivered = pool.consume(19).await?;
//! println!("exchange ready at {}", delivered.record.url);
//! # Ok(())
//! # }
//! ```

mod circuit_breaker;
mod config;
mod creator;
mod errors;
mod limiter;
mod mutex;
mod pool;
mod record;
mod retry;
mod scheduler;
mod store;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use config::{PoolConfiguration, TierConfig};
pub use creator::ExchangeCreator;
pub use errors::{PoolError, PoolResult};
pub use limiter::ConcurrencyLimiter;
pub use mutex::{DistributedMutex, FileMutex};
pub use pool::{
    ConsumedRecord, DeliveryStatus, ImportEntry, ImportError, ImportSummary, PoolManager,
    PoolStatus, TierHealth, TierStatus,
};
pub use record::{ExchangeRecord, PoolState, parse_exchange_id};
pub use retry::RetryPolicy;
pub use scheduler::{ReconcileReport, ReplenishmentScheduler};
pub use store::PersistentStore;
