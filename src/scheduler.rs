//! Per-tier single-flight replenishment and full reconciliation

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::PoolConfiguration;
use crate::creator::ExchangeCreator;
use crate::errors::{PoolError, PoolResult};
use crate::limiter::ConcurrencyLimiter;
use crate::mutex::DistributedMutex;
use crate::record::ExchangeRecord;
use crate::retry::RetryPolicy;
use crate::store::PersistentStore;

/// Counts from an administrative full reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records created and appended across all tiers.
    pub created: usize,

    /// Creation tasks that produced no record.
    pub failed: usize,
}

/// Orchestrates deficit-filling creation batches.
///
/// Each tier is single-flighted through an in-memory flag; the flag is
/// process-local and cleared unconditionally when a batch ends, so a tier can
/// never stay wedged open. Creation tasks compose the circuit breaker, the
/// retry policy, and the concurrency limiter.
pub struct ReplenishmentScheduler {
    config: Arc<PoolConfiguration>,
    store: PersistentStore,
    mutex: Arc<dyn DistributedMutex>,
    creator: Arc<dyn ExchangeCreator>,
    breaker: Arc<CircuitBreaker>,
    limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
    in_flight: DashSet<u32>,
}

impl ReplenishmentScheduler {
    pub fn new(
        config: Arc<PoolConfiguration>,
        store: PersistentStore,
        mutex: Arc<dyn DistributedMutex>,
        creator: Arc<dyn ExchangeCreator>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_creations);
        let retry = RetryPolicy::new(config.retry_max_attempts, config.retry_delay);
        Self {
            config,
            store,
            mutex,
            creator,
            breaker,
            limiter,
            retry,
            in_flight: DashSet::new(),
        }
    }

    /// Whether a replenishment batch for this tier is currently running.
    pub fn is_replenishing(&self, amount: u32) -> bool {
        self.in_flight.contains(&amount)
    }

    /// Fill the tier back up to its target. Returns the number of records
    /// appended; a batch already in flight for the tier returns 0 immediately.
    pub async fn replenish(&self, amount: u32) -> PoolResult<usize> {
        if self.config.tier(amount).is_none() {
            return Err(PoolError::InvalidTier(amount));
        }
        if !self.in_flight.insert(amount) {
            debug!(tier = amount, "replenishment already in flight; skipping");
            return Ok(0);
        }

        let result = self.fill_deficit(amount).await;
        self.in_flight.remove(&amount);
        result
    }

    /// Additive full reconcile across every configured tier.
    ///
    /// Refuses to start while any tier's batch is in flight. Resets the
    /// circuit breaker, then runs one combined creation batch through the
    /// same bounded-concurrency machinery as per-tier replenishment.
    /// Oversized tiers are left alone.
    pub async fn reconcile_all(&self) -> PoolResult<ReconcileReport> {
        let amounts = self.config.tier_amounts();
        for (claimed, amount) in amounts.iter().enumerate() {
            if !self.in_flight.insert(*amount) {
                for earlier in &amounts[..claimed] {
                    self.in_flight.remove(earlier);
                }
                return Err(PoolError::AlreadyReplenishing);
            }
        }

        let result = self.run_reconcile().await;
        for amount in &amounts {
            self.in_flight.remove(amount);
        }
        result
    }

    async fn fill_deficit(&self, amount: u32) -> PoolResult<usize> {
        // Reload fresh: consumers may have changed the pool since the trigger.
        let state = self.store.load();
        let target = self.config.tier(amount).map_or(0, |tier| tier.target);
        let deficit = target.saturating_sub(state.queue_len(amount));
        if deficit == 0 {
            debug!(tier = amount, "tier already at target; nothing to replenish");
            return Ok(0);
        }

        info!(
            tier = amount,
            deficit,
            limit = self.limiter.limit(),
            "starting replenishment batch"
        );

        let tasks: Vec<_> = (0..deficit).map(|_| self.creation_task(amount)).collect();
        let outcomes = self.limiter.run(tasks).await;

        let mut created = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => created.push(record),
                Err(err) => warn!(tier = amount, %err, "replenishment task produced no record"),
            }
        }

        if created.is_empty() {
            info!(tier = amount, "replenishment batch produced no records");
            return Ok(0);
        }

        let added = self.merge_records(created).await?;
        info!(tier = amount, added, "replenishment batch merged");
        Ok(added)
    }

    async fn run_reconcile(&self) -> PoolResult<ReconcileReport> {
        self.breaker.reset();

        let state = self.store.load();
        let mut tasks = Vec::new();
        for tier in &self.config.tiers {
            let deficit = tier.target.saturating_sub(state.queue_len(tier.amount));
            for _ in 0..deficit {
                tasks.push(self.creation_task(tier.amount));
            }
        }

        if tasks.is_empty() {
            info!("all tiers at target; reconcile is a no-op");
            return Ok(ReconcileReport {
                created: 0,
                failed: 0,
            });
        }

        info!(total_tasks = tasks.len(), "starting full reconcile batch");
        let outcomes = self.limiter.run(tasks).await;

        let mut created = Vec::new();
        let mut failed = 0;
        for outcome in outcomes {
            match outcome {
                Ok(record) => created.push(record),
                Err(err) => {
                    failed += 1;
                    warn!(%err, "reconcile task produced no record");
                }
            }
        }

        let appended = if created.is_empty() {
            0
        } else {
            self.merge_records(created).await?
        };

        info!(created = appended, failed, "full reconcile finished");
        Ok(ReconcileReport {
            created: appended,
            failed,
        })
    }

    /// One independent creation task: every attempt is gated on the breaker,
    /// failures feed the breaker, and the whole call is wrapped in the retry
    /// policy. Returns an owned future so batches can be spawned.
    fn creation_task(
        &self,
        amount: u32,
    ) -> impl Future<Output = PoolResult<ExchangeRecord>> + Send + 'static {
        let creator = Arc::clone(&self.creator);
        let breaker = Arc::clone(&self.breaker);
        let retry = self.retry;

        async move {
            retry
                .run(|| {
                    let creator = Arc::clone(&creator);
                    let breaker = Arc::clone(&breaker);
                    async move {
                        if !breaker.allow_request() {
                            return Err(PoolError::CircuitOpen);
                        }
                        match creator.create(amount).await {
                            Ok(record) => {
                                breaker.record_success();
                                Ok(record)
                            }
                            Err(err) => {
                                breaker.record_failure();
                                Err(err)
                            }
                        }
                    }
                })
                .await
        }
    }

    /// Merge created records into the store under the mutex, reloading once
    /// more so interleaved consumer changes are preserved.
    async fn merge_records(&self, records: Vec<ExchangeRecord>) -> PoolResult<usize> {
        let added = records.len();
        self.mutex.acquire(self.config.lock_timeout).await?;

        let saved = {
            let mut state = self.store.load();
            for record in records {
                state.append(record);
            }
            self.store.save(&state)
        };

        let released = self.mutex.release().await;
        saved?;
        released?;
        Ok(added)
    }
}
