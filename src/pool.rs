//! Public pool surface: consume, status, reconcile, import

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::PoolConfiguration;
use crate::creator::ExchangeCreator;
use crate::errors::{PoolError, PoolResult};
use crate::mutex::{DistributedMutex, FileMutex};
use crate::record::{ExchangeRecord, parse_exchange_id};
use crate::scheduler::{ReconcileReport, ReplenishmentScheduler};
use crate::store::PersistentStore;

/// How a consumed record was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Popped from the pre-created pool.
    Instant,

    /// Created synchronously because the tier's queue was empty.
    OnDemand,
}

/// Result of a successful consume call.
#[derive(Debug, Clone)]
pub struct ConsumedRecord {
    pub record: ExchangeRecord,
    pub status: DeliveryStatus,
}

/// Health classification of a tier's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierHealth {
    Empty,
    Low,
    Healthy,
}

/// Per-tier snapshot reported by [`PoolManager::pool_status`].
#[derive(Debug, Clone)]
pub struct TierStatus {
    pub size: usize,
    pub target: usize,
    pub min_size: usize,
    pub status: TierHealth,
}

/// Full pool snapshot for reporting.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub tiers: BTreeMap<u32, TierStatus>,
    pub replenishing: BTreeMap<u32, bool>,
}

/// One entry for the manual import path.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub url: String,
    pub amount: u32,
}

/// A rejected import entry with the reason it was skipped.
#[derive(Debug, Clone)]
pub struct ImportError {
    pub url: String,
    pub reason: String,
}

/// Outcome of an import batch.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub added: usize,
    pub errors: Vec<ImportError>,
}

/// The pool manager: per-tier FIFO queues of pre-created exchange records
/// with safe concurrent consumption and background replenishment.
///
/// All mutable coordination state (circuit breaker, replenishment flags) is
/// owned by this handle rather than process-wide globals, so independent
/// instances stay isolated and tests can build as many as they need. The
/// persisted document is the only state shared across processes; the mutex
/// serializes every read-modify-write against it.
pub struct PoolManager {
    config: Arc<PoolConfiguration>,
    store: PersistentStore,
    mutex: Arc<dyn DistributedMutex>,
    creator: Arc<dyn ExchangeCreator>,
    breaker: Arc<CircuitBreaker>,
    scheduler: Arc<ReplenishmentScheduler>,
}

impl PoolManager {
    /// Create a manager with the default lock-file mutex.
    pub fn new(config: PoolConfiguration, creator: Arc<dyn ExchangeCreator>) -> Self {
        let mutex: Arc<dyn DistributedMutex> = Arc::new(FileMutex::new(
            config.lock_path.clone(),
            config.lock_poll_interval,
        ));
        Self::with_mutex(config, creator, mutex)
    }

    /// Create a manager with an injected mutual-exclusion implementation.
    pub fn with_mutex(
        config: PoolConfiguration,
        creator: Arc<dyn ExchangeCreator>,
        mutex: Arc<dyn DistributedMutex>,
    ) -> Self {
        let config = Arc::new(config);
        let store = PersistentStore::new(&config.store_path, &config.tiers);
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker_threshold));
        let scheduler = Arc::new(ReplenishmentScheduler::new(
            Arc::clone(&config),
            store.clone(),
            Arc::clone(&mutex),
            Arc::clone(&creator),
            Arc::clone(&breaker),
        ));

        Self {
            config,
            store,
            mutex,
            creator,
            breaker,
            scheduler,
        }
    }

    /// Deliver a record for the tier: pop the oldest pre-created one, or fall
    /// back to synchronous on-demand creation when the queue is empty.
    ///
    /// The external creation call never runs while the lock is held. After a
    /// successful delivery that leaves the tier under target, a background
    /// replenishment is signalled off the critical path.
    pub async fn consume(&self, amount: u32) -> PoolResult<ConsumedRecord> {
        let tier = self
            .config
            .tier(amount)
            .ok_or(PoolError::InvalidTier(amount))?;
        let target = tier.target;

        self.mutex.acquire(self.config.lock_timeout).await?;
        let popped = self.pop_under_lock(amount);
        let released = self.mutex.release().await;
        let popped = popped?;
        released?;

        match popped {
            Some((record, remaining)) => {
                info!(tier = amount, id = %record.id, remaining, "delivered pre-created record");
                if remaining < target {
                    self.signal_replenish(amount);
                }
                Ok(ConsumedRecord {
                    record,
                    status: DeliveryStatus::Instant,
                })
            }
            None => {
                info!(tier = amount, "tier empty; creating on demand");
                let record = self.creator.create(amount).await?;
                info!(tier = amount, id = %record.id, "delivered on-demand record");
                if target > 0 {
                    self.signal_replenish(amount);
                }
                Ok(ConsumedRecord {
                    record,
                    status: DeliveryStatus::OnDemand,
                })
            }
        }
    }

    /// Trigger a replenishment batch for one tier and wait for it.
    pub async fn replenish(&self, amount: u32) -> PoolResult<usize> {
        self.scheduler.replenish(amount).await
    }

    /// Reload the document and report each tier's size, thresholds, and
    /// health, plus which tiers have a replenishment batch in flight.
    pub fn pool_status(&self) -> PoolStatus {
        let state = self.store.load();
        let mut tiers = BTreeMap::new();
        let mut replenishing = BTreeMap::new();

        for tier in &self.config.tiers {
            let size = state.queue_len(tier.amount);
            let status = if size == 0 {
                TierHealth::Empty
            } else if size < tier.min_size {
                TierHealth::Low
            } else {
                TierHealth::Healthy
            };
            tiers.insert(
                tier.amount,
                TierStatus {
                    size,
                    target: tier.target,
                    min_size: tier.min_size,
                    status,
                },
            );
            replenishing.insert(tier.amount, self.scheduler.is_replenishing(tier.amount));
        }

        PoolStatus {
            tiers,
            replenishing,
        }
    }

    /// Administrative full reconcile: fill every tier's deficit in one
    /// combined batch. Strictly additive; refuses while any per-tier batch is
    /// in flight.
    pub async fn reconcile_all(&self) -> PoolResult<ReconcileReport> {
        self.scheduler.reconcile_all().await
    }

    /// Append externally prepared records directly, bypassing the creator.
    ///
    /// Each entry is validated on its own (configured tier, parseable id in
    /// the URL, no duplicate id or url in the target tier); bad entries are
    /// reported without aborting the batch.
    pub async fn import_records(&self, entries: Vec<ImportEntry>) -> PoolResult<ImportSummary> {
        self.mutex.acquire(self.config.lock_timeout).await?;
        let summary = self.import_under_lock(entries);
        let released = self.mutex.release().await;
        let summary = summary?;
        released?;

        info!(
            added = summary.added,
            rejected = summary.errors.len(),
            "import batch finished"
        );
        Ok(summary)
    }

    /// Access to the creation circuit breaker, for administrative resets.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn pop_under_lock(&self, amount: u32) -> PoolResult<Option<(ExchangeRecord, usize)>> {
        let mut state = self.store.load();
        match state.pop_oldest(amount) {
            Some(record) => {
                let remaining = state.queue_len(amount);
                self.store.save(&state)?;
                Ok(Some((record, remaining)))
            }
            None => Ok(None),
        }
    }

    fn import_under_lock(&self, entries: Vec<ImportEntry>) -> PoolResult<ImportSummary> {
        let mut state = self.store.load();
        let mut added = 0;
        let mut errors = Vec::new();

        for entry in entries {
            if self.config.tier(entry.amount).is_none() {
                errors.push(ImportError {
                    url: entry.url,
                    reason: format!("tier {} is not configured", entry.amount),
                });
                continue;
            }
            let Some(id) = parse_exchange_id(&entry.url) else {
                errors.push(ImportError {
                    url: entry.url,
                    reason: "no exchange id found in url".to_string(),
                });
                continue;
            };
            if state.tier_contains(entry.amount, &id, &entry.url) {
                errors.push(ImportError {
                    url: entry.url,
                    reason: format!("duplicate of existing record {id}"),
                });
                continue;
            }

            state.append(ExchangeRecord {
                id,
                url: entry.url,
                amount: entry.amount,
                created_at: Utc::now(),
                manually_added: true,
            });
            added += 1;
        }

        if added > 0 {
            self.store.save(&state)?;
        }
        Ok(ImportSummary { added, errors })
    }

    /// Fire-and-forget replenishment signal: spawned off the response path.
    /// A failed background batch is logged and re-attempted exactly once
    /// after a delay, then abandoned.
    fn signal_replenish(&self, amount: u32) {
        let scheduler = Arc::clone(&self.scheduler);
        let delay = self.config.replenish_retry_delay;

        tokio::spawn(async move {
            if let Err(err) = scheduler.replenish(amount).await {
                warn!(tier = amount, %err, "background replenishment failed; retrying once");
                tokio::time::sleep(delay).await;
                if let Err(err) = scheduler.replenish(amount).await {
                    warn!(tier = amount, %err, "background replenishment abandoned");
                }
            }
        });
    }
}
