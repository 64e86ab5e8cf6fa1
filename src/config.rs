//! Pool configuration options

use std::path::PathBuf;
use std::time::Duration;

/// A single price tier: one independent FIFO queue of pre-created records.
///
/// Tiers are configured once at startup and are immutable afterwards.
#[derive(Debug, Clone)]
pub struct TierConfig {
    /// Price amount identifying the tier (also the creation amount).
    pub amount: u32,

    /// Desired queue length the replenisher fills up to.
    pub target: usize,

    /// Alert threshold; a tier below this reports as `Low`. Informational only.
    pub min_size: usize,
}

impl TierConfig {
    pub fn new(amount: u32, target: usize, min_size: usize) -> Self {
        Self {
            amount,
            target,
            min_size,
        }
    }
}

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use exchange_pool::{PoolConfiguration, TierConfig};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new(
///     vec![TierConfig::new(25, 3, 1)],
///     "/tmp/pool/pool.json",
///     "/tmp/pool/pool.lock",
/// )
/// .with_max_concurrent_creations(4)
/// .with_retry(3, Duration::from_secs(5));
///
/// assert_eq!(config.max_concurrent_creations, 4);
/// assert_eq!(config.retry_max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Configured tiers; one persisted queue each.
    pub tiers: Vec<TierConfig>,

    /// Canonical location of the persisted pool document.
    pub store_path: PathBuf,

    /// Location of the cross-process lock file.
    pub lock_path: PathBuf,

    /// Budget for acquiring the pool lock before giving up.
    pub lock_timeout: Duration,

    /// Initial poll interval while waiting for the lock (doubles up to a cap).
    pub lock_poll_interval: Duration,

    /// Maximum simultaneous external creation calls.
    pub max_concurrent_creations: usize,

    /// Attempts per creation task before the error is surfaced.
    pub retry_max_attempts: usize,

    /// Fixed delay between creation attempts.
    pub retry_delay: Duration,

    /// Consecutive creation failures before the circuit breaker opens.
    pub circuit_breaker_threshold: usize,

    /// Delay before the single re-attempt of a failed background replenishment.
    pub replenish_retry_delay: Duration,
}

impl PoolConfiguration {
    /// Create a configuration with default timings for the given tiers and paths.
    pub fn new(
        tiers: Vec<TierConfig>,
        store_path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tiers,
            store_path: store_path.into(),
            lock_path: lock_path.into(),
            lock_timeout: Duration::from_secs(10),
            lock_poll_interval: Duration::from_millis(50),
            max_concurrent_creations: 2,
            retry_max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            circuit_breaker_threshold: 5,
            replenish_retry_delay: Duration::from_secs(30),
        }
    }

    /// Set the lock acquisition budget
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the initial lock poll interval
    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Set the maximum simultaneous creation calls
    pub fn with_max_concurrent_creations(mut self, limit: usize) -> Self {
        self.max_concurrent_creations = limit;
        self
    }

    /// Set the creation retry budget and the fixed inter-attempt delay
    pub fn with_retry(mut self, max_attempts: usize, delay: Duration) -> Self {
        self.retry_max_attempts = max_attempts;
        self.retry_delay = delay;
        self
    }

    /// Set the circuit breaker failure threshold
    ///
    /// # Examples
    ///
    /// ```
    /// use exchange_pool::{PoolConfiguration, TierConfig};
    ///
    /// let config = PoolConfiguration::new(vec![TierConfig::new(19, 3, 1)], "p.json", "p.lock")
    ///     .with_circuit_breaker_threshold(3);
    ///
    /// assert_eq!(config.circuit_breaker_threshold, 3);
    /// ```
    pub fn with_circuit_breaker_threshold(mut self, threshold: usize) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    /// Set the delay before the single background replenishment re-attempt
    pub fn with_replenish_retry_delay(mut self, delay: Duration) -> Self {
        self.replenish_retry_delay = delay;
        self
    }

    /// Look up a configured tier by amount
    pub fn tier(&self, amount: u32) -> Option<&TierConfig> {
        self.tiers.iter().find(|tier| tier.amount == amount)
    }

    /// Amounts of all configured tiers, in configuration order
    pub fn tier_amounts(&self) -> Vec<u32> {
        self.tiers.iter().map(|tier| tier.amount).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_lookup() {
        let config = PoolConfiguration::new(
            vec![TierConfig::new(19, 3, 1), TierConfig::new(29, 5, 2)],
            "pool.json",
            "pool.lock",
        );

        assert_eq!(config.tier(29).unwrap().target, 5);
        assert!(config.tier(17).is_none());
        assert_eq!(config.tier_amounts(), vec![19, 29]);
    }

    #[test]
    fn builder_overrides() {
        let config = PoolConfiguration::new(vec![], "pool.json", "pool.lock")
            .with_lock_timeout(Duration::from_millis(200))
            .with_retry(5, Duration::from_millis(10))
            .with_replenish_retry_delay(Duration::from_millis(25));

        assert_eq!(config.lock_timeout, Duration::from_millis(200));
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.replenish_retry_delay, Duration::from_millis(25));
    }
}
