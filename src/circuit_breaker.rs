//! Circuit breaker guarding the external creation path

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{info, warn};

/// Circuit breaker state
///
/// # Examples
///
/// ```
/// use exchange_pool::{CircuitBreaker, CircuitBreakerState};
///
/// let breaker = CircuitBreaker::new(3);
/// assert_eq!(breaker.state(), CircuitBreakerState::Closed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Circuit is closed - creation permitted
    Closed,

    /// Circuit is open - creation refused without an attempt
    Open,
}

/// Global failure-counting guard for exchange creation.
///
/// The counter is shared across all tiers: consecutive failures anywhere open
/// the circuit for everyone, and one success anywhere closes it again. This
/// bluntness is intentional - the external dependency is the same for every
/// tier, and a failing dependency is a metered cost regardless of tier.
///
/// There is no timer-based half-open probe: once open, the circuit stays open
/// until a creation succeeds or [`reset`](CircuitBreaker::reset) is called
/// explicitly (a full reconcile does this before starting).
///
/// # Examples
///
/// ```
/// use exchange_pool::CircuitBreaker;
///
/// let breaker = CircuitBreaker::new(3);
///
/// breaker.record_failure();
/// breaker.record_failure();
/// breaker.record_failure();
/// assert!(!breaker.allow_request());
///
/// breaker.record_success();
/// assert!(breaker.allow_request());
/// ```
pub struct CircuitBreaker {
    state: Mutex<CircuitBreakerState>,
    consecutive_failures: AtomicUsize,
    threshold: usize,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `threshold` consecutive failures.
    pub fn new(threshold: usize) -> Self {
        Self {
            state: Mutex::new(CircuitBreakerState::Closed),
            consecutive_failures: AtomicUsize::new(0),
            threshold,
        }
    }

    /// Get the current state
    pub fn state(&self) -> CircuitBreakerState {
        *self.state.lock()
    }

    /// Whether a creation attempt is currently permitted
    pub fn allow_request(&self) -> bool {
        self.state() == CircuitBreakerState::Closed
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Record a successful creation; closes the circuit and zeroes the counter.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.state.lock();
        if *state == CircuitBreakerState::Open {
            info!("circuit breaker closed after successful creation");
        }
        *state = CircuitBreakerState::Closed;
    }

    /// Record a failed creation; opens the circuit at the threshold.
    pub fn record_failure(&self) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.threshold {
            let mut state = self.state.lock();
            if *state == CircuitBreakerState::Closed {
                warn!(
                    consecutive_failures = count,
                    threshold = self.threshold,
                    "circuit breaker opened; suspending creation attempts"
                );
            }
            *state = CircuitBreakerState::Open;
        }
    }

    /// Explicitly close the circuit and zero the failure counter.
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.state.lock() = CircuitBreakerState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_at_threshold() {
        let breaker = CircuitBreaker::new(3);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow_request());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitBreakerState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn success_resets_counter_and_closes() {
        let breaker = CircuitBreaker::new(2);

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.allow_request());

        breaker.record_success();
        assert!(breaker.allow_request());
        assert_eq!(breaker.failure_count(), 0);

        // the counter restarts from zero, not from where it left off
        breaker.record_failure();
        assert!(breaker.allow_request());
    }

    #[test]
    fn stays_open_without_success_or_reset() {
        let breaker = CircuitBreaker::new(1);
        breaker.record_failure();
        assert!(!breaker.allow_request());
        assert!(!breaker.allow_request());

        breaker.reset();
        assert!(breaker.allow_request());
    }
}
