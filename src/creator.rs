//! Seam for the external exchange creation routine

use async_trait::async_trait;

use crate::errors::PoolResult;
use crate::record::ExchangeRecord;

/// External collaborator that negotiates a new exchange for the given amount.
///
/// A call may take tens of seconds and fails with
/// [`Creation`](crate::PoolError::Creation); the creator performs no retries
/// of its own. Retry, circuit breaking, and concurrency bounds are applied by
/// the pool around this trait.
#[async_trait]
pub trait ExchangeCreator: Send + Sync {
    async fn create(&self, amount: u32) -> PoolResult<ExchangeRecord>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::errors::PoolError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scriptable creator for tests: fails the first `fail_first` calls, then
    /// succeeds, while tracking call counts and peak concurrency.
    pub(crate) struct MockCreator {
        calls: AtomicUsize,
        fail_first: usize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl MockCreator {
        pub(crate) fn new() -> Self {
            Self::failing(0)
        }

        pub(crate) fn failing(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn peak_concurrency(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExchangeCreator for MockCreator {
        async fn create(&self, amount: u32) -> PoolResult<ExchangeRecord> {
            let sequence = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if sequence < self.fail_first {
                return Err(PoolError::Creation("simulated creation failure".into()));
            }

            Ok(ExchangeRecord {
                id: format!("mock-{sequence}"),
                url: format!("https://exchange.test/exchange?id=mock-{sequence}&rate=floating"),
                amount,
                created_at: Utc::now(),
                manually_added: false,
            })
        }
    }
}
