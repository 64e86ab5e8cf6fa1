// exchange_pool - demo binary
//
// Runs the pool manager against a simulated creator: consumes one record
// on demand, waits for the background refill, and prints the pool status.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use exchange_pool::{
    ExchangeCreator, ExchangeRecord, PoolConfiguration, PoolManager, PoolResult, TierConfig,
};

/// Simulated creator: a short pause instead of the real negotiation.
struct DemoCreator {
    sequence: AtomicUsize,
}

#[async_trait]
impl ExchangeCreator for DemoCreator {
    async fn create(&self, amount: u32) -> PoolResult<ExchangeRecord> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(ExchangeRecord {
            id: format!("demo-{n}"),
            url: format!("https://exchange.test/exchange?id=demo-{n}&rate=floating"),
            amount,
            created_at: Utc::now(),
            manually_added: false,
        })
    }
}

#[tokio::main]
async fn main() -> PoolResult<()> {
    tracing_subscriber::fmt::init();

    let dir = std::env::temp_dir().join("exchange-pool-demo");
    // clear a stale lock left behind by an aborted previous run
    let _ = std::fs::remove_file(dir.join("pool.lock"));

    let config = PoolConfiguration::new(
        vec![TierConfig::new(19, 3, 1), TierConfig::new(29, 5, 2)],
        dir.join("pool.json"),
        dir.join("pool.lock"),
    );
    let pool = PoolManager::new(
        config,
        Arc::new(DemoCreator {
            sequence: AtomicUsize::new(0),
        }),
    );

    let delivered = pool.consume(19).await?;
    println!("delivered ({:?}): {}", delivered.status, delivered.record.url);

    // give the background refill a moment, then show the result
    tokio::time::sleep(Duration::from_secs(2)).await;
    for (amount, tier) in pool.pool_status().tiers {
        println!(
            "tier {amount}: {}/{} ({:?})",
            tier.size, tier.target, tier.status
        );
    }
    Ok(())
}
