//! Background eviction of expired records
//!
//! Lazy expiry on read keeps answers correct; the sweeper keeps memory
//! bounded when tokens are issued and never used again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns a task that calls `purge` every `interval` until `cancel` fires.
///
/// `name` only labels log output.
pub fn spawn_sweeper<F>(
    name: &'static str,
    interval: Duration,
    cancel: CancellationToken,
    purge: F,
) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(store = name, "Sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = purge();
                    if removed > 0 {
                        tracing::debug!(store = name, removed, "Evicted expired entries");
                    }
                }
            }
        }
    })
}
