//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache items, so stale
//! payloads are released even when nobody reads them again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that periodically removes expired items.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. Each sweep takes the cache's write lock once.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Cache::new(CacheOptions::default())?;
/// let sweeper = spawn_expiry_sweeper(cache.clone(), Duration::from_secs(30));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_expiry_sweeper(cache: Cache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweeper with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.remove_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired items", removed);
            } else {
                debug!("Expiry sweep: no expired items found");
            }
        }
    })
}
