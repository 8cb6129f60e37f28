//! Background eviction sweep (spec §4.2: "background eviction sweeps every
//! 3600 s"). Spawned once from the service context at startup, grounded in
//! the teacher's `tokio::spawn`-plus-`tracing` background task idiom (see
//! `dashflow-streaming`'s DLQ sender and `quality_aggregator`'s consumer
//! tasks).

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vigil_core::traits::Repository;

pub const EVICTION_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawns a task that calls `Repository::cleanup_expired` on a fixed
/// interval for the lifetime of the process. The returned handle can be
/// aborted on shutdown; dropping it leaves the sweep running.
pub fn spawn_eviction_task(repo: Arc<dyn Repository>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            match repo.cleanup_expired().await {
                Ok(counts) => {
                    if counts.cache_evicted > 0 || counts.reports_evicted > 0 {
                        info!(
                            cache_evicted = counts.cache_evicted,
                            reports_evicted = counts.reports_evicted,
                            "background eviction sweep completed"
                        );
                    }
                }
                Err(err) => {
                    warn!(error = %err, "background eviction sweep failed");
                }
            }
        }
    })
}
