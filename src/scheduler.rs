// src/scheduler.rs
//! Periodic refresh of the saved-briefings store, bound to the store's
//! liveness flag. The task exits on its own once the owning view calls
//! `shutdown()`; aborting the handle is also safe.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::briefings::SavedBriefingsStore;

#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn the repeating saved-set refresh. Independent of user action; the
/// first tick fires one interval after spawn (`initialize` already did the
/// initial refresh).
pub fn spawn_saved_refresh(
    store: Arc<SavedBriefingsStore>,
    cfg: RefreshSchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        // Consume the immediate first tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !store.is_alive() {
                break;
            }
            store.refresh().await;
            counter!("briefings_poll_runs_total").increment(1);
            tracing::debug!(
                target: "briefings",
                saved = store.saved().len(),
                "saved refresh tick"
            );
        }
        tracing::debug!(target: "briefings", "saved refresh scheduler stopped");
    })
}
