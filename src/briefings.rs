// src/briefings.rs
//! # Saved Briefings Store
//! Local-first cache of the user's saved briefings: hydrates from durable
//! storage before any network round trip, applies mutations optimistically,
//! and reconciles against the remote source of truth when calls settle.
//!
//! Rollback uses the snapshot taken at mutation start (not the state at
//! settle time), and applies symmetrically to failed inserts and failed
//! deletes. The in-memory list and the durable cache are owned exclusively
//! by this store; both are capped at [`SAVED_CACHE_CAP`] entries,
//! most-recent-first, with no duplicate links.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::client::{ApiClient, InsertSavedRequest};
use crate::identity::ClientIdentity;
use crate::storage::LocalStore;
use crate::types::{FeedItem, SavedBriefing};

/// Storage key for the durable saved-briefings cache.
pub const SAVED_CACHE_KEY: &str = "threatdeck.saved_briefings";
/// Cap on both the in-memory list and the durable cache.
pub const SAVED_CACHE_CAP: usize = 50;

/// One-time metrics registration (so series show up once a recorder is
/// installed by the host).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "briefings_refresh_total",
            "Successful saved-briefings refreshes."
        );
        describe_counter!(
            "briefings_refresh_errors_total",
            "Saved-briefings refreshes that fell back to cached state."
        );
        describe_counter!(
            "briefings_toggle_total",
            "Optimistic save/unsave mutations issued."
        );
        describe_counter!(
            "briefings_rollback_total",
            "Optimistic mutations rolled back after remote failure."
        );
        describe_gauge!(
            "briefings_saved_count",
            "Current number of saved briefings in memory."
        );
    });
}

#[derive(Debug, Default)]
struct StoreState {
    /// Most-recent-first; reflects pending optimistic mutations.
    saved: Vec<SavedBriefing>,
    loading: bool,
    error: Option<String>,
}

pub struct SavedBriefingsStore {
    client_id: String,
    api: Arc<dyn ApiClient>,
    cache: Arc<dyn LocalStore>,
    state: Mutex<StoreState>,
    /// Cleared on teardown; in-flight completions observing `false` must
    /// not mutate state.
    alive: AtomicBool,
}

impl SavedBriefingsStore {
    pub fn new(
        client_id: impl Into<String>,
        api: Arc<dyn ApiClient>,
        cache: Arc<dyn LocalStore>,
    ) -> Arc<Self> {
        ensure_metrics_described();
        Arc::new(Self {
            client_id: client_id.into(),
            api,
            cache,
            state: Mutex::new(StoreState::default()),
            alive: AtomicBool::new(true),
        })
    }

    /// Resolve the client identity, hydrate from the durable cache so the
    /// UI has data before any network round trip, then refresh from the
    /// server.
    pub async fn initialize(
        identity: &ClientIdentity,
        api: Arc<dyn ApiClient>,
        cache: Arc<dyn LocalStore>,
    ) -> Result<Arc<Self>> {
        let client_id = identity.ensure_client_id()?;
        let store = Self::new(client_id, api, cache);
        store.hydrate_from_cache();
        store.refresh().await;
        Ok(store)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Snapshot of the current (optimistic) saved list, most-recent-first.
    pub fn saved(&self) -> Vec<SavedBriefing> {
        self.lock().saved.clone()
    }

    /// Membership by link over the current optimistic state.
    pub fn is_saved(&self, link: &str) -> bool {
        self.lock().saved.iter().any(|b| b.link == link)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Tear the store down: no state writes may happen afterwards, even
    /// from network calls already in flight.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Re-read the saved set from the server. Success replaces the whole
    /// list atomically and overwrites the cache; failure keeps whatever is
    /// in memory (the server is not the only source of truth at read time)
    /// and surfaces the error.
    pub async fn refresh(&self) {
        if !self.is_alive() {
            return;
        }
        self.lock().loading = true;

        let result = self.api.list_saved(&self.client_id).await;
        if !self.is_alive() {
            return;
        }

        match result {
            Ok(mut items) => {
                dedup_by_link(&mut items);
                items.truncate(SAVED_CACHE_CAP);
                {
                    let mut st = self.lock();
                    st.saved = items.clone();
                    st.loading = false;
                    st.error = None;
                }
                self.write_cache(&items);
                counter!("briefings_refresh_total").increment(1);
                gauge!("briefings_saved_count").set(items.len() as f64);
            }
            Err(e) => {
                tracing::warn!(error = ?e, "saved refresh failed, keeping local state");
                let mut st = self.lock();
                st.loading = false;
                st.error = Some(e.to_string());
                counter!("briefings_refresh_errors_total").increment(1);
            }
        }
    }

    /// Save or unsave one briefing, optimistically. No-op when the client
    /// id or the item's link is absent (caller precondition violation, not
    /// a runtime failure).
    pub async fn toggle_saved(&self, item: &FeedItem) {
        let Some(link) = item
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        else {
            return;
        };
        if self.client_id.is_empty() || !self.is_alive() {
            return;
        }
        counter!("briefings_toggle_total").increment(1);

        if self.is_saved(link) {
            self.remove_saved(link).await;
        } else {
            self.add_saved(item, link).await;
        }
    }

    /// Optimistic add: prepend (deduplicating by link), mirror the cache,
    /// then insert remotely. Success swaps in the server's canonical entry;
    /// failure rolls back to the pre-mutation snapshot.
    async fn add_saved(&self, item: &FeedItem, link: &str) {
        let candidate = SavedBriefing::from_feed_item(item, Utc::now());
        let (snapshot, optimistic) = {
            let mut st = self.lock();
            let snapshot = st.saved.clone();
            st.saved.retain(|b| b.link != link);
            st.saved.insert(0, candidate.clone());
            st.saved.truncate(SAVED_CACHE_CAP);
            (snapshot, st.saved.clone())
        };
        self.write_cache(&optimistic);

        let req = InsertSavedRequest {
            client_id: self.client_id.clone(),
            link: link.to_string(),
            title: candidate.title.clone(),
            source: candidate.source.clone(),
            image_url: candidate.image_url.clone(),
            risk_level: candidate.risk_level.clone(),
            risk_score: candidate.risk_score,
        };
        let result = self.api.insert_saved(&req).await;
        if !self.is_alive() {
            return;
        }

        match result {
            Ok(canonical) => {
                let items = {
                    let mut st = self.lock();
                    if let Some(slot) = st.saved.iter_mut().find(|b| b.link == link) {
                        *slot = canonical;
                    }
                    st.saved.clone()
                };
                self.write_cache(&items);
                gauge!("briefings_saved_count").set(items.len() as f64);
            }
            Err(e) => {
                tracing::warn!(link, error = ?e, "save failed, rolling back");
                {
                    let mut st = self.lock();
                    st.saved = snapshot.clone();
                    st.error = Some(e.to_string());
                }
                self.write_cache(&snapshot);
                counter!("briefings_rollback_total").increment(1);
            }
        }
    }

    /// Optimistic remove, symmetric to [`Self::add_saved`]: failure
    /// restores the pre-mutation snapshot rather than leaving the entry
    /// silently dropped.
    async fn remove_saved(&self, link: &str) {
        let (snapshot, optimistic) = {
            let mut st = self.lock();
            let snapshot = st.saved.clone();
            st.saved.retain(|b| b.link != link);
            (snapshot, st.saved.clone())
        };
        self.write_cache(&optimistic);

        let result = self.api.delete_saved(&self.client_id, link).await;
        if !self.is_alive() {
            return;
        }

        match result {
            Ok(()) => {
                gauge!("briefings_saved_count").set(optimistic.len() as f64);
            }
            Err(e) => {
                tracing::warn!(link, error = ?e, "unsave failed, rolling back");
                {
                    let mut st = self.lock();
                    st.saved = snapshot.clone();
                    st.error = Some(e.to_string());
                }
                self.write_cache(&snapshot);
                counter!("briefings_rollback_total").increment(1);
            }
        }
    }

    fn hydrate_from_cache(&self) {
        match self.cache.get(SAVED_CACHE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<SavedBriefing>>(&raw) {
                Ok(mut items) => {
                    dedup_by_link(&mut items);
                    items.truncate(SAVED_CACHE_CAP);
                    tracing::debug!(count = items.len(), "hydrated saved briefings from cache");
                    self.lock().saved = items;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "corrupt saved cache, ignoring");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = ?e, "saved cache read failed");
            }
        }
    }

    /// Mirror the list into durable storage. Best-effort: failures are
    /// logged, never surfaced.
    fn write_cache(&self, items: &[SavedBriefing]) {
        match serde_json::to_string(items) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(SAVED_CACHE_KEY, &raw) {
                    tracing::warn!(error = ?e, "saved cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "saved cache serialization failed");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().expect("briefings state mutex poisoned")
    }
}

/// Keep the first occurrence of each link.
fn dedup_by_link(items: &mut Vec<SavedBriefing>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|b| seen.insert(b.link.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mk = |link: &str, title: &str| SavedBriefing {
            link: link.into(),
            title: title.into(),
            source: String::new(),
            image_url: String::new(),
            risk_level: None,
            risk_score: None,
            saved_at: None,
        };
        let mut items = vec![mk("a", "first"), mk("b", "x"), mk("a", "second")];
        dedup_by_link(&mut items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "first");
    }
}
