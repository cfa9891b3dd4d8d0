// src/lib.rs
// Public library surface for integration tests (and embedding UIs).

pub mod aggregate;
pub mod briefings;
pub mod client;
pub mod config;
pub mod identity;
pub mod scheduler;
pub mod storage;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::AggregateView;
pub use crate::briefings::SavedBriefingsStore;
pub use crate::client::{ApiClient, HttpApiClient, InsertSavedRequest};
pub use crate::config::DashboardConfig;
pub use crate::identity::ClientIdentity;
pub use crate::storage::{FileStore, LocalStore, MemoryStore};
pub use crate::types::{FeedItem, Ioc, ResultsPayload, SavedBriefing};
