// src/identity.rs
//! Anonymous client identity: one opaque token per browser profile, created
//! lazily on first use and never rotated while storage persists.
//!
//! Generation is single-flight: the `OnceCell` initializer makes the
//! read-or-generate step atomic within the process, so concurrent first
//! calls observe the same token instead of racing read-then-write and
//! orphaning one of two freshly generated ids.

use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::storage::LocalStore;

/// Storage key for the persisted identity token.
pub const CLIENT_ID_KEY: &str = "threatdeck.client_id";

pub struct ClientIdentity {
    store: Arc<dyn LocalStore>,
    token: OnceCell<String>,
}

impl ClientIdentity {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            token: OnceCell::new(),
        }
    }

    /// Return the durable client id, generating and persisting a fresh one
    /// on first use. Idempotent; safe to call from multiple call sites.
    pub fn ensure_client_id(&self) -> Result<String> {
        let token = self.token.get_or_try_init(|| -> Result<String> {
            if let Some(existing) = self.store.get(CLIENT_ID_KEY)? {
                let existing = existing.trim().to_string();
                if !existing.is_empty() {
                    return Ok(existing);
                }
            }
            let fresh = Uuid::new_v4().to_string();
            self.store.set(CLIENT_ID_KEY, &fresh)?;
            tracing::info!(client_id = %fresh, "generated new client identity");
            Ok(fresh)
        })?;
        Ok(token.clone())
    }
}
