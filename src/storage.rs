// src/storage.rs
//! Durable local key-value storage, the platform service behind the client
//! identity token and the saved-briefings cache.
//!
//! The trait mirrors what a browser profile offers: opaque string values,
//! synchronous access, best-effort durability. `FileStore` persists a
//! single JSON map per profile; `MemoryStore` backs tests and ephemeral
//! embeddings.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.lock().expect("memory store mutex poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("memory store mutex poisoned");
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("memory store mutex poisoned");
        map.remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON object per profile, write-through on every
/// mutation. A corrupt or missing file degrades to an empty map; the cache
/// is best-effort, never authoritative.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt state file, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating state dir {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(map).context("serializing state map")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing state file {}", self.path.display()))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.lock().expect("file store mutex poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("file store mutex poisoned");
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.inner.lock().expect("file store mutex poisoned");
        map.remove(key);
        self.persist(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set("token", "abc").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("anything").unwrap().is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
