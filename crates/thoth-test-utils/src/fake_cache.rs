//! In-memory `CacheStore` so `ContentCache` (C1) and anything built on it
//! can be exercised without a LanceDB-backed `thoth-db` instance.

use std::collections::HashMap;
use std::sync::Mutex;

use thoth_common::cache::{CacheEntry, CacheStore};
use thoth_common::error::Result;

/// Keyed the same way `thoth-db`'s real `CacheEntryRepository` is, but
/// backed by a `Mutex<HashMap>` instead of a table.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries currently stored, expired or not — useful for
    /// asserting a `singleflight` build ran exactly once.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn read(&self, kind: &str, fingerprint: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().unwrap().get(&(kind.to_string(), fingerprint.to_string())).cloned())
    }

    async fn write(&self, entry: CacheEntry) -> Result<()> {
        self.entries.lock().unwrap().insert((entry.kind.clone(), entry.fingerprint.clone()), entry);
        Ok(())
    }

    async fn remove(&self, kind: &str, fingerprint: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(&(kind.to_string(), fingerprint.to_string()));
        Ok(())
    }

    async fn remove_kind(&self, kind: &str) -> Result<()> {
        self.entries.lock().unwrap().retain(|(k, _), _| k != kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = InMemoryCacheStore::new();
        let entry = CacheEntry { kind: "ocr".to_string(), fingerprint: "abc".to_string(), value: vec![1, 2, 3], created_at: chrono::Utc::now(), expires_at: None };
        store.write(entry.clone()).await.unwrap();

        let read = store.read("ocr", "abc").await.unwrap().unwrap();
        assert_eq!(read.value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn remove_kind_only_clears_that_kind() {
        let store = InMemoryCacheStore::new();
        store.write(CacheEntry { kind: "ocr".to_string(), fingerprint: "a".to_string(), value: vec![], created_at: chrono::Utc::now(), expires_at: None }).await.unwrap();
        store.write(CacheEntry { kind: "analysis".to_string(), fingerprint: "b".to_string(), value: vec![], created_at: chrono::Utc::now(), expires_at: None }).await.unwrap();

        store.remove_kind("ocr").await.unwrap();

        assert!(store.read("ocr", "a").await.unwrap().is_none());
        assert!(store.read("analysis", "b").await.unwrap().is_some());
    }
}
