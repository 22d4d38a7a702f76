//! ContentCache (C1) — keyed, TTL'd artifact store with singleflight
//! coalescing of concurrent builds for the same key.
//!
//! Durable storage is pluggable via [`CacheStore`] so this crate has no
//! dependency on the concrete backend; `thoth-db` provides the LanceDB-backed
//! implementation used in production. Singleflight coalescing itself is
//! always in-process — it coordinates callers within one Thoth daemon, not
//! across processes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

use crate::error::{AppError, Result};

/// A stored cache artifact plus its bookkeeping metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub kind: String,
    pub fingerprint: String,
    pub value: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Durable storage backend for cache entries. Implemented by `thoth-db`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, kind: &str, fingerprint: &str) -> Result<Option<CacheEntry>>;
    async fn write(&self, entry: CacheEntry) -> Result<()>;
    async fn remove(&self, kind: &str, fingerprint: &str) -> Result<()>;
    async fn remove_kind(&self, kind: &str) -> Result<()>;
}

type BuildCell = Arc<OnceCell<std::result::Result<Vec<u8>, String>>>;

/// Single source of truth for expensive, reproducible artifacts.
pub struct ContentCache<S: CacheStore> {
    store: Arc<S>,
    inflight: Mutex<HashMap<String, BuildCell>>,
}

fn key(kind: &str, fingerprint: &str) -> String {
    format!("{kind}:{fingerprint}")
}

impl<S: CacheStore> ContentCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// `get(kind, fingerprint) -> artifact | miss`. Storage errors degrade to
    /// a miss rather than propagating (§4.1 failure semantics).
    pub async fn get(&self, kind: &str, fingerprint: &str) -> Option<Vec<u8>> {
        match self.store.read(kind, fingerprint).await {
            Ok(Some(entry)) if !entry.is_expired(Utc::now()) => Some(entry.value),
            Ok(_) => None,
            Err(err) => {
                warn!(kind, fingerprint, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// `put(kind, fingerprint, artifact, ttl)`. Storage errors on write are
    /// logged and non-fatal — the caller still has the artifact it just
    /// built.
    pub async fn put(&self, kind: &str, fingerprint: &str, artifact: Vec<u8>, ttl: Option<Duration>) {
        let now = Utc::now();
        let entry = CacheEntry {
            kind: kind.to_string(),
            fingerprint: fingerprint.to_string(),
            value: artifact,
            created_at: now,
            expires_at: ttl.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| now + d),
        };
        if let Err(err) = self.store.write(entry).await {
            warn!(kind, fingerprint, error = %err, "cache write failed, artifact not persisted");
        }
    }

    /// Guarantees at-most-one concurrent `build` per `(kind, fingerprint)`;
    /// concurrent callers await the same result. On build failure, all
    /// waiters observe the same error and nothing is cached.
    pub async fn singleflight<F, Fut>(
        &self,
        kind: &str,
        fingerprint: &str,
        ttl: Option<Duration>,
        build: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if let Some(hit) = self.get(kind, fingerprint).await {
            return Ok(hit);
        }

        let k = key(kind, fingerprint);
        let cell: BuildCell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(k.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell
            .get_or_init(|| async {
                match build().await {
                    Ok(bytes) => Ok(bytes),
                    Err(err) => Err(err.to_string()),
                }
            })
            .await
            .clone();

        // Remove the in-flight entry once this build has settled so a later
        // cache invalidation can trigger a fresh build rather than replaying
        // the cached `OnceCell` result forever.
        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&k);
        }

        match result {
            Ok(bytes) => {
                self.put(kind, fingerprint, bytes.clone(), ttl).await;
                Ok(bytes)
            }
            Err(msg) => Err(AppError::Transient(msg)),
        }
    }

    pub async fn invalidate(&self, kind: &str, fingerprint: &str) -> Result<()> {
        self.store.remove(kind, fingerprint).await
    }

    pub async fn invalidate_kind(&self, kind: &str) -> Result<()> {
        self.store.remove_kind(kind).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use thoth_test_utils::InMemoryCacheStore;

    use super::*;

    #[tokio::test]
    async fn singleflight_calls_build_once_for_concurrent_waiters_on_the_same_key() {
        let cache = ContentCache::new(Arc::new(InMemoryCacheStore::new()));
        let build_calls = Arc::new(AtomicUsize::new(0));

        let build = || {
            let build_calls = build_calls.clone();
            async move {
                build_calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"artifact".to_vec())
            }
        };

        let (a, b) = tokio::join!(cache.singleflight("ocr", "fp1", None, build), cache.singleflight("ocr", "fp1", None, build));

        assert_eq!(a.unwrap(), b"artifact");
        assert_eq!(b.unwrap(), b"artifact");
        assert_eq!(build_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn singleflight_hits_the_store_on_a_later_call_without_rebuilding() {
        let cache = ContentCache::new(Arc::new(InMemoryCacheStore::new()));
        let build_calls = Arc::new(AtomicUsize::new(0));

        let build = || {
            let build_calls = build_calls.clone();
            async move {
                build_calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"artifact".to_vec())
            }
        };

        cache.singleflight("ocr", "fp1", None, build).await.unwrap();
        cache.singleflight("ocr", "fp1", None, build).await.unwrap();

        assert_eq!(build_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = ContentCache::new(store.clone());

        let now = Utc::now();
        store
            .write(CacheEntry { kind: "ocr".to_string(), fingerprint: "fp1".to_string(), value: b"stale".to_vec(), created_at: now - chrono::Duration::hours(2), expires_at: Some(now - chrono::Duration::hours(1)) })
            .await
            .unwrap();

        assert_eq!(cache.get("ocr", "fp1").await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_a_cached_entry() {
        let cache = ContentCache::new(Arc::new(InMemoryCacheStore::new()));
        cache.put("ocr", "fp1", b"artifact".to_vec(), None).await;
        assert_eq!(cache.get("ocr", "fp1").await, Some(b"artifact".to_vec()));

        cache.invalidate("ocr", "fp1").await.unwrap();

        assert_eq!(cache.get("ocr", "fp1").await, None);
    }
}
