//! Cache entry repository — the durable backend behind
//! `thoth_common::cache::CacheStore` (§3 CacheEntry, C1).

use crate::database::Database;
use crate::error::Result;
use crate::schema::CacheEntryRow;
use crate::schema_arrow::{cache_entry_to_record, record_to_cache_entry};
use async_trait::async_trait;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use thoth_common::cache::{CacheEntry, CacheStore};

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Repository for cache entry operations, and the `CacheStore` impl used by
/// `thoth_common::cache::ContentCache`.
#[derive(Clone)]
pub struct CacheEntryRepository {
    db: Arc<Database>,
}

impl CacheEntryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn find(&self, kind: &str, fingerprint: &str) -> Result<Option<CacheEntryRow>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CACHE_ENTRIES).execute().await?;

        let mut stream = table
            .query()
            .only_if(&format!("kind = '{}' AND fingerprint = '{}'", escape(kind), escape(fingerprint)))
            .execute()
            .await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_cache_entry(&batch, 0)?));
            }
        }

        Ok(None)
    }

    pub async fn upsert(&self, entry: &CacheEntryRow) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CACHE_ENTRIES).execute().await?;

        // Replace any prior entry for this key before inserting, since
        // LanceDB's merge_insert keys on a single column and this table's
        // key is composite.
        table
            .delete(&format!("kind = '{}' AND fingerprint = '{}'", escape(&entry.kind), escape(&entry.fingerprint)))
            .await?;

        let record = cache_entry_to_record(entry)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);
        table.add(iter).execute().await?;

        Ok(())
    }

    pub async fn delete(&self, kind: &str, fingerprint: &str) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CACHE_ENTRIES).execute().await?;
        table.delete(&format!("kind = '{}' AND fingerprint = '{}'", escape(kind), escape(fingerprint))).await?;
        Ok(())
    }

    pub async fn delete_kind(&self, kind: &str) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CACHE_ENTRIES).execute().await?;
        table.delete(&format!("kind = '{}'", escape(kind))).await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CACHE_ENTRIES).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }
}

#[async_trait]
impl CacheStore for CacheEntryRepository {
    async fn read(&self, kind: &str, fingerprint: &str) -> thoth_common::error::Result<Option<CacheEntry>> {
        let row = self.find(kind, fingerprint).await?;
        Ok(row.map(|r| CacheEntry {
            kind: r.kind,
            fingerprint: r.fingerprint,
            value: r.value,
            created_at: r.created_at,
            expires_at: r.expires_at,
        }))
    }

    async fn write(&self, entry: CacheEntry) -> thoth_common::error::Result<()> {
        let size_bytes = entry.value.len() as i64;
        let row = CacheEntryRow {
            kind: entry.kind,
            fingerprint: entry.fingerprint,
            value: entry.value,
            size_bytes,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        self.upsert(&row).await?;
        Ok(())
    }

    async fn remove(&self, kind: &str, fingerprint: &str) -> thoth_common::error::Result<()> {
        self.delete(kind, fingerprint).await?;
        Ok(())
    }

    async fn remove_kind(&self, kind: &str) -> thoth_common::error::Result<()> {
        self.delete_kind(kind).await?;
        Ok(())
    }
}
