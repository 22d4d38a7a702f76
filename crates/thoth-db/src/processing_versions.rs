//! Processing version repository (§3 ProcessingVersion, C5 §4.5).
//!
//! Exactly one version per paper carries `is_active = true`; the flip is
//! performed atomically by `set_active_version` as the last step of
//! `CitationGraph`'s transactional upsert.

use crate::database::Database;
use crate::error::Result;
use crate::schema::ProcessingVersion;
use crate::schema_arrow::{processing_version_to_record, record_to_processing_version};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[derive(Clone)]
pub struct ProcessingVersionRepository {
    db: Arc<Database>,
}

impl ProcessingVersionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn insert(&self, version: &ProcessingVersion) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;

        let record = processing_version_to_record(version)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// All versions for a paper, newest first.
    pub async fn list_for_paper(&self, paper_id: &str) -> Result<Vec<ProcessingVersion>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;

        let mut stream = table.query().only_if(&format!("paper_id = '{}'", escape(paper_id))).execute().await?;

        let mut versions = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                versions.push(record_to_processing_version(&batch, i)?);
            }
        }
        versions.sort_by(|a, b| b.version.cmp(&a.version));

        Ok(versions)
    }

    /// The single active version for a paper, if any.
    pub async fn find_active(&self, paper_id: &str) -> Result<Option<ProcessingVersion>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;

        let mut stream = table
            .query()
            .only_if(&format!("paper_id = '{}' AND is_active = true", escape(paper_id)))
            .execute()
            .await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_processing_version(&batch, 0)?));
            }
        }

        Ok(None)
    }

    pub async fn find(&self, paper_id: &str, version: i64) -> Result<Option<ProcessingVersion>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;

        let mut stream = table
            .query()
            .only_if(&format!("paper_id = '{}' AND version = {}", escape(paper_id), version))
            .execute()
            .await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_processing_version(&batch, 0)?));
            }
        }

        Ok(None)
    }

    /// Atomically flips `is_active` so exactly one version of `paper_id`
    /// carries it — deactivates every other version, then activates
    /// `version`. Callers run this as the last step of C5's transactional
    /// upsert, after citations, graph mirror, and chunk indexing succeed.
    pub async fn set_active_version(&self, paper_id: &str, version: i64) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;

        table
            .update()
            .only_if(&format!("paper_id = '{}' AND version != {}", escape(paper_id), version))
            .column("is_active", "false")
            .execute()
            .await?;

        table
            .update()
            .only_if(&format!("paper_id = '{}' AND version = {}", escape(paper_id), version))
            .column("is_active", "true")
            .execute()
            .await?;

        Ok(())
    }

    pub async fn delete(&self, paper_id: &str, version: i64) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;
        table.delete(&format!("paper_id = '{}' AND version = {}", escape(paper_id), version)).await?;
        Ok(())
    }

    pub async fn count_for_paper(&self, paper_id: &str) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PROCESSING_VERSIONS).execute().await?;
        let count = table.count_rows(Some(format!("paper_id = '{}'", escape(paper_id)))).await?;
        Ok(count as u64)
    }
}
