//! Citation repository (§3 Citation, C3 CitationResolver, C5 §4.5).
//!
//! Citations are scoped to `(citing_paper_id, citing_version)` and never
//! mutated after creation — a re-ingestion replaces the full set for its new
//! version rather than editing existing rows.

use crate::database::Database;
use crate::error::Result;
use crate::schema::Citation;
use crate::schema_arrow::{citation_to_record, record_to_citation};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[derive(Clone)]
pub struct CitationRepository {
    db: Arc<Database>,
}

impl CitationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn insert_batch(&self, citations: &[Citation]) -> Result<()> {
        if citations.is_empty() {
            return Ok(());
        }

        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;

        let records: Vec<arrow_array::RecordBatch> = citations.iter().map(citation_to_record).collect::<Result<_>>()?;
        let schema = records[0].schema();
        let iter = arrow_array::RecordBatchIterator::new(records.into_iter().map(Ok), schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// All citation edges extracted from a specific `(paper, version)`.
    pub async fn find_by_citing(&self, citing_paper_id: &str, citing_version: i64) -> Result<Vec<Citation>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;

        let mut stream = table
            .query()
            .only_if(&format!("citing_paper_id = '{}' AND citing_version = {}", escape(citing_paper_id), citing_version))
            .execute()
            .await?;

        let mut citations = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                citations.push(record_to_citation(&batch, i)?);
            }
        }

        Ok(citations)
    }

    /// All citation edges that resolved to a given cited paper — the inbound
    /// adjacency used by `thoth-kg`'s derived graph view.
    pub async fn find_citing_paper(&self, cited_paper_id: &str) -> Result<Vec<Citation>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;

        let mut stream =
            table.query().only_if(&format!("cited_paper_id = '{}'", escape(cited_paper_id))).execute().await?;

        let mut citations = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                citations.push(record_to_citation(&batch, i)?);
            }
        }

        Ok(citations)
    }

    /// Citations still at `resolver_stage = unresolved`, candidates for
    /// periodic re-resolution as new papers are ingested.
    pub async fn find_unresolved(&self) -> Result<Vec<Citation>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;

        let mut stream = table.query().only_if("resolver_stage = 'unresolved'").execute().await?;

        let mut citations = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                citations.push(record_to_citation(&batch, i)?);
            }
        }

        Ok(citations)
    }

    /// Replaces every citation edge for `(citing_paper_id, citing_version)`
    /// with `citations` — used when a paper is re-ingested and its prior
    /// version's edges must not accumulate alongside the new ones.
    pub async fn replace_for_version(&self, citing_paper_id: &str, citing_version: i64, citations: &[Citation]) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;
        table
            .delete(&format!("citing_paper_id = '{}' AND citing_version = {}", escape(citing_paper_id), citing_version))
            .await?;
        drop(table);
        self.insert_batch(citations).await
    }

    pub async fn delete_by_citing(&self, citing_paper_id: &str, citing_version: i64) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;
        table
            .delete(&format!("citing_paper_id = '{}' AND citing_version = {}", escape(citing_paper_id), citing_version))
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CITATIONS).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }
}
