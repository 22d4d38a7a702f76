//! Paper repository.
//!
//! Provides CRUD operations for paper records (§3 Paper).

use crate::database::Database;
use crate::error::Result;
use crate::schema::Paper;
use crate::schema_arrow::{paper_to_record, record_to_paper};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Repository for paper operations.
#[derive(Clone)]
pub struct PaperRepository {
    db: Arc<Database>,
}

impl PaperRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new paper.
    pub async fn insert(&self, paper: &Paper) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let record = paper_to_record(paper)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// Insert multiple papers in bulk.
    pub async fn insert_batch(&self, papers: &[Paper]) -> Result<()> {
        if papers.is_empty() {
            return Ok(());
        }

        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let records: Vec<arrow_array::RecordBatch> = papers.iter().map(paper_to_record).collect::<Result<_>>()?;

        let schema = records[0].schema();
        let iter = arrow_array::RecordBatchIterator::new(records.into_iter().map(Ok), schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// Find a paper by its stable id (hash of canonical identifier).
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Paper>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut stream = table.query().only_if(&format!("id = '{}'", escape(id))).execute().await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_paper(&batch, 0)?));
            }
        }

        Ok(None)
    }

    /// Find a paper by DOI.
    pub async fn find_by_doi(&self, doi: &str) -> Result<Option<Paper>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut stream = table.query().only_if(&format!("doi = '{}'", escape(doi))).execute().await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_paper(&batch, 0)?));
            }
        }

        Ok(None)
    }

    /// Find a paper by arXiv id.
    pub async fn find_by_arxiv_id(&self, arxiv_id: &str) -> Result<Option<Paper>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut stream = table.query().only_if(&format!("arxiv_id = '{}'", escape(arxiv_id))).execute().await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_paper(&batch, 0)?));
            }
        }

        Ok(None)
    }

    /// Find all papers with a given pipeline status (C8 §4.8).
    pub async fn find_by_status(&self, status: &str) -> Result<Vec<Paper>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut stream = table.query().only_if(&format!("status = '{}'", escape(status))).execute().await?;

        let mut papers = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                papers.push(record_to_paper(&batch, i)?);
            }
        }

        Ok(papers)
    }

    /// Update a paper (upsert keyed on `id`).
    pub async fn update(&self, paper: &Paper) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let record = paper_to_record(paper)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        let mut builder = table.merge_insert(&["id"]);
        builder.when_matched_update_all(None);
        builder.execute(Box::new(iter)).await?;

        Ok(())
    }

    /// Update the pipeline status for a paper (C8 stage transitions).
    pub async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        table
            .update()
            .only_if(&format!("id = '{}'", escape(id)))
            .column("status", format!("'{}'", escape(status)))
            .execute()
            .await?;

        Ok(())
    }

    /// Delete a paper by id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;
        table.delete(&format!("id = '{}'", escape(id))).await?;
        Ok(())
    }

    /// Count total papers.
    pub async fn count(&self) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }

    /// List papers with pagination, newest first.
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Paper>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut stream = table.query().limit(limit).offset(offset).execute().await?;

        let mut papers = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                papers.push(record_to_paper(&batch, i)?);
            }
        }

        Ok(papers)
    }

    /// Resolve paper ids matching an optional tag and/or year range, so
    /// `thoth-rag`'s chunk search can narrow by filters `Chunk` rows don't
    /// carry themselves (§4.6). Year bounds are pushed into SQL; tag
    /// membership is checked in Rust since `tags` is a JSON-encoded array,
    /// not a queryable column.
    pub async fn find_ids_by_tag_and_year(&self, tag: Option<&str>, year_min: Option<i32>, year_max: Option<i32>) -> Result<Vec<String>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_PAPERS).execute().await?;

        let mut clauses = Vec::new();
        if let Some(min) = year_min {
            clauses.push(format!("year >= {min}"));
        }
        if let Some(max) = year_max {
            clauses.push(format!("year <= {max}"));
        }
        let query = table.query();
        let query = if clauses.is_empty() { query } else { query.only_if(&clauses.join(" AND ")) };
        let mut stream = query.execute().await?;

        let mut ids = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                let paper = record_to_paper(&batch, i)?;
                let matches_tag = match tag {
                    None => true,
                    Some(t) => serde_json::from_str::<Vec<String>>(&paper.tags).unwrap_or_default().iter().any(|existing| existing == t),
                };
                if matches_tag {
                    ids.push(paper.id);
                }
            }
        }

        Ok(ids)
    }
}
