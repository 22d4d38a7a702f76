//! Research query repository (§3 ResearchQuery, C10 ResearchQueryFilter).
//!
//! Consulted read-only by `thoth-ranker`'s `ResearchQueryFilter`; mutated
//! only through this repository's own operations.

use crate::database::Database;
use crate::error::Result;
use crate::schema::ResearchQuery;
use crate::schema_arrow::{record_to_research_query, research_query_to_record};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[derive(Clone)]
pub struct ResearchQueryRepository {
    db: Arc<Database>,
}

impl ResearchQueryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn insert(&self, query: &ResearchQuery) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_RESEARCH_QUERIES).execute().await?;

        let record = research_query_to_record(query)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// `name` is unique; callers should check this before `insert`.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ResearchQuery>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_RESEARCH_QUERIES).execute().await?;

        let mut stream = table.query().only_if(&format!("name = '{}'", escape(name))).execute().await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_research_query(&batch, 0)?));
            }
        }

        Ok(None)
    }

    pub async fn list(&self) -> Result<Vec<ResearchQuery>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_RESEARCH_QUERIES).execute().await?;

        let mut stream = table.query().execute().await?;

        let mut queries = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                queries.push(record_to_research_query(&batch, i)?);
            }
        }

        Ok(queries)
    }

    pub async fn update(&self, query: &ResearchQuery) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_RESEARCH_QUERIES).execute().await?;

        let record = research_query_to_record(query)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        let mut builder = table.merge_insert(&["id"]);
        builder.when_matched_update_all(None);
        builder.execute(Box::new(iter)).await?;

        Ok(())
    }

    pub async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_RESEARCH_QUERIES).execute().await?;
        table.delete(&format!("id = '{}'", id)).await?;
        Ok(())
    }
}
