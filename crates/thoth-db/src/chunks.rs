//! Chunk repository.
//!
//! Provides CRUD operations for indexed text chunks with hybrid vector
//! search (§3 Chunk, §4.6 RAGIndex).

use crate::database::Database;
use crate::error::Result;
use crate::schema::Chunk;
use crate::schema_arrow::{chunk_to_record, record_to_chunk};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Optional narrowing applied to a vector search, per C6 §4.6 (filter by
/// paper, tag, year or source kind before ranking).
#[derive(Debug, Clone, Default)]
pub struct ChunkSearchFilter {
    pub paper_id: Option<String>,
    pub source_kind: Option<String>,
    /// Pre-resolved paper id set for a tag or year-range filter. Chunks carry
    /// no tag/year columns of their own, so callers filtering on those
    /// (`thoth-rag`'s `search`) resolve matching paper ids first via
    /// `PaperRepository` and narrow the chunk scan with this `IN` clause.
    pub paper_ids: Option<Vec<String>>,
}

impl ChunkSearchFilter {
    fn to_sql(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(ref paper_id) = self.paper_id {
            clauses.push(format!("paper_id = '{}'", escape(paper_id)));
        }
        if let Some(ref kind) = self.source_kind {
            clauses.push(format!("source_kind = '{}'", escape(kind)));
        }
        if let Some(ref ids) = self.paper_ids {
            if ids.is_empty() {
                clauses.push("1 = 0".to_string());
            } else {
                let list = ids.iter().map(|id| format!("'{}'", escape(id))).collect::<Vec<_>>().join(", ");
                clauses.push(format!("paper_id IN ({list})"));
            }
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Repository for chunk operations.
#[derive(Clone)]
pub struct ChunkRepository {
    db: Arc<Database>,
}

impl ChunkRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new chunk.
    pub async fn insert(&self, chunk: &Chunk) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let record = chunk_to_record(chunk)?;
        let schema = record.schema();
        let iter = arrow_array::RecordBatchIterator::new(vec![Ok(record)], schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// Insert multiple chunks in bulk.
    pub async fn insert_batch(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let records: Vec<arrow_array::RecordBatch> = chunks.iter().map(chunk_to_record).collect::<Result<_>>()?;

        let schema = records[0].schema();
        let iter = arrow_array::RecordBatchIterator::new(records.into_iter().map(Ok), schema);

        table.add(iter).execute().await?;
        Ok(())
    }

    /// Find a chunk by id.
    pub async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let mut stream = table.query().only_if(&format!("id = '{}'", id)).execute().await?;

        if let Some(batch) = stream.next().await {
            let batch = batch?;
            if batch.num_rows() > 0 {
                return Ok(Some(record_to_chunk(&batch, 0)?));
            }
        }

        Ok(None)
    }

    /// Find all chunks for a specific processing version of a paper, in
    /// `ordinal` order within the stream.
    pub async fn find_by_paper_version(&self, paper_id: &str, processing_version: i64) -> Result<Vec<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let mut stream = table
            .query()
            .only_if(&format!("paper_id = '{}' AND processing_version = {}", escape(paper_id), processing_version))
            .execute()
            .await?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }
        chunks.sort_by_key(|c| c.ordinal);

        Ok(chunks)
    }

    /// Delete all chunks belonging to a specific processing version. Used by
    /// C5's garbage collection step when a version is superseded.
    pub async fn delete_by_paper_version(&self, paper_id: &str, processing_version: i64) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        table
            .delete(&format!("paper_id = '{}' AND processing_version = {}", escape(paper_id), processing_version))
            .await?;
        Ok(())
    }

    /// Delete a chunk by id.
    pub async fn delete(&self, id: uuid::Uuid) -> Result<()> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        table.delete(&format!("id = '{}'", id)).await?;
        Ok(())
    }

    /// Count total chunks.
    pub async fn count(&self) -> Result<u64> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;
        Ok(table.count_rows(None).await? as u64)
    }

    /// List chunks with pagination.
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let mut stream = table.query().limit(limit).offset(offset).execute().await?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }

        Ok(chunks)
    }

    /// Dense vector search over the `embedding` column, the first leg of
    /// C6's hybrid dense+lexical RRF fusion.
    pub async fn search_similar(&self, query_vector: &[f32], k: usize) -> Result<Vec<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let mut stream = table.vector_search(query_vector.to_vec())?.limit(k).execute().await?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }

        Ok(chunks)
    }

    /// Dense vector search narrowed by a `ChunkSearchFilter` (C6 §4.6).
    pub async fn search_similar_filtered(&self, query_vector: &[f32], k: usize, filter: &ChunkSearchFilter) -> Result<Vec<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let mut query = table.vector_search(query_vector.to_vec())?.limit(k);
        if let Some(sql) = filter.to_sql() {
            query = query.only_if(&sql);
        }
        let mut stream = query.execute().await?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }

        Ok(chunks)
    }

    /// Plain (non-vector) scan narrowed by a `ChunkSearchFilter` — the
    /// candidate pool for C6's lexical leg, since LanceDB has no full-text
    /// index wired in here; BM25-style scoring over this pool happens in
    /// `thoth-rag`.
    pub async fn find_by_filter(&self, filter: &ChunkSearchFilter, limit: usize) -> Result<Vec<Chunk>> {
        let table = self.db.connection().open_table(crate::schema::TABLE_CHUNKS).execute().await?;

        let query = table.query().limit(limit);
        let query = match filter.to_sql() {
            Some(sql) => query.only_if(&sql),
            None => query,
        };
        let mut stream = query.execute().await?;

        let mut chunks = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch?;
            for i in 0..batch.num_rows() {
                chunks.push(record_to_chunk(&batch, i)?);
            }
        }

        Ok(chunks)
    }

    /// Replace the embedding for a chunk. LanceDB has no in-place column
    /// update for vector fields, so this deletes and reinserts.
    pub async fn update_embedding(&self, chunk_id: uuid::Uuid, embedding: Vec<f32>) -> Result<()> {
        let mut existing =
            self.find_by_id(chunk_id).await?.ok_or_else(|| crate::error::DbError::NotFound(format!("chunk {chunk_id} not found")))?;

        self.delete(chunk_id).await?;

        existing.embedding = Some(embedding);
        self.insert(&existing).await?;
        Ok(())
    }
}
