//! Database connection and table management.
//!
//! Provides a unified interface for LanceDB operations.

use crate::error::Result;
use crate::schema;
use crate::schema_arrow;
use arrow_array::RecordBatchIterator;
use lancedb::connection::Connection;
use std::path::Path;

/// Main database handle.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Open or create a database at the specified path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        if !path.as_ref().exists() {
            std::fs::create_dir_all(path.as_ref())?;
        }

        let conn = lancedb::connect(&path_str).execute().await?;

        Ok(Self { conn, path: path_str })
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Initialize all tables with schemas.
    ///
    /// This creates the tables if they don't exist.
    /// LanceDB requires initial data (or at least a schema) to create a table.
    pub async fn initialize(&self) -> Result<()> {
        if !self.table_exists(schema::TABLE_PAPERS).await? {
            self.create_papers_table().await?;
        }
        if !self.table_exists(schema::TABLE_PROCESSING_VERSIONS).await? {
            self.create_processing_versions_table().await?;
        }
        if !self.table_exists(schema::TABLE_CITATIONS).await? {
            self.create_citations_table().await?;
        }
        if !self.table_exists(schema::TABLE_CHUNKS).await? {
            self.create_chunks_table().await?;
        }
        if !self.table_exists(schema::TABLE_CACHE_ENTRIES).await? {
            self.create_cache_entries_table().await?;
        }
        if !self.table_exists(schema::TABLE_RESEARCH_QUERIES).await? {
            self.create_research_queries_table().await?;
        }

        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let tables = self.conn.table_names().execute().await?;
        Ok(tables.contains(&name.to_string()))
    }

    async fn create_papers_table(&self) -> Result<()> {
        let schema = schema_arrow::paper_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_PAPERS, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_processing_versions_table(&self) -> Result<()> {
        let schema = schema_arrow::processing_version_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_PROCESSING_VERSIONS, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_citations_table(&self) -> Result<()> {
        let schema = schema_arrow::citation_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_CITATIONS, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_chunks_table(&self) -> Result<()> {
        let schema = schema_arrow::chunk_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_CHUNKS, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_cache_entries_table(&self) -> Result<()> {
        let schema = schema_arrow::cache_entry_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_CACHE_ENTRIES, empty_iter).execute().await?;
        Ok(())
    }

    async fn create_research_queries_table(&self) -> Result<()> {
        let schema = schema_arrow::research_query_schema();
        let empty_iter = RecordBatchIterator::new(vec![], schema);
        self.conn.create_table(schema::TABLE_RESEARCH_QUERIES, empty_iter).execute().await?;
        Ok(())
    }

    /// Create a vector index on the chunks table for embedding search.
    pub async fn create_vector_index(&self) -> Result<()> {
        let table = self.conn.open_table(schema::TABLE_CHUNKS).execute().await?;

        table.create_index(&["embedding"], lancedb::index::Index::Auto).execute().await?;

        Ok(())
    }

    /// Optimize all tables.
    pub async fn optimize(&self) -> Result<()> {
        let tables = self.conn.table_names().execute().await?;

        for table_name in tables {
            let table = self.conn.open_table(&table_name).execute().await?;
            table.optimize(lancedb::table::OptimizeAction::default()).await?;
        }

        Ok(())
    }

    /// Get table statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let count_of = |name: &str| async move {
            if self.table_exists(name).await? {
                let table = self.conn.open_table(name).execute().await?;
                Result::Ok(table.count_rows(None).await? as u64)
            } else {
                Result::Ok(0)
            }
        };

        Ok(DatabaseStats {
            papers: count_of(schema::TABLE_PAPERS).await?,
            processing_versions: count_of(schema::TABLE_PROCESSING_VERSIONS).await?,
            citations: count_of(schema::TABLE_CITATIONS).await?,
            chunks: count_of(schema::TABLE_CHUNKS).await?,
            cache_entries: count_of(schema::TABLE_CACHE_ENTRIES).await?,
            research_queries: count_of(schema::TABLE_RESEARCH_QUERIES).await?,
        })
    }
}

/// Database statistics.
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub papers: u64,
    pub processing_versions: u64,
    pub citations: u64,
    pub chunks: u64,
    pub cache_entries: u64,
    pub research_queries: u64,
}
