//! Thoth Database Layer
//!
//! Embedded relational + vector storage over LanceDB for papers, processing
//! versions, citations, chunks, cache entries, and research queries. No
//! external database server required.
//!
//! # Example
//!
//! ```rust,no_run
//! use thoth_db::{Database, PaperRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open("./data/thoth.db").await?;
//!     db.initialize().await?;
//!
//!     let papers = PaperRepository::new(std::sync::Arc::new(db));
//!
//!     Ok(())
//! }
//! ```

pub mod cache_entries;
pub mod chunks;
pub mod citations;
pub mod database;
pub mod error;
pub mod papers;
pub mod processing_versions;
pub mod research_queries;
pub mod schema;
pub mod schema_arrow;

pub use cache_entries::CacheEntryRepository;
pub use chunks::{ChunkRepository, ChunkSearchFilter};
pub use citations::CitationRepository;
pub use database::{Database, DatabaseStats};
pub use error::{DbError, Result};
pub use papers::PaperRepository;
pub use processing_versions::ProcessingVersionRepository;
pub use research_queries::ResearchQueryRepository;
pub use schema::{
    CacheEntryRow, Chunk, Citation, Paper, ProcessingVersion, ResearchQuery, ResolverStage, SourceKind, EMBEDDING_DIM, TABLE_CACHE_ENTRIES,
    TABLE_CHUNKS, TABLE_CITATIONS, TABLE_PAPERS, TABLE_PROCESSING_VERSIONS, TABLE_RESEARCH_QUERIES,
};
