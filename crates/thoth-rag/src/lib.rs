//! thoth-rag — RAGIndex (C6): hybrid vector+lexical retrieval and
//! citation-grounded question answering over ingested chunks.

pub mod ask;
pub mod indexer;
pub mod search;

pub use ask::{AskAnswer, Asker, SourceRef};
pub use indexer::RagChunkIndexer;
pub use search::{cosine_similarity, RagSearch, ScoredChunk, SearchFilters};
