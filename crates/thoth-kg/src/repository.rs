//! Thin repository facade over `thoth-db`'s paper/version/citation tables.
//!
//! `CitationGraph` (in `upsert`/`graph`) is the only caller that should need
//! cross-table orchestration; this module just gives it one place to reach
//! the underlying repositories without threading `Arc<Database>` everywhere.

use std::sync::Arc;
use thoth_db::{
    ChunkRepository, CitationRepository, Database, PaperRepository, ProcessingVersionRepository,
};

#[derive(Clone)]
pub struct Repositories {
    pub papers: PaperRepository,
    pub versions: ProcessingVersionRepository,
    pub citations: CitationRepository,
    pub chunks: ChunkRepository,
}

impl Repositories {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            papers: PaperRepository::new(db.clone()),
            versions: ProcessingVersionRepository::new(db.clone()),
            citations: CitationRepository::new(db.clone()),
            chunks: ChunkRepository::new(db),
        }
    }
}
