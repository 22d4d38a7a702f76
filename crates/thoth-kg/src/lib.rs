//! thoth-kg — CitationGraph (C5): persistent directed graph of papers and
//! citations with cross-store consistency across the relational, graph, and
//! vector legs (§4.5).

pub mod graph;
pub mod repository;
pub mod upsert;

use std::sync::Arc;
use thoth_common::error::Result;
use thoth_db::{Citation, Database, Paper};

pub use graph::{Direction, NeighborHit};
pub use repository::Repositories;
pub use upsert::{recover_orphan_chunks, upsert_paper, UpsertRequest};

/// Facade combining the repositories and orchestration functions that
/// together implement C5's contract.
#[derive(Clone)]
pub struct CitationGraph {
    repos: Repositories,
}

impl CitationGraph {
    pub fn new(db: Arc<Database>) -> Self {
        Self { repos: Repositories::new(db) }
    }

    /// Runs the full 6-step transactional upsert (§4.5).
    pub async fn upsert_paper(&self, request: UpsertRequest) -> Result<()> {
        upsert_paper(&self.repos, request).await
    }

    /// Replaces citation edges for `(citing_id, version)`.
    pub async fn add_citations(&self, citing_id: &str, version: i64, citations: Vec<Citation>) -> Result<()> {
        self.repos.citations.replace_for_version(citing_id, version, &citations).await?;
        Ok(())
    }

    /// Atomically deactivates other versions and activates `version`.
    pub async fn set_active_version(&self, paper_id: &str, version: i64) -> Result<()> {
        self.repos.versions.set_active_version(paper_id, version).await?;
        Ok(())
    }

    pub async fn get_paper(&self, paper_id: &str) -> Result<Option<Paper>> {
        Ok(self.repos.papers.find_by_id(paper_id).await?)
    }

    pub async fn list_papers(&self, offset: usize, limit: usize) -> Result<Vec<Paper>> {
        Ok(self.repos.papers.list(offset, limit).await?)
    }

    pub async fn neighbors(&self, paper_id: &str, direction: Direction, depth: u32) -> Result<Vec<NeighborHit>> {
        graph::neighbors(&self.repos, paper_id, direction, depth).await
    }

    /// Startup recovery scan for chunks left behind by a crash between
    /// commit steps (§4.5 Recovery).
    pub async fn recover_orphan_chunks(&self) -> Result<u64> {
        recover_orphan_chunks(&self.repos).await
    }
}
