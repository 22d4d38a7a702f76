//! The transactional paper upsert (§4.5 CitationGraph, steps 1-6) and the
//! startup orphan-chunk recovery scan.

use crate::repository::Repositories;
use thoth_common::error::{AppError, Result};
use thoth_db::{Chunk, Citation, Paper, ProcessingVersion};
use tracing::{info, instrument, warn};

/// Input to a single paper upsert: a new `ProcessingVersion` plus the
/// citations extracted from it and the chunks computed from its markdown.
/// `paper` carries the denormalized summary fields written alongside it.
pub struct UpsertRequest {
    pub paper: Paper,
    pub version: ProcessingVersion,
    pub citations: Vec<Citation>,
    pub chunks: Vec<Chunk>,
}

/// Orchestrates the cross-store logical transaction described in §4.5:
/// paper + version row, citations, chunk indexing, then an atomic
/// active-version flip, followed by garbage collection of the version it
/// superseded. The graph itself has no separate persisted state (§9) — step
/// 3 ("upsert graph nodes/edges") is a no-op because `neighbors` recomputes
/// the graph from `citations` on every call.
#[instrument(skip(repos, request), fields(paper_id = %request.paper.id, version = request.version.version))]
pub async fn upsert_paper(repos: &Repositories, request: UpsertRequest) -> Result<()> {
    let UpsertRequest { paper, version, citations, chunks } = request;
    let paper_id = paper.id.clone();
    let new_version = version.version;

    let previous_active = repos.versions.find_active(&paper_id).await?;

    // Step 1: paper row + new version, not yet active.
    repos.papers.update(&paper).await?;
    repos.versions.insert(&version).await?;

    // Step 2: citations for this version.
    repos.citations.replace_for_version(&paper_id, new_version, &citations).await?;

    // Step 3: graph nodes/edges mirror relational state by construction —
    // nothing to write (see module doc).

    // Step 4: chunk indexing. On failure, delete any partially written
    // chunks for this version and abort before the version is activated.
    if let Err(err) = repos.chunks.insert_batch(&chunks).await {
        warn!(paper_id = %paper_id, version = new_version, error = %err, "chunk indexing failed, rolling back new version's chunks");
        repos.chunks.delete_by_paper_version(&paper_id, new_version).await.ok();
        return Err(AppError::from(err));
    }

    // Step 5: atomic active-version flip.
    repos.versions.set_active_version(&paper_id, new_version).await?;

    // Step 6: GC chunks of the version we just superseded.
    if let Some(previous) = previous_active {
        if previous.version != new_version {
            repos.chunks.delete_by_paper_version(&paper_id, previous.version).await?;
        }
    }

    info!(paper_id = %paper_id, version = new_version, "paper upsert committed");
    Ok(())
}

/// On startup, delete any chunk whose `(paper_id, version)` does not match
/// the paper's current active version — these are the residue of a crash
/// between step 4 and step 6, or between step 4 and a failed step 5.
#[instrument(skip(repos))]
pub async fn recover_orphan_chunks(repos: &Repositories) -> Result<u64> {
    let mut deleted = 0u64;
    let total = repos.papers.count().await? as usize;
    let papers = repos.papers.list(0, total).await?;

    for paper in papers {
        let active = repos.versions.find_active(&paper.id).await?;
        let versions = repos.versions.list_for_paper(&paper.id).await?;

        for pv in versions {
            let is_active = active.as_ref().is_some_and(|a| a.version == pv.version);
            if is_active {
                continue;
            }
            let stray = repos.chunks.find_by_paper_version(&paper.id, pv.version).await?;
            if !stray.is_empty() {
                warn!(paper_id = %paper.id, version = pv.version, count = stray.len(), "deleting orphan chunks from inactive version");
                repos.chunks.delete_by_paper_version(&paper.id, pv.version).await?;
                deleted += stray.len() as u64;
            }
        }
    }

    info!(deleted, "orphan chunk recovery scan complete");
    Ok(deleted)
}
