//! CitationResolver (C3, §4.3): turns a raw LLM-extracted citation into a
//! link to a known paper. Tries DOI → OpenAlex → arXiv → local fuzzy match,
//! in that order, falling back to unresolved. Each external stage's failure
//! is a "stage miss" — logged and skipped, never a resolver abort.

pub mod arxiv;
pub mod doi;
pub mod fuzzy;
pub mod openalex;

use std::sync::Arc;

use thoth_common::cache::CacheStore;
use thoth_common::gateway::Gateway;
use thoth_db::ResolverStage;
use thoth_kg::Repositories;
use tracing::debug;

use crate::models::RawCitation;

/// Outcome of resolving one raw citation, ready to merge into a `Citation`
/// row (§3 Citation).
#[derive(Debug, Clone)]
pub struct ResolvedCitation {
    pub resolved_doi: Option<String>,
    pub resolved_arxiv_id: Option<String>,
    pub cited_paper_id: Option<String>,
    pub confidence: f32,
    pub stage: ResolverStage,
}

impl ResolvedCitation {
    fn unresolved() -> Self {
        Self { resolved_doi: None, resolved_arxiv_id: None, cited_paper_id: None, confidence: 0.0, stage: ResolverStage::Unresolved }
    }
}

pub struct CitationResolver<S: CacheStore> {
    gateway: Arc<Gateway<S>>,
    repos: Repositories,
    contact_email: Option<String>,
}

impl<S: CacheStore + Send + Sync + 'static> CitationResolver<S> {
    pub async fn new(gateway: Arc<Gateway<S>>, repos: Repositories, contact_email: Option<String>) -> Self {
        doi::register_service(&gateway).await;
        openalex::register_service(&gateway).await;
        arxiv::register_service(&gateway).await;
        Self { gateway, repos, contact_email }
    }

    /// Resolve one raw citation through the full chain (§4.3).
    pub async fn resolve(&self, raw: &RawCitation) -> ResolvedCitation {
        if let Some(doi) = doi::extract_doi(&raw.citation_text) {
            match doi::lookup(&self.gateway, &doi, raw.extracted_title.as_deref(), raw.extracted_year).await {
                Ok(Some(candidate)) => {
                    return self.link_to_local(candidate.doi.as_deref(), candidate.arxiv_id.as_deref(), ResolverStage::Doi, 1.0).await;
                }
                Ok(None) => {}
                Err(err) => debug!(error = %err, "doi stage miss"),
            }
        }

        if let Some(title) = raw.extracted_title.as_deref() {
            match openalex::lookup(&self.gateway, title, raw.extracted_year, self.contact_email.as_deref()).await {
                Ok(Some(candidate)) => {
                    return self.link_to_local(candidate.doi.as_deref(), candidate.arxiv_id.as_deref(), ResolverStage::Openalex, 1.0).await;
                }
                Ok(None) => {}
                Err(err) => debug!(error = %err, "openalex stage miss"),
            }

            match arxiv::lookup(&self.gateway, &raw.citation_text, title).await {
                Ok(Some(candidate)) => {
                    return self.link_to_local(candidate.doi.as_deref(), candidate.arxiv_id.as_deref(), ResolverStage::Arxiv, 1.0).await;
                }
                Ok(None) => {}
                Err(err) => debug!(error = %err, "arxiv stage miss"),
            }
        }

        match self.fuzzy_resolve(raw).await {
            Some((paper_id, score)) => ResolvedCitation { resolved_doi: None, resolved_arxiv_id: None, cited_paper_id: Some(paper_id), confidence: score, stage: ResolverStage::Fuzzy },
            None => ResolvedCitation::unresolved(),
        }
    }

    /// An external stage found metadata (DOI/arXiv id); see whether that
    /// identifier already belongs to a paper in our own graph.
    async fn link_to_local(&self, doi: Option<&str>, arxiv_id: Option<&str>, stage: ResolverStage, confidence: f32) -> ResolvedCitation {
        let cited_paper_id = if let Some(doi) = doi {
            self.repos.papers.find_by_doi(doi).await.ok().flatten().map(|p| p.id)
        } else {
            None
        };
        let cited_paper_id = match cited_paper_id {
            Some(id) => Some(id),
            None => match arxiv_id {
                Some(id) => self.repos.papers.find_by_arxiv_id(id).await.ok().flatten().map(|p| p.id),
                None => None,
            },
        };

        ResolvedCitation { resolved_doi: doi.map(str::to_string), resolved_arxiv_id: arxiv_id.map(str::to_string), cited_paper_id, confidence, stage }
    }

    /// Compare against every known paper. Assumes the local graph is small
    /// enough (a personal research library, not a public corpus) to scan in
    /// one page; revisit with a real index if that stops holding.
    async fn fuzzy_resolve(&self, raw: &RawCitation) -> Option<(String, f32)> {
        let title = raw.extracted_title.as_deref()?;
        let papers = self.repos.papers.list(0, 5000).await.ok()?;
        let scored = papers.into_iter().map(|p| {
            let s = fuzzy::score(title, raw.extracted_year, raw.extracted_venue.as_deref(), &raw.extracted_authors, &p);
            (p, s)
        }).collect();
        fuzzy::pick_best(scored)
    }
}
