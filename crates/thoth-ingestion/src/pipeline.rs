//! DocumentPipeline (C8, §4.8): turns one intake PDF into an activated,
//! indexed paper version.
//!
//! Stages 1-2 run sequentially (each depends on the previous artifact).
//! Stages 3 (analysis) and 4 (citation extraction) run concurrently against
//! the same no-images markdown — independent work, no reason to serialize
//! it. Stage 5 resolves each raw citation. Stages 6-8 (note render, chunk
//! index, graph upsert) are bundled into a single call to
//! `thoth_kg::upsert_paper`, which already commits the paper row, citations,
//! chunks, and the active-version flip as one transaction (§4.5) — so this
//! pipeline's "graph update" and "activate" stages are the same call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thoth_common::cache::{CacheStore, ContentCache};
use thoth_common::gateway::Gateway;
use thoth_common::lexical::lexical_tokens;
use thoth_common::splitter::{split_markdown, SplitterConfig};
use thoth_config::DataClassification;
use thoth_db::{Chunk, Citation, Database, Paper, ProcessingVersion, SourceKind};
use thoth_kg::{CitationGraph, Repositories, UpsertRequest};
use thoth_llm::LlmRouter;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::analysis::{self, AnalysisEngineConfig};
use crate::citations;
use crate::docling::DoclingClient;
use crate::models::{AnalysisRecord, RawCitation};
use crate::pdf::{self, normalize_pdf};
use crate::resolve::{CitationResolver, ResolvedCitation};

/// Stage 7 hook (§4.7 NoteRenderer): produces the markdown note a user
/// reads. A trait, not a direct dependency on `thoth-notes`, so this crate
/// doesn't need that one's concrete API finalized to run end-to-end.
#[async_trait]
pub trait NoteRenderer: Send + Sync {
    async fn render(&self, paper: &Paper, analysis: &AnalysisRecord, citations: &[Citation]) -> anyhow::Result<String>;
}

/// Stage 8 hook (§4.6 RAGIndex): chunks and embeds a document's markdown
/// and rendered note into the rows `ChunkRepository` stores.
#[async_trait]
pub trait ChunkIndexer: Send + Sync {
    async fn index(&self, paper_id: &str, version: i64, markdown_no_images: &str, note_markdown: &str) -> anyhow::Result<Vec<Chunk>>;
}

/// Minimal note renderer used until `thoth-notes` is wired in: a title plus
/// the analysis summary, enough for the pipeline to exercise end-to-end.
pub struct PlaceholderNoteRenderer;

#[async_trait]
impl NoteRenderer for PlaceholderNoteRenderer {
    async fn render(&self, paper: &Paper, analysis: &AnalysisRecord, _citations: &[Citation]) -> anyhow::Result<String> {
        Ok(format!("# {}\n\n{}\n", paper.title, analysis.summary))
    }
}

/// Chunks markdown with `thoth-common`'s splitter but leaves `embedding`
/// unset — used until `thoth-rag`/`thoth-embed` are wired in. Lexical
/// search still works against these rows; vector search does not.
pub struct LexicalOnlyChunkIndexer;

#[async_trait]
impl ChunkIndexer for LexicalOnlyChunkIndexer {
    async fn index(&self, paper_id: &str, version: i64, markdown_no_images: &str, note_markdown: &str) -> anyhow::Result<Vec<Chunk>> {
        let config = SplitterConfig::rag_default();
        let mut chunks = Vec::new();
        for (ordinal, piece) in split_markdown(markdown_no_images, &config).into_iter().enumerate() {
            let mut chunk = Chunk::new(paper_id.to_string(), version, SourceKind::PaperBody, ordinal as i64, piece.text);
            chunk.section_heading = piece.heading_path.last().cloned();
            chunk.lexical_tokens = serde_json::to_string(&lexical_tokens(&chunk.text)).unwrap_or_else(|_| "[]".to_string());
            chunks.push(chunk);
        }
        for (ordinal, piece) in split_markdown(note_markdown, &config).into_iter().enumerate() {
            let mut chunk = Chunk::new(paper_id.to_string(), version, SourceKind::GeneratedNote, ordinal as i64, piece.text);
            chunk.section_heading = piece.heading_path.last().cloned();
            chunk.lexical_tokens = serde_json::to_string(&lexical_tokens(&chunk.text)).unwrap_or_else(|_| "[]".to_string());
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}

/// Progress event emitted at every stage transition (§4.8 supplemental), so a
/// future HTTP/MCP layer can stream ingestion status. Cloneable for
/// broadcast, mirroring the teacher's own `IngestionProgress` shape.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionProgress {
    pub paper_id: String,
    pub stage: String,
    pub message: String,
    pub citations_resolved: usize,
    pub chunks_indexed: usize,
    pub error: Option<String>,
}

impl IngestionProgress {
    fn new(paper_id: &str, stage: &str, message: impl Into<String>) -> Self {
        Self { paper_id: paper_id.to_string(), stage: stage.to_string(), message: message.into(), citations_resolved: 0, chunks_indexed: 0, error: None }
    }

    fn failed(paper_id: &str, stage: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self { paper_id: paper_id.to_string(), stage: stage.to_string(), message: format!("{stage} failed"), citations_resolved: 0, chunks_indexed: 0, error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A new version was upserted and activated.
    Activated { paper_id: String, version: i64, partial_analysis: bool },
    /// This exact PDF content is already ingested; nothing to do.
    AlreadyCurrent { paper_id: String },
    /// A fatal stage failed; the document was not touched (§4.8 failure taxonomy).
    Failed { reason: String },
}

pub struct DocumentPipeline<S: CacheStore> {
    docling: DoclingClient,
    router: Arc<LlmRouter>,
    cache: Arc<ContentCache<S>>,
    analysis_config: AnalysisEngineConfig,
    resolver: CitationResolver<S>,
    graph: CitationGraph,
    repos: Repositories,
    vault_path: PathBuf,
    note_renderer: Arc<dyn NoteRenderer>,
    chunk_indexer: Arc<dyn ChunkIndexer>,
    /// Bounds concurrent documents in `ingest_many` to `min(cpu, 4)` (§4.8).
    worker_permits: Arc<tokio::sync::Semaphore>,
    progress_tx: broadcast::Sender<IngestionProgress>,
}

impl<S: CacheStore + Send + Sync + 'static> DocumentPipeline<S> {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        db: Arc<Database>,
        gateway: Arc<Gateway<S>>,
        docling: DoclingClient,
        router: Arc<LlmRouter>,
        cache: Arc<ContentCache<S>>,
        vault_path: PathBuf,
        contact_email: Option<String>,
        note_renderer: Arc<dyn NoteRenderer>,
        chunk_indexer: Arc<dyn ChunkIndexer>,
    ) -> Self {
        let repos = Repositories::new(db.clone());
        let resolver = CitationResolver::new(gateway, repos.clone(), contact_email).await;
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            docling,
            router,
            cache,
            analysis_config: AnalysisEngineConfig::default(),
            resolver,
            graph: CitationGraph::new(db),
            repos,
            vault_path,
            note_renderer,
            chunk_indexer,
            worker_permits: Arc::new(tokio::sync::Semaphore::new(worker_count())),
            progress_tx,
        }
    }

    /// Subscribe to stage-transition events for every document this pipeline
    /// ingests. Lagging subscribers miss events rather than block ingestion.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestionProgress> {
        self.progress_tx.subscribe()
    }

    fn emit(&self, event: IngestionProgress) {
        let _ = self.progress_tx.send(event);
    }

    /// Ingest one PDF end to end.
    pub async fn ingest_one(&self, pdf_path: &Path, class: DataClassification) -> IngestOutcome {
        // Stage 1: normalize + idempotency check.
        let normalized = match normalize_pdf(pdf_path) {
            Ok(n) => n,
            Err(err) => {
                self.emit(IngestionProgress::failed("unknown", "normalize", err.to_string()));
                return IngestOutcome::Failed { reason: format!("stage 1 (normalize) failed: {err}") };
            }
        };
        let paper_id = pdf::derive_paper_id(None, None, &normalized.content_hash);
        self.emit(IngestionProgress::new(&paper_id, "normalize", "content hash computed"));

        match self.graph.get_paper(&paper_id).await {
            Ok(Some(_)) => {
                self.emit(IngestionProgress::new(&paper_id, "normalize", "already current, skipping"));
                return IngestOutcome::AlreadyCurrent { paper_id };
            }
            Ok(None) => {}
            Err(err) => {
                self.emit(IngestionProgress::failed(&paper_id, "normalize", err.to_string()));
                return IngestOutcome::Failed { reason: format!("stage 1 (lookup) failed: {err}") };
            }
        }

        // Stage 2: OCR/markdown extraction. Fatal on failure (§4.8).
        self.emit(IngestionProgress::new(&paper_id, "ocr", "extracting markdown"));
        let variants = match self.docling.parse_pdf(&normalized.absolute_path).await {
            Ok(v) => v,
            Err(err) => {
                self.emit(IngestionProgress::failed(&paper_id, "ocr", err.to_string()));
                return IngestOutcome::Failed { reason: format!("stage 2 (docling) failed: {err}") };
            }
        };

        // Stages 3 & 4: independent, run concurrently.
        self.emit(IngestionProgress::new(&paper_id, "analysis", "analyzing and extracting citations"));
        let (analysis_outcome, raw_citations) = tokio::join!(
            analysis::analyze(&self.router, &self.cache, &variants.no_images, class, &self.analysis_config),
            citations::extract_citations(&self.router, &variants.no_images, class)
        );

        // Stage 5: resolve each raw citation; a per-citation failure is a
        // stage miss handled inside the resolver, never propagated here.
        self.emit(IngestionProgress::new(&paper_id, "resolve", format!("resolving {} citations", raw_citations.len())));
        let mut resolutions = Vec::with_capacity(raw_citations.len());
        for raw in &raw_citations {
            resolutions.push(self.resolver.resolve(raw).await);
        }
        let citation_rows = dedupe_and_build(&raw_citations, resolutions, &paper_id, 1);
        self.emit({
            let mut p = IngestionProgress::new(&paper_id, "resolve", format!("{} distinct citations after dedup", citation_rows.len()));
            p.citations_resolved = citation_rows.len();
            p
        });

        let version_number = self.repos.versions.count_for_paper(&paper_id).await.unwrap_or(0) as i64 + 1;
        let title = extract_title(&variants.with_images).unwrap_or_else(|| pdf_path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled").to_string());

        let mut paper = Paper::new(paper_id.clone(), title, normalized.absolute_path.to_string_lossy().to_string());
        paper.analysis = serde_json::to_string(&analysis_outcome.record).ok();
        paper.llm_model_used = self.router.model_id(class).ok();
        paper.processing_version = version_number;
        paper.status = if analysis_outcome.partial { "partial".to_string() } else { "complete".to_string() };

        let (markdown_with_images_path, markdown_no_images_path) = match self.persist_markdown(&paper_id, version_number, &variants.with_images, &variants.no_images) {
            Ok(paths) => paths,
            Err(err) => {
                self.emit(IngestionProgress::failed(&paper_id, "persist", err.to_string()));
                return IngestOutcome::Failed { reason: format!("writing markdown to vault failed: {err}") };
            }
        };
        paper.markdown_path_with_images = Some(markdown_with_images_path);
        paper.markdown_path_no_images = Some(markdown_no_images_path);

        // Stage 7: render the note. A rendering failure is non-fatal — the
        // paper still gets indexed and activated, just without a note body.
        self.emit(IngestionProgress::new(&paper_id, "render", "rendering note"));
        let note_markdown = match self.note_renderer.render(&paper, &analysis_outcome.record, &citation_rows).await {
            Ok(md) => match self.persist_note(&paper_id, version_number, &md) {
                Ok(path) => {
                    paper.note_path = Some(path);
                    md
                }
                Err(err) => {
                    warn!(paper_id = %paper_id, error = %err, "writing note to vault failed, proceeding without a note");
                    self.emit(IngestionProgress::failed(&paper_id, "render", err.to_string()));
                    md
                }
            },
            Err(err) => {
                warn!(paper_id = %paper_id, error = %err, "note rendering failed, proceeding without a note");
                self.emit(IngestionProgress::failed(&paper_id, "render", err.to_string()));
                String::new()
            }
        };

        // Stage 8: chunk + embed. Failure here is fatal — no activation
        // without a searchable index (§4.8 failure taxonomy).
        self.emit(IngestionProgress::new(&paper_id, "index", "chunking and indexing"));
        let chunks = match self.chunk_indexer.index(&paper_id, version_number, &variants.no_images, &note_markdown).await {
            Ok(c) => c,
            Err(err) => {
                self.emit(IngestionProgress::failed(&paper_id, "index", err.to_string()));
                return IngestOutcome::Failed { reason: format!("stage 8 (indexing) failed: {err}") };
            }
        };
        self.emit({
            let mut p = IngestionProgress::new(&paper_id, "index", format!("{} chunks indexed", chunks.len()));
            p.chunks_indexed = chunks.len();
            p
        });

        let llm_model = paper.llm_model_used.clone().unwrap_or_default();
        let mut version = ProcessingVersion::new(paper_id.clone(), version_number, llm_model, variants.no_images.clone());
        version.analysis = paper.analysis.clone();

        // Stage 6/9: graph update + activation, committed together.
        match self.graph.upsert_paper(UpsertRequest { paper, version, citations: citation_rows, chunks }).await {
            Ok(()) => {
                info!(paper_id = %paper_id, version = version_number, "document ingested and activated");
                self.emit(IngestionProgress::new(&paper_id, "activate", format!("version {version_number} activated")));
                IngestOutcome::Activated { paper_id, version: version_number, partial_analysis: analysis_outcome.partial }
            }
            Err(err) => {
                error!(paper_id = %paper_id, error = %err, "graph update failed, will retry on next pass");
                self.emit(IngestionProgress::failed(&paper_id, "activate", err.to_string()));
                IngestOutcome::Failed { reason: format!("stage 6/9 (graph upsert) failed: {err}") }
            }
        }
    }

    /// Ingest a batch of PDFs, bounding concurrency to `min(cpu, 4)`. One
    /// document's failure doesn't stop the others (§4.8 per-document
    /// failure isolation).
    pub async fn ingest_many(self: &Arc<Self>, pdf_paths: Vec<PathBuf>, class: DataClassification) -> Vec<(PathBuf, IngestOutcome)> {
        let mut handles = Vec::with_capacity(pdf_paths.len());
        for path in pdf_paths {
            let pipeline = Arc::clone(self);
            let permits = Arc::clone(&pipeline.worker_permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore never closed");
                let outcome = pipeline.ingest_one(&path, class).await;
                (path, outcome)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_err) => {
                    error!(error = %join_err, "ingestion task panicked");
                }
            }
        }
        results
    }

    fn persist_markdown(&self, paper_id: &str, version: i64, with_images: &str, no_images: &str) -> std::io::Result<(String, String)> {
        let dir = self.vault_path.join(paper_id).join(format!("v{version}"));
        std::fs::create_dir_all(&dir)?;
        let with_images_path = dir.join("with_images.md");
        let no_images_path = dir.join("no_images.md");
        std::fs::write(&with_images_path, with_images)?;
        std::fs::write(&no_images_path, no_images)?;
        Ok((with_images_path.to_string_lossy().to_string(), no_images_path.to_string_lossy().to_string()))
    }

    /// Persists C7's rendered note as its own vault artifact (§6: "note
    /// markdown file" alongside the with-/no-images markdown).
    fn persist_note(&self, paper_id: &str, version: i64, note_markdown: &str) -> std::io::Result<String> {
        let dir = self.vault_path.join(paper_id).join(format!("v{version}"));
        std::fs::create_dir_all(&dir)?;
        let note_path = dir.join("note.md");
        std::fs::write(&note_path, note_markdown)?;
        Ok(note_path.to_string_lossy().to_string())
    }
}

fn worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(4)
}

fn extract_title(markdown_with_images: &str) -> Option<String> {
    markdown_with_images.lines().find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()))
}

/// Build `Citation` rows from raw/resolved pairs, collapsing duplicates that
/// resolve to the same paper/DOI/arXiv id, or — when unresolved — share a
/// normalized title and year. Keeps the highest-confidence entry per key
/// (§4.3 dedup rule).
fn dedupe_and_build(raws: &[RawCitation], resolutions: Vec<ResolvedCitation>, citing_paper_id: &str, citing_version: i64) -> Vec<Citation> {
    use std::collections::HashMap;
    let mut by_key: HashMap<String, Citation> = HashMap::new();

    for (raw, resolved) in raws.iter().zip(resolutions.into_iter()) {
        let mut citation = Citation::new(citing_paper_id.to_string(), citing_version, raw.citation_text.clone());
        citation.extracted_title = raw.extracted_title.clone();
        citation.extracted_authors = serde_json::to_string(&raw.extracted_authors).unwrap_or_else(|_| "[]".to_string());
        citation.extracted_year = raw.extracted_year;
        citation.extracted_venue = raw.extracted_venue.clone();
        citation.is_influential = raw.is_influential;
        citation.resolved_doi = resolved.resolved_doi.clone();
        citation.resolved_arxiv_id = resolved.resolved_arxiv_id.clone();
        citation.cited_paper_id = resolved.cited_paper_id.clone();
        citation.confidence = resolved.confidence;
        citation.resolver_stage = resolved.stage.to_string();

        let key = if let Some(id) = &resolved.cited_paper_id {
            format!("paper:{id}")
        } else if let Some(doi) = &resolved.resolved_doi {
            format!("doi:{}", pdf::normalize_doi(doi))
        } else if let Some(arxiv_id) = &resolved.resolved_arxiv_id {
            format!("arxiv:{arxiv_id}")
        } else {
            let title = raw.extracted_title.as_deref().unwrap_or(&raw.citation_text);
            format!("unresolved:{}:{}", normalize_for_dedupe(title), raw.extracted_year.map(|y| y.to_string()).unwrap_or_default())
        };

        by_key
            .entry(key)
            .and_modify(|existing| {
                if citation.confidence > existing.confidence {
                    *existing = citation.clone();
                }
            })
            .or_insert(citation);
    }

    by_key.into_values().collect()
}

fn normalize_for_dedupe(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use thoth_db::ResolverStage;

    fn raw(text: &str, title: Option<&str>, year: Option<i32>) -> RawCitation {
        RawCitation { citation_text: text.to_string(), extracted_title: title.map(str::to_string), extracted_authors: vec![], extracted_year: year, extracted_venue: None, is_influential: false }
    }

    fn resolved(paper_id: Option<&str>, confidence: f32, stage: ResolverStage) -> ResolvedCitation {
        ResolvedCitation { resolved_doi: None, resolved_arxiv_id: None, cited_paper_id: paper_id.map(str::to_string), confidence, stage }
    }

    #[test]
    fn dedupes_citations_resolved_to_the_same_paper() {
        let raws = vec![raw("ref A", Some("Attention"), Some(2017)), raw("ref B (same work)", Some("Attention"), Some(2017))];
        let resolutions = vec![resolved(Some("paper-1"), 1.0, ResolverStage::Doi), resolved(Some("paper-1"), 1.0, ResolverStage::Doi)];
        let rows = dedupe_and_build(&raws, resolutions, "citing-paper", 1);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn dedupes_unresolved_citations_by_normalized_title_and_year_keeping_highest_confidence() {
        let raws = vec![raw("Foo, Bar 2020", Some("A Great Title"), Some(2020)), raw("Foo & Bar (2020)", Some("a great   title"), Some(2020))];
        let resolutions = vec![resolved(None, 0.0, ResolverStage::Unresolved), resolved(None, 0.4, ResolverStage::Fuzzy)];
        let rows = dedupe_and_build(&raws, resolutions, "citing-paper", 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence, 0.4);
    }

    #[test]
    fn keeps_distinct_titles_separate() {
        let raws = vec![raw("ref A", Some("Title One"), Some(2020)), raw("ref B", Some("Title Two"), Some(2021))];
        let resolutions = vec![resolved(None, 0.0, ResolverStage::Unresolved), resolved(None, 0.0, ResolverStage::Unresolved)];
        let rows = dedupe_and_build(&raws, resolutions, "citing-paper", 1);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn extract_title_reads_first_level_one_heading() {
        let markdown = "Some preamble\n\n# Attention Is All You Need\n\nAbstract...";
        assert_eq!(extract_title(markdown), Some("Attention Is All You Need".to_string()));
    }

    #[test]
    fn worker_count_never_exceeds_four() {
        assert!(worker_count() <= 4);
        assert!(worker_count() >= 1);
    }
}
