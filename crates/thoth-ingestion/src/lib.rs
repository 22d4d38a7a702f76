//! thoth-ingestion — DocumentPipeline (C8, §4.8): the 9-stage orchestrator
//! that turns an intake PDF into an analyzed, citation-linked, indexed, and
//! activated paper version.
//!
//! - `pdf`: path/content-hash normalization and paper id derivation (stage 1)
//! - `docling`: OCR/markdown extraction client (stage 2)
//! - `analysis`: AnalysisEngine, C4 (stage 3)
//! - `citations`: LLM-based reference-list extraction (stage 4)
//! - `resolve`: CitationResolver, C3 (stage 5)
//! - `pipeline`: the orchestrator itself, plus the NoteRenderer/ChunkIndexer
//!   hooks for stages 7-8

pub mod analysis;
pub mod citations;
pub mod docling;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod resolve;

pub use pipeline::{ChunkIndexer, DocumentPipeline, IngestOutcome, IngestionProgress, NoteRenderer};
