//! Shapes passed between pipeline stages that don't belong to any one
//! storage table: analysis output (C4), raw LLM-extracted citations (stage
//! 4, before C3 resolves them), and a resolver candidate (stage 5).

use serde::{Deserialize, Serialize};

/// Structured analysis record produced by `AnalysisEngine` (§4.4). Field set
/// matches the spec's configurable schema; `extensions` carries whatever a
/// schema adds beyond these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub methodology: Option<String>,
    #[serde(default)]
    pub results: Option<String>,
    #[serde(default)]
    pub limitations: Option<String>,
    #[serde(default)]
    pub related_work: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Schema-defined fields beyond the fixed set above.
    #[serde(default, flatten)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// Which strategy `AnalysisEngine` picked for a given document (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStrategy {
    Direct,
    Refine,
    MapReduce,
}

impl std::fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnalysisStrategy::Direct => "direct",
            AnalysisStrategy::Refine => "refine",
            AnalysisStrategy::MapReduce => "map_reduce",
        };
        write!(f, "{s}")
    }
}

/// A citation as extracted from a paper's reference list by the LLM, before
/// `CitationResolver` (C3) attempts to resolve it to a known paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCitation {
    /// The raw reference-list text this was extracted from.
    pub citation_text: String,
    pub extracted_title: Option<String>,
    #[serde(default)]
    pub extracted_authors: Vec<String>,
    pub extracted_year: Option<i32>,
    pub extracted_venue: Option<String>,
    #[serde(default)]
    pub is_influential: bool,
}

/// Candidate metadata returned by one of the resolver's external lookups
/// (DOI/Crossref, OpenAlex, arXiv) — a common shape so `resolve::fuzzy`'s
/// tie-break and scoring logic don't need to know which stage produced it.
#[derive(Debug, Clone)]
pub struct ResolverCandidate {
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub authors: Vec<String>,
}
