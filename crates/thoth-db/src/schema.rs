//! Plain Rust record types for every table. Arrow conversion lives in
//! `schema_arrow`; LanceDB table management lives in `database`.

/// Dense embedding dimension. Matches `thoth-embed`'s default local model
/// (bge-small-en-v1.5, 384-dim) — `thoth-config::EmbeddingConfig::dim`
/// must agree with this at runtime or indexing fails loudly.
pub const EMBEDDING_DIM: usize = 384;

/// Which resolution stage produced a citation's confidence (§3 Citation,
/// §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStage {
    Doi,
    Openalex,
    Arxiv,
    Fuzzy,
    Unresolved,
}

impl std::fmt::Display for ResolverStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolverStage::Doi => "doi",
            ResolverStage::Openalex => "openalex",
            ResolverStage::Arxiv => "arxiv",
            ResolverStage::Fuzzy => "fuzzy",
            ResolverStage::Unresolved => "unresolved",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ResolverStage {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doi" => Ok(ResolverStage::Doi),
            "openalex" => Ok(ResolverStage::Openalex),
            "arxiv" => Ok(ResolverStage::Arxiv),
            "fuzzy" => Ok(ResolverStage::Fuzzy),
            "unresolved" => Ok(ResolverStage::Unresolved),
            other => Err(format!("unknown resolver stage: {other}")),
        }
    }
}

/// A chunk's origin text (§3 Chunk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PaperBody,
    GeneratedNote,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::PaperBody => write!(f, "paper_body"),
            SourceKind::GeneratedNote => write!(f, "generated_note"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paper_body" => Ok(SourceKind::PaperBody),
            "generated_note" => Ok(SourceKind::GeneratedNote),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// A processed document (§3 Paper). `id` is a stable hash of the canonical
/// identifier (DOI, else arXiv id, else SHA-256 of the PDF bytes) — never a
/// random UUID, so re-ingesting the same PDF resolves to the same paper.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    /// JSON-encoded `Vec<String>`, ordered.
    pub authors: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub abstract_text: Option<String>,
    /// JSON-encoded `Vec<String>`.
    pub tags: String,
    pub pdf_path: String,
    pub markdown_path_with_images: Option<String>,
    pub markdown_path_no_images: Option<String>,
    /// Vault-relative path to the rendered note file (§4.7/§6), set once C7
    /// has rendered and the pipeline has persisted it. `None` until then, or
    /// permanently if note rendering failed (non-fatal per §4.7).
    pub note_path: Option<String>,
    /// JSON-encoded analysis record of the active `ProcessingVersion`,
    /// denormalized here for cheap reads (§3 lists `analysis` on both
    /// Paper and ProcessingVersion; ProcessingVersion is authoritative).
    pub analysis: Option<String>,
    pub embeddings_generated: bool,
    pub llm_model_used: Option<String>,
    pub processing_version: i64,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Paper {
    pub fn new(id: String, title: String, pdf_path: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            title,
            authors: "[]".to_string(),
            year: None,
            venue: None,
            doi: None,
            arxiv_id: None,
            abstract_text: None,
            tags: "[]".to_string(),
            pdf_path,
            markdown_path_with_images: None,
            markdown_path_no_images: None,
            note_path: None,
            analysis: None,
            embeddings_generated: false,
            llm_model_used: None,
            processing_version: 0,
            status: "pending".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A point-in-time ingestion snapshot (§3 ProcessingVersion). Composite key
/// `(paper_id, version)`; never mutated after creation except the
/// `is_active` flip performed atomically by `CitationGraph::set_active_version`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessingVersion {
    pub paper_id: String,
    pub version: i64,
    pub llm_model: String,
    /// JSON-encoded opaque config snapshot.
    pub processing_config: String,
    pub markdown_content: String,
    pub analysis: Option<String>,
    pub is_active: bool,
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessingVersion {
    pub fn new(paper_id: String, version: i64, llm_model: String, markdown_content: String) -> Self {
        Self {
            paper_id,
            version,
            llm_model,
            processing_config: "{}".to_string(),
            markdown_content,
            analysis: None,
            is_active: false,
            processed_at: chrono::Utc::now(),
        }
    }
}

/// A directed `citing -> cited` edge plus the raw extraction (§3 Citation).
/// Never mutated after creation — a re-ingestion creates a new set of
/// citations scoped to the new `processing_version`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Citation {
    pub id: uuid::Uuid,
    pub citing_paper_id: String,
    pub citing_version: i64,
    pub citation_text: String,
    pub extracted_title: Option<String>,
    /// JSON-encoded `Vec<String>`.
    pub extracted_authors: String,
    pub extracted_year: Option<i32>,
    pub extracted_venue: Option<String>,
    pub resolved_doi: Option<String>,
    pub resolved_arxiv_id: Option<String>,
    pub cited_paper_id: Option<String>,
    pub is_influential: bool,
    pub confidence: f32,
    pub resolver_stage: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Citation {
    pub fn new(citing_paper_id: String, citing_version: i64, citation_text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            citing_paper_id,
            citing_version,
            citation_text,
            extracted_title: None,
            extracted_authors: "[]".to_string(),
            extracted_year: None,
            extracted_venue: None,
            resolved_doi: None,
            resolved_arxiv_id: None,
            cited_paper_id: None,
            is_influential: false,
            confidence: 0.0,
            resolver_stage: ResolverStage::Unresolved.to_string(),
            created_at: chrono::Utc::now(),
        }
    }
}

/// An indexed unit of text (§3 Chunk). `(paper_id, processing_version,
/// source_kind, ordinal)` is unique.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub id: uuid::Uuid,
    pub paper_id: String,
    pub processing_version: i64,
    pub source_kind: String,
    pub ordinal: i64,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    /// JSON-encoded `Vec<String>` of normalized lexical tokens (BM25-style).
    pub lexical_tokens: String,
    pub section_heading: Option<String>,
    pub page_hint: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Chunk {
    pub fn new(paper_id: String, processing_version: i64, source_kind: SourceKind, ordinal: i64, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            paper_id,
            processing_version,
            source_kind: source_kind.to_string(),
            ordinal,
            text,
            embedding: None,
            lexical_tokens: "[]".to_string(),
            section_heading: None,
            page_hint: None,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A generic cached artifact (§3 CacheEntry, §4.1). Key is `(kind,
/// fingerprint)`. Backs `thoth_common::cache::CacheStore`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheEntryRow {
    pub kind: String,
    pub fingerprint: String,
    pub value: Vec<u8>,
    pub size_bytes: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A stored interest profile (§3 ResearchQuery), consulted read-only by
/// `ResearchQueryFilter` (C10).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResearchQuery {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: String,
    /// JSON-encoded `Vec<String>`.
    pub keywords: String,
    /// JSON-encoded `Vec<String>`.
    pub include_criteria: String,
    /// JSON-encoded `Vec<String>`.
    pub exclude_criteria: String,
    pub schedule: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ResearchQuery {
    pub fn new(name: String, description: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            description,
            keywords: "[]".to_string(),
            include_criteria: "[]".to_string(),
            exclude_criteria: "[]".to_string(),
            schedule: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Table names
// =============================================================================

pub const TABLE_PAPERS: &str = "papers";
pub const TABLE_PROCESSING_VERSIONS: &str = "processing_versions";
pub const TABLE_CITATIONS: &str = "citations";
pub const TABLE_CHUNKS: &str = "chunks";
pub const TABLE_CACHE_ENTRIES: &str = "cache_entries";
pub const TABLE_RESEARCH_QUERIES: &str = "research_queries";
