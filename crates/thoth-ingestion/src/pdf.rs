//! Stage 1 of `DocumentPipeline` (§4.8): resolve a PDF's path and content
//! hash so the pipeline can recognize "this exact file, already ingested"
//! without touching the OCR service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thoth_common::fingerprint::fingerprint_bytes;

/// A PDF resolved to an absolute path plus the hash of its bytes.
#[derive(Debug, Clone)]
pub struct NormalizedPdf {
    pub absolute_path: PathBuf,
    pub content_hash: String,
    pub byte_len: u64,
}

/// Resolve `path` to an absolute path and hash its contents. The hash is the
/// fallback component of `Paper::id` when a document carries neither a DOI
/// nor an arXiv id (§3 Paper).
pub fn normalize_pdf(path: &Path) -> Result<NormalizedPdf> {
    let absolute_path = path.canonicalize().with_context(|| format!("resolving path {}", path.display()))?;
    let bytes = std::fs::read(&absolute_path).with_context(|| format!("reading {}", absolute_path.display()))?;
    Ok(NormalizedPdf { content_hash: fingerprint_bytes(&bytes), byte_len: bytes.len() as u64, absolute_path })
}

/// Stable id for a paper: prefer DOI, then arXiv id, then the PDF content
/// hash (§3 Paper doc comment). Callers look these up in that priority
/// order once the citation/metadata stages have run.
pub fn derive_paper_id(doi: Option<&str>, arxiv_id: Option<&str>, content_hash: &str) -> String {
    if let Some(doi) = doi {
        return format!("doi:{}", normalize_doi(doi));
    }
    if let Some(arxiv_id) = arxiv_id {
        return format!("arxiv:{arxiv_id}");
    }
    format!("sha256:{content_hash}")
}

/// Lowercase, strip a leading `https://doi.org/` or `doi:` prefix so the
/// same DOI always maps to the same paper id regardless of how it was
/// written in the source text.
pub fn normalize_doi(doi: &str) -> String {
    let d = doi.trim();
    let d = d.strip_prefix("https://doi.org/").or_else(|| d.strip_prefix("http://doi.org/")).unwrap_or(d);
    let d = d.strip_prefix("doi:").unwrap_or(d);
    d.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_id_prefers_doi_over_arxiv_and_hash() {
        let id = derive_paper_id(Some("10.1234/abc"), Some("2301.00001"), "deadbeef");
        assert_eq!(id, "doi:10.1234/abc");
    }

    #[test]
    fn paper_id_falls_back_to_content_hash() {
        let id = derive_paper_id(None, None, "deadbeef");
        assert_eq!(id, "sha256:deadbeef");
    }

    #[test]
    fn normalize_doi_strips_url_prefix_and_case() {
        assert_eq!(normalize_doi("https://doi.org/10.1234/ABC"), "10.1234/abc");
        assert_eq!(normalize_doi("DOI:10.1234/Xyz"), "10.1234/xyz");
    }
}
