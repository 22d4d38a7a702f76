//! Citation extraction — stage 4 of `DocumentPipeline` (§4.8): pull the raw
//! reference list out of a paper's markdown via the LLM, before
//! `CitationResolver` (C3) tries to link each one to a known paper.
//!
//! Runs concurrently with stage 3 (analysis) against the same no-images
//! markdown; a failure here is non-fatal — the paper keeps an empty
//! citation list rather than blocking ingestion (§4.8 failure taxonomy).

use thoth_config::DataClassification;
use thoth_llm::{LlmRequest, LlmRouter, Message};
use tracing::warn;

use crate::models::RawCitation;

const SYSTEM_PROMPT: &str = "You extract the reference list from a research paper's markdown. Return a single JSON array \
where each element has: citation_text (string, the reference entry verbatim), extracted_title (string or null), \
extracted_authors (array of strings), extracted_year (integer or null), extracted_venue (string or null), \
is_influential (boolean, true if the paper's body text cites this work as foundational or repeatedly builds on it). \
Return ONLY the JSON array, no prose, no markdown code fence.";

/// Extract the reference list from `markdown`. Returns an empty vector
/// (rather than propagating the error) on any LLM or parse failure, per the
/// stage's non-fatal failure semantics.
pub async fn extract_citations(router: &LlmRouter, markdown: &str, class: DataClassification) -> Vec<RawCitation> {
    let req = LlmRequest {
        messages: vec![
            Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
            Message { role: "user".to_string(), content: markdown.to_string() },
        ],
        model: None,
        max_tokens: Some(4096),
        temperature: Some(0.0),
    };

    let response = match router.route(req, class).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(error = %err, "citation extraction failed, proceeding with no citations");
            return Vec::new();
        }
    };

    match parse_citations(&response.content) {
        Ok(citations) => citations,
        Err(err) => {
            warn!(error = %err, "citation extraction returned unparseable output, proceeding with no citations");
            Vec::new()
        }
    }
}

fn parse_citations(raw: &str) -> Result<Vec<RawCitation>, serde_json::Error> {
    let trimmed = strip_code_fence(raw.trim());
    serde_json::from_str(trimmed)
}

fn strip_code_fence(s: &str) -> &str {
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_citation_array() {
        let raw = r#"[{"citation_text": "Vaswani et al., 2017", "extracted_title": "Attention Is All You Need", "extracted_authors": ["A. Vaswani"], "extracted_year": 2017, "extracted_venue": "NeurIPS", "is_influential": true}]"#;
        let citations = parse_citations(raw).unwrap();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].extracted_year, Some(2017));
        assert!(citations[0].is_influential);
    }

    #[test]
    fn strips_code_fence_before_parsing() {
        let raw = "```json\n[]\n```";
        let citations = parse_citations(raw).unwrap();
        assert!(citations.is_empty());
    }
}
