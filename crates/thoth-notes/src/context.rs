//! Builds the template context for C7: maps `Paper`/`AnalysisRecord`/
//! `Citation` rows onto the fields `template.rs`'s default template expects,
//! substituting "N/A" for anything missing (§4.7 contract).

use serde::Serialize;
use thoth_db::schema::{Citation, Paper};
use thoth_ingestion::models::AnalysisRecord;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Serialize)]
pub struct CitationContext {
    pub number: usize,
    pub formatted: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionField {
    pub title: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteContext {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub doi: String,
    pub journal: String,
    pub tags: String,
    pub pdf_link: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub abstract_text: String,
    pub methodology: String,
    pub results: String,
    pub limitations: String,
    pub related_work: String,
    pub extensions: Vec<ExtensionField>,
    pub citations: Vec<CitationContext>,
}

fn opt_or_na(value: Option<&str>) -> String {
    value.filter(|s| !s.trim().is_empty()).unwrap_or(NOT_AVAILABLE).to_string()
}

fn join_json_list_or_na(json: &str) -> String {
    match serde_json::from_str::<Vec<String>>(json) {
        Ok(items) if !items.is_empty() => items.join(", "),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn hashtag_list_or_na(json: &str) -> String {
    match serde_json::from_str::<Vec<String>>(json) {
        Ok(items) if !items.is_empty() => items.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(", "),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Human-readable citation line, e.g. "Vaswani et al. (2017). Attention Is
/// All You Need. NeurIPS." Falls back to the raw extracted reference text
/// when structured fields are missing.
pub fn format_citation(citation: &Citation) -> String {
    let authors: Vec<String> = serde_json::from_str(&citation.extracted_authors).unwrap_or_default();
    let author_part = match authors.len() {
        0 => None,
        1 => Some(authors[0].clone()),
        _ => Some(format!("{} et al.", authors[0])),
    };

    match (&author_part, citation.extracted_year, &citation.extracted_title) {
        (Some(author), Some(year), Some(title)) => {
            let venue = citation.extracted_venue.as_deref().map(|v| format!(" {v}.")).unwrap_or_default();
            format!("{author} ({year}). {title}.{venue}")
        }
        (_, _, Some(title)) => title.clone(),
        _ => citation.citation_text.clone(),
    }
}

/// External link for a resolved citation: DOI first, then arXiv, when no
/// local note exists for the cited paper (§4.7: local link takes priority).
pub fn external_link(citation: &Citation) -> Option<String> {
    if let Some(doi) = &citation.resolved_doi {
        return Some(format!("https://doi.org/{doi}"));
    }
    if let Some(arxiv_id) = &citation.resolved_arxiv_id {
        return Some(format!("https://arxiv.org/abs/{arxiv_id}"));
    }
    None
}

pub fn build_context(paper: &Paper, analysis: &AnalysisRecord, citation_contexts: Vec<CitationContext>) -> NoteContext {
    let extensions = analysis
        .extensions
        .iter()
        .map(|(key, value)| ExtensionField { title: titlecase(key), value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()) })
        .collect();

    NoteContext {
        title: paper.title.clone(),
        authors: join_json_list_or_na(&paper.authors),
        year: paper.year.map(|y| y.to_string()).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        doi: opt_or_na(paper.doi.as_deref()),
        journal: opt_or_na(paper.venue.as_deref()),
        tags: hashtag_list_or_na(&paper.tags),
        pdf_link: paper.pdf_path.clone(),
        summary: opt_or_na(Some(&analysis.summary)),
        key_points: analysis.key_points.clone(),
        abstract_text: opt_or_na(analysis.abstract_text.as_deref()),
        methodology: opt_or_na(analysis.methodology.as_deref()),
        results: opt_or_na(analysis.results.as_deref()),
        limitations: opt_or_na(analysis.limitations.as_deref()),
        related_work: opt_or_na(analysis.related_work.as_deref()),
        extensions,
        citations: citation_contexts,
    }
}

fn titlecase(s: &str) -> String {
    let mut chars = s.replace(['_', '-'], " ").chars().collect::<Vec<_>>();
    if let Some(first) = chars.first_mut() {
        *first = first.to_ascii_uppercase();
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_citation() -> Citation {
        let mut c = Citation::new("p1".to_string(), 1, "Vaswani et al., Attention Is All You Need, NeurIPS 2017".to_string());
        c.extracted_title = Some("Attention Is All You Need".to_string());
        c.extracted_authors = serde_json::to_string(&vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()]).unwrap();
        c.extracted_year = Some(2017);
        c.extracted_venue = Some("NeurIPS".to_string());
        c
    }

    #[test]
    fn formats_citation_with_full_metadata() {
        let formatted = format_citation(&sample_citation());
        assert_eq!(formatted, "Ashish Vaswani et al. (2017). Attention Is All You Need. NeurIPS.");
    }

    #[test]
    fn falls_back_to_raw_text_when_nothing_extracted() {
        let c = Citation::new("p1".to_string(), 1, "raw reference text".to_string());
        assert_eq!(format_citation(&c), "raw reference text");
    }

    #[test]
    fn external_link_prefers_doi_over_arxiv() {
        let mut c = sample_citation();
        c.resolved_doi = Some("10.1/abc".to_string());
        c.resolved_arxiv_id = Some("1706.03762".to_string());
        assert_eq!(external_link(&c), Some("https://doi.org/10.1/abc".to_string()));
    }

    #[test]
    fn missing_fields_render_as_na() {
        let paper = Paper::new("p1".to_string(), "Some Title".to_string(), "/tmp/p1.pdf".to_string());
        let analysis = AnalysisRecord::default();
        let ctx = build_context(&paper, &analysis, vec![]);
        assert_eq!(ctx.doi, "N/A");
        assert_eq!(ctx.journal, "N/A");
        assert_eq!(ctx.tags, "N/A");
    }
}
