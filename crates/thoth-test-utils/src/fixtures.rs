//! Sample domain rows with sensible, overridable defaults, so crate test
//! suites stop hand-assembling `Paper`/`Citation`/`Chunk`/`AnalysisRecord`
//! values field by field.

use thoth_db::schema::{Chunk, Citation, Paper, SourceKind};
use thoth_ingestion::models::AnalysisRecord;

/// A paper with every commonly-asserted field filled in (title, authors,
/// year, DOI, tags) rather than `Paper::new`'s bare-minimum defaults.
pub fn sample_paper(id: impl Into<String>) -> Paper {
    let mut paper = Paper::new(id.into(), "Attention Is All You Need".to_string(), "/vault/intake/paper.pdf".to_string());
    paper.authors = serde_json::to_string(&["Ashish Vaswani", "Noam Shazeer"]).unwrap();
    paper.year = Some(2017);
    paper.venue = Some("NeurIPS".to_string());
    paper.doi = Some("10.48550/arxiv.1706.03762".to_string());
    paper.tags = serde_json::to_string(&["transformers", "attention"]).unwrap();
    paper
}

pub fn sample_citation(citing_paper_id: impl Into<String>) -> Citation {
    let mut citation = Citation::new(citing_paper_id.into(), 1, "Vaswani et al., Attention Is All You Need, NeurIPS 2017".to_string());
    citation.extracted_title = Some("Attention Is All You Need".to_string());
    citation.extracted_authors = serde_json::to_string(&["Ashish Vaswani"]).unwrap();
    citation.extracted_year = Some(2017);
    citation.extracted_venue = Some("NeurIPS".to_string());
    citation
}

pub fn sample_chunk(paper_id: impl Into<String>, ordinal: i64, text: impl Into<String>) -> Chunk {
    let mut chunk = Chunk::new(paper_id.into(), 1, SourceKind::PaperBody, ordinal, text.into());
    chunk.section_heading = Some("Introduction".to_string());
    chunk
}

pub fn sample_analysis_record() -> AnalysisRecord {
    AnalysisRecord {
        summary: "Introduces the Transformer architecture based solely on attention mechanisms.".to_string(),
        key_points: vec!["Dispenses with recurrence and convolutions entirely".to_string(), "Scales better to long sequences".to_string()],
        abstract_text: Some("The dominant sequence transduction models are based on complex recurrent or convolutional neural networks...".to_string()),
        methodology: Some("Encoder-decoder with multi-head self-attention.".to_string()),
        results: Some("State-of-the-art BLEU scores on WMT 2014 English-to-German and English-to-French.".to_string()),
        limitations: None,
        related_work: Some("Builds on prior sequence-to-sequence and attention-based models.".to_string()),
        tags: vec!["transformers".to_string()],
        extensions: serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_paper_has_overridden_fields_filled_in() {
        let paper = sample_paper("p1");
        assert_eq!(paper.id, "p1");
        assert_eq!(paper.year, Some(2017));
        assert!(paper.doi.is_some());
    }

    #[test]
    fn sample_chunk_carries_the_given_ordinal_and_text() {
        let chunk = sample_chunk("p1", 3, "chunk text");
        assert_eq!(chunk.ordinal, 3);
        assert_eq!(chunk.text, "chunk text");
    }
}
