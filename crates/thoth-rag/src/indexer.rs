//! Real chunk indexer for C6 (§4.6): splits a document's markdown and
//! rendered note, embeds each chunk locally, and fills the lexical token
//! column. Replaces `thoth-ingestion`'s `LexicalOnlyChunkIndexer`
//! placeholder, which never learns about embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use thoth_common::lexical::lexical_tokens;
use thoth_common::splitter::{split_markdown, SplitterConfig};
use thoth_db::schema::{Chunk, SourceKind};
use thoth_embed::LocalEmbedder;
use thoth_ingestion::ChunkIndexer;
use tracing::warn;

pub struct RagChunkIndexer {
    embedder: Arc<LocalEmbedder>,
}

impl RagChunkIndexer {
    pub fn new(embedder: Arc<LocalEmbedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl ChunkIndexer for RagChunkIndexer {
    async fn index(&self, paper_id: &str, version: i64, markdown_no_images: &str, note_markdown: &str) -> anyhow::Result<Vec<Chunk>> {
        let config = SplitterConfig::rag_default();
        let mut chunks = Vec::new();

        for (ordinal, piece) in split_markdown(markdown_no_images, &config).into_iter().enumerate() {
            if is_figure_or_table_only(&piece.text) {
                continue;
            }
            let mut chunk = Chunk::new(paper_id.to_string(), version, SourceKind::PaperBody, ordinal as i64, piece.text);
            chunk.section_heading = piece.heading_path.last().cloned();
            chunks.push(chunk);
        }
        for (ordinal, piece) in split_markdown(note_markdown, &config).into_iter().enumerate() {
            if is_figure_or_table_only(&piece.text) {
                continue;
            }
            let mut chunk = Chunk::new(paper_id.to_string(), version, SourceKind::GeneratedNote, ordinal as i64, piece.text);
            chunk.section_heading = piece.heading_path.last().cloned();
            chunks.push(chunk);
        }

        if chunks.is_empty() {
            return Ok(chunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            warn!(paper_id, expected = chunks.len(), got = embeddings.len(), "embedder returned a different chunk count than requested, dropping unmatched tail");
        }

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings.into_iter()) {
            chunk.lexical_tokens = serde_json::to_string(&lexical_tokens(&chunk.text)).unwrap_or_else(|_| "[]".to_string());
            chunk.embedding = Some(embedding);
        }
        chunks.retain(|c| c.embedding.is_some());

        Ok(chunks)
    }
}

/// §4.6: "skip content containing only figures/tables." Strips markdown
/// image refs and table rows/separators, then checks whether any prose
/// survives.
fn is_figure_or_table_only(text: &str) -> bool {
    let prose_words: usize = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.is_empty() || trimmed.starts_with("![") || trimmed.starts_with('|') || trimmed.chars().all(|c| matches!(c, '-' | ':' | '|' | ' ')))
        })
        .map(|line| line.split_whitespace().count())
        .sum();
    prose_words < 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_caption_alone_is_skipped() {
        let text = "![Figure 1: architecture diagram](fig1.png)\n";
        assert!(is_figure_or_table_only(text));
    }

    #[test]
    fn table_with_separator_row_is_skipped() {
        let text = "| A | B |\n|---|---|\n| 1 | 2 |\n";
        assert!(is_figure_or_table_only(text));
    }

    #[test]
    fn prose_paragraph_is_kept() {
        let text = "We evaluate the model on three held-out benchmarks and report accuracy.";
        assert!(!is_figure_or_table_only(text));
    }
}
