//! `ask`: retrieve top-k chunks for a question, build a labeled-source
//! prompt, and route it through C2 for a grounded answer (§4.6).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thoth_config::DataClassification;
use thoth_llm::{LlmRequest, LlmRouter, Message};

use crate::search::{RagSearch, SearchFilters};

const SYSTEM_PROMPT: &str = "You are a research assistant answering questions using only the numbered \
sources provided. Cite sources inline as [1], [2], etc. matching the source numbers. If the sources \
don't contain enough information to answer, say so plainly instead of guessing.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub paper_id: String,
    pub chunk_id: uuid::Uuid,
    pub section_heading: Option<String>,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

pub struct Asker {
    search: RagSearch,
    router: Arc<LlmRouter>,
}

impl Asker {
    pub fn new(search: RagSearch, router: Arc<LlmRouter>) -> Self {
        Self { search, router }
    }

    pub async fn ask(&self, question: &str, k: usize, min_similarity: f32, filters: &SearchFilters) -> anyhow::Result<AskAnswer> {
        let hits = self.search.search(question, k, filters).await?;
        let relevant: Vec<_> = hits.into_iter().filter(|h| h.similarity >= min_similarity).collect();

        if relevant.is_empty() {
            return Ok(AskAnswer { answer: "No indexed content met the similarity threshold for this question.".to_string(), sources: Vec::new() });
        }

        let prompt = build_prompt(question, &relevant);
        let req = LlmRequest {
            messages: vec![Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() }, Message { role: "user".to_string(), content: prompt }],
            model: None,
            max_tokens: Some(2048),
            temperature: Some(0.2),
        };
        let resp = self.router.route(req, DataClassification::Internal).await?;

        let sources = relevant
            .iter()
            .map(|h| SourceRef {
                paper_id: h.chunk.paper_id.clone(),
                chunk_id: h.chunk.id,
                section_heading: h.chunk.section_heading.clone(),
                similarity: h.similarity,
            })
            .collect();

        Ok(AskAnswer { answer: resp.content, sources })
    }
}

fn build_prompt(question: &str, hits: &[crate::search::ScoredChunk]) -> String {
    let sources = hits
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let heading = h.chunk.section_heading.as_deref().unwrap_or("untitled section");
            format!("[{}] (paper {}, {})\n{}", i + 1, h.chunk.paper_id, heading, h.chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Question: {question}\n\nSources:\n{sources}")
}
