//! `TemplateNoteRenderer`: C7's `thoth_ingestion::NoteRenderer` implementation
//! (§4.7). Deterministic given (analysis, citations, template, link-format
//! config) — the template itself never touches the database or network.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use minijinja::Environment;
use thoth_db::schema::{Citation, Paper};
use thoth_db::PaperRepository;
use thoth_ingestion::models::AnalysisRecord;
use thoth_ingestion::NoteRenderer;

use crate::context::{build_context, external_link, format_citation, CitationContext};
use crate::template::{DEFAULT_NOTE_TEMPLATE, NOTE_TEMPLATE_NAME};

pub struct TemplateNoteRenderer {
    env: Environment<'static>,
    papers: PaperRepository,
    vault_path: PathBuf,
}

impl TemplateNoteRenderer {
    pub fn new(papers: PaperRepository, vault_path: PathBuf) -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.add_template(NOTE_TEMPLATE_NAME, DEFAULT_NOTE_TEMPLATE)?;
        Ok(Self { env, papers, vault_path })
    }

    /// Resolve a citation's link: a vault-relative path to the cited
    /// paper's own note when one has been rendered, otherwise an external
    /// URL when the citation resolved to a DOI/arXiv id (§4.7).
    async fn resolve_link(&self, citation: &Citation) -> Option<String> {
        if let Some(cited_id) = &citation.cited_paper_id {
            if let Ok(Some(cited_paper)) = self.papers.find_by_id(cited_id).await {
                if let Some(note_path) = &cited_paper.note_path {
                    if let Some(relative) = vault_relative(&self.vault_path, note_path) {
                        return Some(relative);
                    }
                }
            }
        }
        external_link(citation)
    }
}

#[async_trait]
impl NoteRenderer for TemplateNoteRenderer {
    async fn render(&self, paper: &Paper, analysis: &AnalysisRecord, citations: &[Citation]) -> anyhow::Result<String> {
        let mut citation_contexts = Vec::with_capacity(citations.len());
        for (i, citation) in citations.iter().enumerate() {
            citation_contexts.push(CitationContext { number: i + 1, formatted: format_citation(citation), link: self.resolve_link(citation).await });
        }

        let context = build_context(paper, analysis, citation_contexts);
        let template = self.env.get_template(NOTE_TEMPLATE_NAME)?;
        let rendered = template.render(minijinja::Value::from_serialize(&context))?;
        Ok(rendered)
    }
}

fn vault_relative(vault_path: &Path, absolute_note_path: &str) -> Option<String> {
    Path::new(absolute_note_path).strip_prefix(vault_path).ok().map(|p| p.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_relative_strips_vault_prefix() {
        let vault = Path::new("/home/user/vault");
        let note = "/home/user/vault/paper123/v1/note.md";
        assert_eq!(vault_relative(vault, note), Some("paper123/v1/note.md".to_string()));
    }

    #[test]
    fn vault_relative_is_none_outside_vault() {
        let vault = Path::new("/home/user/vault");
        let note = "/somewhere/else/note.md";
        assert_eq!(vault_relative(vault, note), None);
    }
}
