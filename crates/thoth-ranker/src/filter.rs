//! ResearchQueryFilter (C10, §4.10): scores a discovery-sourced candidate
//! paper against every stored `ResearchQuery` before it's allowed into
//! `DocumentPipeline`. Combines a cheap lexical keyword-overlap score with an
//! LLM rubric call (routed through C2, cached via C1) that judges the
//! candidate's abstract/title against each query's inclusion/exclusion
//! criteria, and accepts the best-matching query if its combined score
//! clears the threshold.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thoth_common::cache::{CacheStore, ContentCache};
use thoth_common::fingerprint::fingerprint;
use thoth_config::DataClassification;
use thoth_db::{ResearchQuery, ResearchQueryRepository};
use thoth_llm::{LlmRequest, LlmRouter, Message};
use tracing::warn;

const SYSTEM_PROMPT: &str = "You judge whether a candidate research paper matches a reader's stated research \
interest. You will be given the interest's description and inclusion/exclusion criteria, and the candidate's \
title and abstract. Return a single JSON object: {\"matches\": boolean, \"rationale\": string}. \"matches\" is \
true only if the candidate satisfies the inclusion criteria and violates none of the exclusion criteria.";

#[derive(Debug, Clone)]
pub struct DiscoveryCandidate {
    pub title: String,
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterDecision {
    pub best_query: Option<String>,
    pub score: f32,
    pub accept: bool,
}

pub struct ResearchQueryFilterConfig {
    pub threshold: f32,
    pub keyword_weight: f32,
    pub rubric_weight: f32,
}

impl Default for ResearchQueryFilterConfig {
    fn default() -> Self {
        Self { threshold: 0.6, keyword_weight: 0.4, rubric_weight: 0.6 }
    }
}

pub struct ResearchQueryFilter<S: CacheStore> {
    queries: ResearchQueryRepository,
    router: Arc<LlmRouter>,
    cache: Arc<ContentCache<S>>,
    config: ResearchQueryFilterConfig,
}

impl<S: CacheStore> ResearchQueryFilter<S> {
    pub fn new(queries: ResearchQueryRepository, router: Arc<LlmRouter>, cache: Arc<ContentCache<S>>) -> Self {
        Self { queries, router, cache, config: ResearchQueryFilterConfig::default() }
    }

    /// Score `candidate` against every stored query; return the decision for
    /// the best-matching one. Returns `accept: false` with no query when
    /// there are no stored queries to match against.
    pub async fn score(&self, candidate: &DiscoveryCandidate) -> FilterDecision {
        let queries = match self.queries.list().await {
            Ok(qs) => qs,
            Err(err) => {
                warn!(error = %err, "failed to load research queries, rejecting candidate");
                return FilterDecision { best_query: None, score: 0.0, accept: false };
            }
        };

        let mut best: Option<(String, f32)> = None;
        for query in &queries {
            let s = self.score_against(candidate, query).await;
            if best.as_ref().map(|(_, existing)| s > *existing).unwrap_or(true) {
                best = Some((query.name.clone(), s));
            }
        }

        match best {
            Some((name, score)) => FilterDecision { accept: score >= self.config.threshold, best_query: Some(name), score },
            None => FilterDecision { best_query: None, score: 0.0, accept: false },
        }
    }

    async fn score_against(&self, candidate: &DiscoveryCandidate, query: &ResearchQuery) -> f32 {
        let keyword_score = keyword_overlap(candidate, query);
        let rubric_score = self.rubric_score(candidate, query).await;
        (self.config.keyword_weight * keyword_score + self.config.rubric_weight * rubric_score).clamp(0.0, 1.0)
    }

    async fn rubric_score(&self, candidate: &DiscoveryCandidate, query: &ResearchQuery) -> f32 {
        let prompt = rubric_prompt(candidate, query);
        let updated_at = query.updated_at.to_rfc3339();
        let fp = fingerprint(&[&query.name, &updated_at, &candidate.title, candidate.abstract_text.as_deref().unwrap_or("")]);

        if let Some(cached) = self.cache.get("rubric", &fp).await {
            if let Ok(verdict) = serde_json::from_slice::<RubricVerdict>(&cached) {
                return if verdict.matches { 1.0 } else { 0.0 };
            }
        }

        let req = LlmRequest {
            messages: vec![
                Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
                Message { role: "user".to_string(), content: prompt },
            ],
            model: None,
            max_tokens: Some(256),
            temperature: Some(0.0),
        };

        let response = match self.router.route(req, DataClassification::Internal).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, query = %query.name, "rubric call failed, treating as no match");
                return 0.0;
            }
        };

        match parse_verdict(&response.content) {
            Ok(verdict) => {
                if let Ok(bytes) = serde_json::to_vec(&verdict) {
                    self.cache.put("rubric", &fp, bytes, Some(Duration::from_secs(7 * 24 * 3600))).await;
                }
                if verdict.matches { 1.0 } else { 0.0 }
            }
            Err(err) => {
                warn!(error = %err, query = %query.name, "rubric call returned unparseable output, treating as no match");
                0.0
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RubricVerdict {
    matches: bool,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: String,
}

fn rubric_prompt(candidate: &DiscoveryCandidate, query: &ResearchQuery) -> String {
    let include: Vec<String> = serde_json::from_str(&query.include_criteria).unwrap_or_default();
    let exclude: Vec<String> = serde_json::from_str(&query.exclude_criteria).unwrap_or_default();
    format!(
        "Research interest: {}\nInclusion criteria: {}\nExclusion criteria: {}\n\nCandidate title: {}\nCandidate abstract: {}",
        query.description,
        include.join("; "),
        exclude.join("; "),
        candidate.title,
        candidate.abstract_text.as_deref().unwrap_or("(no abstract available)"),
    )
}

fn parse_verdict(raw: &str) -> Result<RubricVerdict, serde_json::Error> {
    let trimmed = strip_code_fence(raw.trim());
    serde_json::from_str(trimmed)
}

fn strip_code_fence(s: &str) -> &str {
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Fraction of the query's keywords that appear (case-insensitively) in the
/// candidate's title or abstract.
fn keyword_overlap(candidate: &DiscoveryCandidate, query: &ResearchQuery) -> f32 {
    let keywords: Vec<String> = serde_json::from_str(&query.keywords).unwrap_or_default();
    if keywords.is_empty() {
        return 0.0;
    }

    let haystack = format!("{} {}", candidate.title, candidate.abstract_text.as_deref().unwrap_or("")).to_lowercase();
    let hits = keywords.iter().filter(|kw| haystack.contains(&kw.to_lowercase())).count();
    hits as f32 / keywords.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(keywords: &[&str]) -> ResearchQuery {
        let mut q = ResearchQuery::new("test-query".to_string(), "testing keyword overlap".to_string());
        q.keywords = serde_json::to_string(&keywords.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap();
        q
    }

    #[test]
    fn keyword_overlap_counts_case_insensitive_hits() {
        let candidate = DiscoveryCandidate { title: "Attention Is All You Need".to_string(), abstract_text: Some("a TRANSFORMER architecture for sequence modeling".to_string()) };
        let q = query(&["transformer", "reinforcement learning"]);
        assert_eq!(keyword_overlap(&candidate, &q), 0.5);
    }

    #[test]
    fn keyword_overlap_is_zero_with_no_keywords() {
        let candidate = DiscoveryCandidate { title: "Something".to_string(), abstract_text: None };
        let q = query(&[]);
        assert_eq!(keyword_overlap(&candidate, &q), 0.0);
    }

    #[test]
    fn parse_verdict_strips_code_fence() {
        let raw = "```json\n{\"matches\": true, \"rationale\": \"on topic\"}\n```";
        let verdict = parse_verdict(raw).unwrap();
        assert!(verdict.matches);
    }
}
