//! AnalysisEngine (C4, §4.4): turns a paper's no-images markdown into a
//! structured `AnalysisRecord` via direct / refine / map-reduce strategy
//! selection, backed by `ContentCache` (C1) and routed through
//! `thoth_llm::LlmRouter`.

use std::time::Duration;

use thoth_common::cache::CacheStore;
use thoth_common::fingerprint::fingerprint;
use thoth_config::DataClassification;
use thoth_common::splitter::{estimate_tokens, split_markdown, SplitterConfig};
use thoth_llm::{LlmError, LlmRequest, LlmRouter, Message};
use tracing::warn;

use crate::models::{AnalysisRecord, AnalysisStrategy};

#[derive(Debug, Clone)]
pub struct AnalysisEngineConfig {
    pub schema_version: String,
    /// Strategy thresholds as a fraction of the model's context window
    /// (§4.4: `r_direct` default 0.8, `r_refine` default 1.2).
    pub r_direct: f32,
    pub r_refine: f32,
    /// Bounded corrective retries on schema-validation failure.
    pub max_schema_retries: u32,
}

impl Default for AnalysisEngineConfig {
    fn default() -> Self {
        Self { schema_version: "v1".to_string(), r_direct: 0.8, r_refine: 1.2, max_schema_retries: 2 }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub record: AnalysisRecord,
    pub strategy: AnalysisStrategy,
    /// Set when schema validation failed persistently; the pipeline marks
    /// the paper `partial` rather than aborting (§4.4, §4.8 stage 3).
    pub partial: bool,
}

const SYSTEM_PROMPT: &str = "You analyze research papers and return a single JSON object with exactly these fields: \
summary (string), key_points (array of strings), abstract_text (string or null), methodology (string or null), \
results (string or null), limitations (string or null), related_work (string or null), tags (array of strings). \
Return ONLY the JSON object, no prose, no markdown code fence.";

/// Produce a structured analysis for `markdown`, selecting direct/refine/
/// map-reduce by comparing its token count against the routed backend's
/// context window (§4.4). Results are cached in C1, fingerprinted by
/// `(model, schema_version, strategy, normalized_markdown)`.
pub async fn analyze<S: CacheStore>(
    router: &LlmRouter,
    cache: &thoth_common::cache::ContentCache<S>,
    markdown: &str,
    class: DataClassification,
    config: &AnalysisEngineConfig,
) -> AnalysisOutcome {
    let normalized = normalize_markdown(markdown);
    let token_count = estimate_tokens(&normalized);
    let context = router.max_context_tokens(class).unwrap_or(8192);
    let strategy = select_strategy(token_count, context, config);

    let model = router.model_id(class).unwrap_or_else(|_| "unknown".to_string());
    let fp = fingerprint(&[&model, &config.schema_version, &strategy.to_string(), &normalized]);

    let cached = cache.get("analysis", &fp).await;
    if let Some(bytes) = cached {
        if let Ok(record) = serde_json::from_slice::<AnalysisRecord>(&bytes) {
            return AnalysisOutcome { record, strategy, partial: false };
        }
    }

    let (record, partial) = match run_strategy(router, &normalized, class, strategy, config).await {
        Ok(record) => (record, false),
        Err(err) => {
            warn!(error = %err, %strategy, "analysis failed persistently, proceeding with empty analysis");
            (AnalysisRecord::default(), true)
        }
    };

    if !partial {
        if let Ok(bytes) = serde_json::to_vec(&record) {
            cache.put("analysis", &fp, bytes, Some(Duration::from_secs(7 * 24 * 3600))).await;
        }
    }

    AnalysisOutcome { record, strategy, partial }
}

fn normalize_markdown(markdown: &str) -> String {
    markdown.lines().map(str::trim_end).collect::<Vec<_>>().join("\n").trim().to_string()
}

fn select_strategy(token_count: usize, context: usize, config: &AnalysisEngineConfig) -> AnalysisStrategy {
    let t = token_count as f32;
    let c = context as f32;
    if t <= c * config.r_direct {
        AnalysisStrategy::Direct
    } else if t <= c * config.r_refine {
        AnalysisStrategy::Refine
    } else {
        AnalysisStrategy::MapReduce
    }
}

async fn run_strategy(
    router: &LlmRouter,
    markdown: &str,
    class: DataClassification,
    strategy: AnalysisStrategy,
    config: &AnalysisEngineConfig,
) -> Result<AnalysisRecord, String> {
    match strategy {
        AnalysisStrategy::Direct => call_structured(router, class, markdown, config.max_schema_retries).await,
        AnalysisStrategy::Refine => {
            let chunks = split_markdown(markdown, &SplitterConfig::analysis(chunk_size_for(markdown, router, class)));
            let mut running: Option<AnalysisRecord> = None;
            for chunk in chunks {
                let prompt = match &running {
                    None => chunk.text.clone(),
                    Some(prev) => format!(
                        "Current analysis so far:\n{}\n\nRefine it using this additional section:\n{}",
                        serde_json::to_string_pretty(prev).unwrap_or_default(),
                        chunk.text
                    ),
                };
                running = Some(call_structured(router, class, &prompt, config.max_schema_retries).await?);
            }
            running.ok_or_else(|| "document produced no chunks to analyze".to_string())
        }
        AnalysisStrategy::MapReduce => {
            let chunks = split_markdown(markdown, &SplitterConfig::analysis(chunk_size_for(markdown, router, class)));
            let mut partials = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                partials.push(call_structured(router, class, &chunk.text, config.max_schema_retries).await?);
            }
            reduce_partials(router, class, partials, config.max_schema_retries).await
        }
    }
}

/// Chunk size target for refine/map-reduce: a third of the backend's
/// context window, leaving headroom for the running-analysis/prompt
/// overhead each call carries alongside the chunk text.
fn chunk_size_for(_markdown: &str, router: &LlmRouter, class: DataClassification) -> usize {
    let context = router.max_context_tokens(class).unwrap_or(8192);
    (context / 3).max(512)
}

async fn reduce_partials(
    router: &LlmRouter,
    class: DataClassification,
    partials: Vec<AnalysisRecord>,
    max_retries: u32,
) -> Result<AnalysisRecord, String> {
    if partials.len() == 1 {
        return Ok(partials.into_iter().next().unwrap());
    }
    let joined = partials.iter().enumerate().map(|(i, p)| format!("Partial analysis {}:\n{}", i + 1, serde_json::to_string_pretty(p).unwrap_or_default())).collect::<Vec<_>>().join("\n\n");
    let prompt = format!(
        "Merge these independent partial analyses of different sections of the same paper into one analysis. \
        Deduplicate list fields (key_points, tags) by normalized equality and concatenate narrative fields across sections.\n\n{joined}"
    );
    let mut merged = call_structured(router, class, &prompt, max_retries).await?;
    dedupe_lists(&mut merged);
    Ok(merged)
}

fn dedupe_lists(record: &mut AnalysisRecord) {
    dedupe_normalized(&mut record.key_points);
    dedupe_normalized(&mut record.tags);
}

fn dedupe_normalized(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.trim().to_lowercase()));
}

async fn call_structured(router: &LlmRouter, class: DataClassification, user_content: &str, max_retries: u32) -> Result<AnalysisRecord, String> {
    let mut prompt = user_content.to_string();
    let mut last_error = String::new();

    for _ in 0..=max_retries {
        let req = LlmRequest {
            messages: vec![Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() }, Message { role: "user".to_string(), content: prompt.clone() }],
            model: None,
            max_tokens: Some(4096),
            temperature: Some(0.1),
        };
        match router.route(req, class).await {
            Ok(resp) => match parse_record(&resp.content) {
                Ok(record) => return Ok(record),
                Err(err) => {
                    last_error = err;
                    prompt = format!("{user_content}\n\nYour previous response was not valid JSON matching the required schema ({last_error}). Return ONLY the corrected JSON object.");
                }
            },
            Err(LlmError::PolicyBlocked(msg)) => return Err(msg),
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(last_error)
}

fn parse_record(raw: &str) -> Result<AnalysisRecord, String> {
    let trimmed = strip_code_fence(raw.trim());
    serde_json::from_str(trimmed).map_err(|e| e.to_string())
}

fn strip_code_fence(s: &str) -> &str {
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_picks_direct_for_small_documents() {
        let config = AnalysisEngineConfig::default();
        assert_eq!(select_strategy(1000, 8192, &config), AnalysisStrategy::Direct);
    }

    #[test]
    fn strategy_picks_refine_between_thresholds() {
        let config = AnalysisEngineConfig::default();
        assert_eq!(select_strategy(7000, 8192, &config), AnalysisStrategy::Refine);
    }

    #[test]
    fn strategy_picks_map_reduce_beyond_refine_threshold() {
        let config = AnalysisEngineConfig::default();
        assert_eq!(select_strategy(20000, 8192, &config), AnalysisStrategy::MapReduce);
    }

    #[test]
    fn parse_record_strips_code_fence() {
        let raw = "```json\n{\"summary\": \"ok\"}\n```";
        let record = parse_record(raw).unwrap();
        assert_eq!(record.summary, "ok");
    }

    #[test]
    fn dedupe_normalized_collapses_case_and_whitespace_variants() {
        let mut items = vec!["KRAS".to_string(), " kras ".to_string(), "TP53".to_string()];
        dedupe_normalized(&mut items);
        assert_eq!(items.len(), 2);
    }
}
