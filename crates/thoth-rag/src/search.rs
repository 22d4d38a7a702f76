//! Hybrid dense+lexical retrieval for C6 (§4.6): a dense ANN leg and a
//! BM25-style lexical leg, pooled at a wider candidate size and fused by
//! reciprocal rank fusion (RRF) down to the caller's requested `k`.

use std::collections::HashMap;
use std::sync::Arc;

use thoth_config::SearchConfig;
use thoth_db::chunks::ChunkSearchFilter;
use thoth_db::papers::PaperRepository;
use thoth_db::schema::Chunk;
use thoth_db::ChunkRepository;
use thoth_embed::LocalEmbedder;

/// RRF's damping constant. 60 is the value from the original RRF paper and
/// the de facto default everywhere it's used since.
const RRF_K: f32 = 60.0;

/// Candidate-pool multiplier: each leg is searched this many times wider
/// than the final `k` before fusion narrows back down (§4.6: "dense top-k_d
/// (~4k)").
const POOL_MULTIPLIER: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub paper_id: Option<String>,
    pub source_kind: Option<String>,
    pub tag: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    /// Cosine similarity between the query and this chunk's own embedding,
    /// independent of RRF rank — the signal `ask`'s `min_similarity` filters
    /// on.
    pub similarity: f32,
}

pub struct RagSearch {
    chunks: ChunkRepository,
    papers: PaperRepository,
    embedder: Arc<LocalEmbedder>,
    config: SearchConfig,
}

impl RagSearch {
    pub fn new(chunks: ChunkRepository, papers: PaperRepository, embedder: Arc<LocalEmbedder>, config: SearchConfig) -> Self {
        Self { chunks, papers, embedder, config }
    }

    /// Resolve `SearchFilters` into the `ChunkSearchFilter` the repository
    /// layer understands, pre-resolving tag/year into a paper id set since
    /// `Chunk` rows don't carry those columns themselves.
    async fn resolve_filter(&self, filters: &SearchFilters) -> anyhow::Result<ChunkSearchFilter> {
        let mut resolved = ChunkSearchFilter { paper_id: filters.paper_id.clone(), source_kind: filters.source_kind.clone(), paper_ids: None };

        if filters.tag.is_some() || filters.year_min.is_some() || filters.year_max.is_some() {
            let ids = self.papers.find_ids_by_tag_and_year(filters.tag.as_deref(), filters.year_min, filters.year_max).await?;
            resolved.paper_ids = Some(ids);
        }

        Ok(resolved)
    }

    pub async fn search(&self, query: &str, k: usize, filters: &SearchFilters) -> anyhow::Result<Vec<ScoredChunk>> {
        let filter = self.resolve_filter(filters).await?;
        let pool_size = (k * POOL_MULTIPLIER).max(k);

        let query_vector = self.embedder.embed_one(query).await?;
        let dense = self.chunks.search_similar_filtered(&query_vector, pool_size, &filter).await?;

        let lexical_candidates = self.chunks.find_by_filter(&filter, pool_size * 4).await?;
        let query_tokens = thoth_common::lexical::lexical_tokens(query);
        let lexical = rank_bm25(&lexical_candidates, &query_tokens, pool_size);

        let fused = fuse(&dense, &lexical, self.config.hybrid_vector_weight as f32);

        let mut scored: Vec<ScoredChunk> = fused
            .into_iter()
            .map(|(chunk, score)| {
                let similarity = chunk.embedding.as_deref().map(|e| cosine_similarity(&query_vector, e)).unwrap_or(0.0);
                ScoredChunk { chunk, score, similarity }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Reciprocal rank fusion over two rank-ordered (best-first) lists, blended
/// by `hybrid_vector_weight` (the dense leg's share of the combined score).
fn fuse(dense: &[Chunk], lexical: &[Chunk], hybrid_vector_weight: f32) -> Vec<(Chunk, f32)> {
    let lexical_weight = 1.0 - hybrid_vector_weight;
    let mut scores: HashMap<uuid::Uuid, f32> = HashMap::new();
    let mut chunks_by_id: HashMap<uuid::Uuid, Chunk> = HashMap::new();

    for (rank, chunk) in dense.iter().enumerate() {
        *scores.entry(chunk.id).or_insert(0.0) += hybrid_vector_weight * rrf_term(rank);
        chunks_by_id.entry(chunk.id).or_insert_with(|| chunk.clone());
    }
    for (rank, chunk) in lexical.iter().enumerate() {
        *scores.entry(chunk.id).or_insert(0.0) += lexical_weight * rrf_term(rank);
        chunks_by_id.entry(chunk.id).or_insert_with(|| chunk.clone());
    }

    let mut fused: Vec<(Chunk, f32)> = scores.into_iter().filter_map(|(id, score)| chunks_by_id.remove(&id).map(|chunk| (chunk, score))).collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

fn rrf_term(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}

/// Rank `candidates` by BM25 against `query_tokens`, returning the top `k`
/// best-first. IDF is computed over `candidates` itself — the lexical
/// candidate pool already narrowed by `ChunkSearchFilter`, not the whole
/// table — since there's no persistent inverted index to consult.
fn rank_bm25(candidates: &[Chunk], query_tokens: &[String], k: usize) -> Vec<Chunk> {
    const K1: f32 = 1.2;
    const B: f32 = 0.75;

    if candidates.is_empty() || query_tokens.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = candidates.iter().map(|c| serde_json::from_str(&c.lexical_tokens).unwrap_or_default()).collect();
    let avg_len = docs.iter().map(|d| d.len() as f32).sum::<f32>() / docs.len() as f32;
    let n = docs.len() as f32;

    let mut idf: HashMap<&str, f32> = HashMap::new();
    for term in query_tokens {
        if idf.contains_key(term.as_str()) {
            continue;
        }
        let containing = docs.iter().filter(|d| d.iter().any(|t| t == term)).count() as f32;
        idf.insert(term.as_str(), ((n - containing + 0.5) / (containing + 0.5) + 1.0).ln());
    }

    let mut scored: Vec<(usize, f32)> = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let len = doc.len() as f32;
            let score = query_tokens
                .iter()
                .map(|term| {
                    let f = doc.iter().filter(|t| *t == term).count() as f32;
                    if f == 0.0 {
                        return 0.0;
                    }
                    let term_idf = idf.get(term.as_str()).copied().unwrap_or(0.0);
                    term_idf * (f * (K1 + 1.0)) / (f + K1 * (1.0 - B + B * len / avg_len))
                })
                .sum();
            (i, score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.into_iter().map(|(i, _)| candidates[i].clone()).collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn rrf_term_decreases_with_rank() {
        assert!(rrf_term(0) > rrf_term(1));
        assert!(rrf_term(1) > rrf_term(10));
    }

    #[test]
    fn bm25_ranks_matching_document_above_unrelated_one() {
        let mut a = Chunk::new("p1".to_string(), 1, thoth_db::schema::SourceKind::PaperBody, 0, "about transformers".to_string());
        a.lexical_tokens = serde_json::to_string(&vec!["transformer".to_string(), "attention".to_string(), "model".to_string()]).unwrap();
        let mut b = Chunk::new("p1".to_string(), 1, thoth_db::schema::SourceKind::PaperBody, 1, "about gardening".to_string());
        b.lexical_tokens = serde_json::to_string(&vec!["garden".to_string(), "soil".to_string(), "plant".to_string()]).unwrap();

        let ranked = rank_bm25(&[a.clone(), b.clone()], &["transformer".to_string(), "attention".to_string()], 2);
        assert_eq!(ranked[0].id, a.id);
    }
}
