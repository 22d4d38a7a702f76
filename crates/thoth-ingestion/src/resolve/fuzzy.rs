//! Fuzzy match stage (§4.3 stage 4): score a raw citation against a known
//! paper when DOI/OpenAlex/arXiv lookups all miss. Weighted combination of
//! title similarity, author overlap, year agreement, and venue equality.

use thoth_db::Paper;

/// Minimum combined score to accept a fuzzy match (§4.3).
pub const ACCEPT_THRESHOLD: f32 = 0.82;

/// Score a candidate paper against extracted citation fields. Weights sum to
/// 1.0: title 0.5, authors 0.25, year 0.15, venue 0.10 (§4.3).
pub fn score(query_title: &str, query_year: Option<i32>, query_venue: Option<&str>, query_authors: &[String], candidate: &Paper) -> f32 {
    let title_score = token_set_ratio(query_title, &candidate.title);

    let candidate_authors: Vec<String> = serde_json::from_str(&candidate.authors).unwrap_or_default();
    let author_score = surname_jaccard(query_authors, &candidate_authors);

    let year_score = match (query_year, candidate.year) {
        (Some(a), Some(b)) if a == b => 1.0,
        (Some(a), Some(b)) if (a - b).abs() == 1 => 0.5,
        _ => 0.0,
    };

    let venue_score = match (query_venue, candidate.venue.as_deref()) {
        (Some(a), Some(b)) if normalize(a) == normalize(b) && !normalize(a).is_empty() => 1.0,
        _ => 0.0,
    };

    0.5 * title_score + 0.25 * author_score + 0.15 * year_score + 0.10 * venue_score
}

/// Pick the best-scoring candidate at or above the acceptance threshold.
/// Ties on score go to whichever candidate carries a DOI; if that still
/// ties, the match is rejected rather than guessed (§4.3 tie-break rule).
pub fn pick_best(scored: Vec<(Paper, f32)>) -> Option<(String, f32)> {
    let mut best: Vec<(Paper, f32)> = Vec::new();
    let mut best_score = 0.0f32;
    for (paper, s) in scored {
        if s < ACCEPT_THRESHOLD {
            continue;
        }
        if s > best_score + f32::EPSILON {
            best_score = s;
            best = vec![(paper, s)];
        } else if (s - best_score).abs() <= f32::EPSILON {
            best.push((paper, s));
        }
    }

    match best.len() {
        0 => None,
        1 => Some((best[0].0.id.clone(), best[0].1)),
        _ => {
            let with_doi: Vec<_> = best.iter().filter(|(p, _)| p.doi.is_some()).collect();
            match with_doi.len() {
                1 => Some((with_doi[0].0.id.clone(), with_doi[0].1)),
                _ => None,
            }
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(s: &str) -> Vec<String> {
    normalize(s).split_whitespace().map(str::to_string).collect()
}

/// Token-set ratio in the style of fuzzywuzzy: split both strings into
/// tokens, compare the shared-token core against each string's full token
/// set, and take the best of the three pairwise similarities. Handles
/// titles that differ only by a reordered or truncated subtitle.
pub fn token_set_ratio(a: &str, b: &str) -> f32 {
    let tokens_a: std::collections::BTreeSet<String> = tokenize(a).into_iter().collect();
    let tokens_b: std::collections::BTreeSet<String> = tokenize(b).into_iter().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return if tokens_a.is_empty() && tokens_b.is_empty() { 1.0 } else { 0.0 };
    }

    let intersection: Vec<&String> = tokens_a.intersection(&tokens_b).collect();
    let diff_a: Vec<&String> = tokens_a.difference(&tokens_b).collect();
    let diff_b: Vec<&String> = tokens_b.difference(&tokens_a).collect();

    let joined = |tokens: &[&String]| tokens.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");

    let core = joined(&intersection);
    let variant_a = format!("{core} {}", joined(&diff_a)).trim().to_string();
    let variant_b = format!("{core} {}", joined(&diff_b)).trim().to_string();

    let ratio = |x: &str, y: &str| strsim::normalized_levenshtein(x, y) as f32;

    ratio(&core, &variant_a).max(ratio(&core, &variant_b)).max(ratio(&variant_a, &variant_b))
}

fn surname(full_name: &str) -> String {
    full_name.trim().split_whitespace().last().unwrap_or("").to_lowercase()
}

fn surname_jaccard(query_authors: &[String], candidate_authors: &[String]) -> f32 {
    if query_authors.is_empty() || candidate_authors.is_empty() {
        return 0.0;
    }
    let a: std::collections::HashSet<String> = query_authors.iter().map(|n| surname(n)).filter(|s| !s.is_empty()).collect();
    let b: std::collections::HashSet<String> = candidate_authors.iter().map(|n| surname(n)).filter(|s| !s.is_empty()).collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count() as f32;
    let union = a.union(&b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_ratio_is_robust_to_subtitle_truncation() {
        let a = "Attention Is All You Need";
        let b = "Attention Is All You Need: A Transformer Architecture";
        assert!(token_set_ratio(a, b) > 0.8);
    }

    #[test]
    fn token_set_ratio_penalizes_unrelated_titles() {
        let a = "Attention Is All You Need";
        let b = "Deep Residual Learning for Image Recognition";
        assert!(token_set_ratio(a, b) < 0.5);
    }

    #[test]
    fn surname_jaccard_matches_on_overlapping_authors() {
        let query = vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()];
        let candidate = vec!["Ashish Vaswani".to_string(), "Someone Else".to_string()];
        let score = surname_jaccard(&query, &candidate);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn pick_best_rejects_unresolvable_tie_without_doi() {
        let mut p1 = Paper::new("a".to_string(), "T".to_string(), "a.pdf".to_string());
        let mut p2 = Paper::new("b".to_string(), "T".to_string(), "b.pdf".to_string());
        p1.doi = None;
        p2.doi = None;
        let scored = vec![(p1, 0.9), (p2, 0.9)];
        assert!(pick_best(scored).is_none());
    }

    #[test]
    fn pick_best_breaks_tie_in_favor_of_doi_bearing_candidate() {
        let p1 = Paper::new("a".to_string(), "T".to_string(), "a.pdf".to_string());
        let mut p2 = Paper::new("b".to_string(), "T".to_string(), "b.pdf".to_string());
        p2.doi = Some("10.1/xyz".to_string());
        let scored = vec![(p1, 0.9), (p2, 0.9)];
        let (id, score) = pick_best(scored).unwrap();
        assert_eq!(id, "b");
        assert_eq!(score, 0.9);
    }
}
