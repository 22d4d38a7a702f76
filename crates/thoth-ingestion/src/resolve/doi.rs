//! DOI lookup stage (§4.3 stage 1): pull a DOI out of the raw citation text
//! and verify it against Crossref.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use thoth_common::cache::CacheStore;
use thoth_common::error::AppError;
use thoth_common::gateway::{Gateway, GatewayRequest, ServiceConfig};

use crate::models::ResolverCandidate;
use crate::pdf::normalize_doi;

const SERVICE: &str = "crossref";

lazy_static! {
    static ref DOI_PATTERN: Regex = Regex::new(r"10\.\d{4,9}/[^\s\]\)\x22'>,]+").unwrap();
}

/// Pull the first DOI-shaped substring out of a reference-list entry.
pub fn extract_doi(text: &str) -> Option<String> {
    DOI_PATTERN.find(text).map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

pub async fn register_service<S: CacheStore>(gateway: &Gateway<S>) {
    gateway.register_service(ServiceConfig::new(SERVICE, 5.0)).await;
}

/// Look up `doi` against Crossref. Returns `Ok(None)` on a stage miss (not
/// found, or found but the title/year don't corroborate); returns `Err` only
/// for upstream failures the caller should log and otherwise ignore (§4.3
/// failure semantics — a stage error never aborts the resolver).
pub async fn lookup<S: CacheStore + Send + Sync + 'static>(
    gateway: &Gateway<S>,
    doi: &str,
    expected_title: Option<&str>,
    expected_year: Option<i32>,
) -> anyhow::Result<Option<ResolverCandidate>> {
    let normalized = normalize_doi(doi);
    let url = format!("https://api.crossref.org/works/{normalized}");
    let req: GatewayRequest<'_, ()> = GatewayRequest { method: Method::GET, url: &url, body: None, bearer_token: None, extra_headers: Vec::new(), extra_fingerprint_parts: vec![] };

    let envelope: CrossrefEnvelope = match gateway.call(SERVICE, req).await {
        Ok(r) => r,
        Err(err) if is_not_found(&err) => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let candidate = envelope.message.into_candidate();

    if let Some(title) = expected_title {
        if crate::resolve::fuzzy::token_set_ratio(title, &candidate.title) < 0.6 {
            return Ok(None);
        }
    }
    if let (Some(expected), Some(actual)) = (expected_year, candidate.year) {
        if (expected - actual).abs() > 1 {
            return Ok(None);
        }
    }

    Ok(Some(candidate))
}

fn is_not_found(err: &AppError) -> bool {
    matches!(err, AppError::Upstream4xx(msg) if msg.contains("404"))
}

#[derive(Debug, Deserialize)]
struct CrossrefEnvelope {
    message: CrossrefWork,
}

#[derive(Debug, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    #[serde(default, rename = "container-title")]
    container_title: Vec<String>,
    #[serde(rename = "published-print")]
    published_print: Option<CrossrefDateParts>,
    #[serde(rename = "published-online")]
    published_online: Option<CrossrefDateParts>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefDateParts {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<i32>>,
}

impl CrossrefWork {
    fn year(&self) -> Option<i32> {
        self.published_print.as_ref().or(self.published_online.as_ref()).and_then(|d| d.date_parts.first()).and_then(|parts| parts.first()).copied()
    }

    fn into_candidate(self) -> ResolverCandidate {
        let authors = self
            .author
            .iter()
            .map(|a| match (&a.given, &a.family) {
                (Some(g), Some(f)) => format!("{g} {f}"),
                (None, Some(f)) => f.clone(),
                (Some(g), None) => g.clone(),
                (None, None) => String::new(),
            })
            .filter(|s| !s.is_empty())
            .collect();
        let year = self.year();
        ResolverCandidate { doi: self.doi, arxiv_id: None, title: self.title.into_iter().next().unwrap_or_default(), year, venue: self.container_title.into_iter().next(), authors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_doi_from_surrounding_citation_text() {
        let text = "Vaswani et al. (2017), https://doi.org/10.5555/3295222.3295349, Attention is All You Need.";
        assert_eq!(extract_doi(text), Some("10.5555/3295222.3295349".to_string()));
    }

    #[test]
    fn returns_none_when_no_doi_present() {
        let text = "Vaswani et al. (2017), Attention is All You Need, NeurIPS.";
        assert_eq!(extract_doi(text), None);
    }
}
