//! OpenAlex lookup stage (§4.3 stage 2): search by title, filtered to
//! `year ± 1`, accepted only on an exact normalized-title match against the
//! top result.

use reqwest::Method;
use serde::Deserialize;
use thoth_common::cache::CacheStore;
use thoth_common::gateway::{Gateway, GatewayRequest, ServiceConfig};

use crate::models::ResolverCandidate;

const SERVICE: &str = "openalex";

fn encode_query(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub async fn register_service<S: CacheStore>(gateway: &Gateway<S>) {
    gateway.register_service(ServiceConfig::new(SERVICE, 10.0)).await;
}

/// Search OpenAlex for `title`. `contact_email`, when set, is sent as the
/// `mailto` query param per OpenAlex's polite-pool guidance — faster, more
/// reliable rate limits for API users who identify themselves.
pub async fn lookup<S: CacheStore + Send + Sync + 'static>(
    gateway: &Gateway<S>,
    title: &str,
    expected_year: Option<i32>,
    contact_email: Option<&str>,
) -> anyhow::Result<Option<ResolverCandidate>> {
    let mut url = format!("https://api.openalex.org/works?search={}&per-page=1", encode_query(title));
    if let Some(year) = expected_year {
        url.push_str(&format!("&filter=publication_year:{}-{}", year - 1, year + 1));
    }
    if let Some(email) = contact_email {
        url.push_str(&format!("&mailto={}", encode_query(email)));
    }

    let req: GatewayRequest<'_, ()> = GatewayRequest { method: Method::GET, url: &url, body: None, bearer_token: None, extra_headers: Vec::new(), extra_fingerprint_parts: vec![] };
    let resp: OpenAlexResponse = gateway.call(SERVICE, req).await?;

    let Some(top) = resp.results.into_iter().next() else { return Ok(None) };
    let candidate = top.into_candidate();

    if crate::resolve::fuzzy::token_set_ratio(title, &candidate.title) < 0.98 {
        return Ok(None);
    }

    Ok(Some(candidate))
}

#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    title: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    #[serde(default)]
    authorships: Vec<OpenAlexAuthorship>,
    primary_location: Option<OpenAlexLocation>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: Option<OpenAlexAuthor>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexLocation {
    source: Option<OpenAlexSource>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexSource {
    display_name: Option<String>,
}

impl OpenAlexWork {
    fn into_candidate(self) -> ResolverCandidate {
        let doi = self.doi.as_deref().map(|d| d.trim_start_matches("https://doi.org/").to_string());
        let venue = self.primary_location.and_then(|l| l.source).and_then(|s| s.display_name);
        let authors = self.authorships.into_iter().filter_map(|a| a.author).filter_map(|a| a.display_name).collect();
        ResolverCandidate { doi, arxiv_id: None, title: self.title.unwrap_or_default(), year: self.publication_year, venue, authors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_doi_url_prefix_from_openalex_response() {
        let work = OpenAlexWork {
            title: Some("Attention Is All You Need".to_string()),
            publication_year: Some(2017),
            doi: Some("https://doi.org/10.5555/3295222.3295349".to_string()),
            authorships: vec![],
            primary_location: None,
        };
        let candidate = work.into_candidate();
        assert_eq!(candidate.doi, Some("10.5555/3295222.3295349".to_string()));
    }
}
