//! arXiv lookup stage (§4.3 stage 3): accept on an explicit arXiv id found
//! in the citation text, or on an exact normalized-title match against
//! arXiv's search API.
//!
//! arXiv's API speaks Atom/XML, so this goes through `Gateway::call_raw`
//! rather than `call` and decodes with `quick_xml` directly.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use thoth_common::cache::CacheStore;
use thoth_common::gateway::{Gateway, GatewayRequest, ServiceConfig};

use crate::models::ResolverCandidate;

const SERVICE: &str = "arxiv";

lazy_static! {
    static ref ARXIV_ID_PATTERN: Regex = Regex::new(r"(?:arXiv:)?(\d{4}\.\d{4,5})(v\d+)?").unwrap();
}

/// Pull an arXiv id (e.g. `2301.00001`) out of a reference-list entry.
pub fn extract_arxiv_id(text: &str) -> Option<String> {
    ARXIV_ID_PATTERN.captures(text).map(|c| c[1].to_string())
}

pub async fn register_service<S: CacheStore>(gateway: &Gateway<S>) {
    gateway.register_service(ServiceConfig::new(SERVICE, 3.0)).await;
}

/// Look up by explicit id when `citation_text` carries one; otherwise
/// search by `title` and accept only an exact normalized-title match on the
/// top entry.
pub async fn lookup<S: CacheStore + Send + Sync + 'static>(gateway: &Gateway<S>, citation_text: &str, title: &str) -> anyhow::Result<Option<ResolverCandidate>> {
    let id_query = extract_arxiv_id(citation_text);
    let url = match &id_query {
        Some(id) => format!("http://export.arxiv.org/api/query?id_list={id}&max_results=1"),
        None => format!("http://export.arxiv.org/api/query?search_query=ti:%22{}%22&max_results=1", encode_query(title)),
    };

    let req: GatewayRequest<'_, ()> = GatewayRequest { method: Method::GET, url: &url, body: None, bearer_token: None, extra_headers: Vec::new(), extra_fingerprint_parts: vec![] };
    let bytes = gateway.call_raw(SERVICE, req).await?;
    let xml = String::from_utf8_lossy(&bytes);

    let feed: Feed = quick_xml::de::from_str(&xml)?;
    let Some(entry) = feed.entry.into_iter().next() else { return Ok(None) };
    let candidate = entry.into_candidate();

    if id_query.is_none() && crate::resolve::fuzzy::token_set_ratio(title, &candidate.title) < 0.98 {
        return Ok(None);
    }

    Ok(Some(candidate))
}

fn encode_query(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default, rename = "entry")]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    published: String,
    #[serde(default)]
    author: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

impl Entry {
    fn into_candidate(self) -> ResolverCandidate {
        let arxiv_id = extract_arxiv_id(&self.id);
        let year = self.published.get(0..4).and_then(|y| y.parse().ok());
        let title = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        ResolverCandidate { doi: None, arxiv_id, title, year, venue: None, authors: self.author.into_iter().map(|a| a.name).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_arxiv_id_with_version_suffix() {
        assert_eq!(extract_arxiv_id("arXiv:2301.00001v2"), Some("2301.00001".to_string()));
    }

    #[test]
    fn extracts_arxiv_id_without_prefix() {
        assert_eq!(extract_arxiv_id("see 1706.03762 for details"), Some("1706.03762".to_string()));
    }

    #[test]
    fn returns_none_without_an_id_shaped_substring() {
        assert_eq!(extract_arxiv_id("Attention Is All You Need"), None);
    }
}
