//! Docling OCR/markdown extraction service client — stage 2 of
//! `DocumentPipeline` (§4.8): one PDF in, two markdown variants out (with
//! images for display, without for analysis/embeddings).
//!
//! `ExternalGateway` (C2) is JSON-request-only, so it can't carry a
//! multipart PDF upload; this client keeps its own `reqwest::Client` for
//! that one call but reuses C2's `RetryPolicy` for backoff so OCR calls
//! back off the same way every other outbound call does.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thoth_common::gateway::retry::RetryPolicy;
use tokio::fs;
use tracing::warn;

const DOCLING_DEFAULT_URL: &str = "http://localhost:8003";

/// Docling service client for document parsing.
pub struct DoclingClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

/// The two markdown variants stage 2 produces for one document (§4.8).
#[derive(Debug, Clone)]
pub struct MarkdownVariants {
    pub with_images: String,
    pub no_images: String,
    pub page_count: Option<i32>,
}

impl DoclingClient {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.unwrap_or(DOCLING_DEFAULT_URL).to_string(),
            client: Client::builder().timeout(Duration::from_secs(120)).build().expect("failed to build docling http client"),
            retry: RetryPolicy::default(),
        }
    }

    pub async fn health_check(&self) -> anyhow::Result<bool> {
        let resp = self.client.get(format!("{}/health", self.base_url)).send().await?;
        Ok(resp.status().is_success())
    }

    /// Parse `pdf_path` and return its with-images / no-images markdown
    /// pair. Retries transient failures per `RetryPolicy`; a persistent
    /// failure is fatal to the document (§4.8 failure taxonomy: "OCR
    /// failure fatal").
    pub async fn parse_pdf(&self, pdf_path: &Path) -> anyhow::Result<MarkdownVariants> {
        let file_bytes = fs::read(pdf_path).await?;
        let filename = pdf_path.file_name().and_then(|n| n.to_str()).unwrap_or("document.pdf").to_string();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let part = reqwest::multipart::Part::bytes(file_bytes.clone()).file_name(filename.clone()).mime_str("application/pdf")?;
            let form = reqwest::multipart::Form::new().part("file", part);

            match self.client.post(format!("{}/parse", self.base_url)).multipart(form).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let doc: DoclingResponse = resp.json().await?;
                    return Ok(MarkdownVariants {
                        with_images: doc.markdown_with_images,
                        no_images: doc.markdown_no_images,
                        page_count: doc.page_count,
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !self.retry.should_retry(attempt, Some(status.as_u16())) {
                        let body = resp.text().await.unwrap_or_default();
                        anyhow::bail!("docling parse failed: {status} {body}");
                    }
                    warn!(attempt, %status, "docling parse failed, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt, None)).await;
                }
                Err(err) => {
                    if !self.retry.should_retry(attempt, None) {
                        return Err(err.into());
                    }
                    warn!(attempt, error = %err, "docling parse request error, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt, None)).await;
                }
            }
        }
    }
}

/// Wire response from the Docling service's `/parse` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct DoclingResponse {
    markdown_with_images: String,
    markdown_no_images: String,
    page_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_points_at_local_service() {
        let client = DoclingClient::new(None);
        assert_eq!(client.base_url, DOCLING_DEFAULT_URL);
    }
}
