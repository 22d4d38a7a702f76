//! ExternalGateway (C2) — uniform, rate-limited, retrying, cached access to
//! OCR, LLM, and metadata APIs. Core logic here is provider-agnostic; the
//! concrete providers (`thoth-llm`, `thoth-ingestion::resolve`) are callers,
//! not parts of this module.

pub mod rate_limit;
pub mod retry;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::{CacheStore, ContentCache};
use crate::error::{AppError, Result};
use crate::fingerprint::fingerprint;
use rate_limit::RateLimiterRegistry;
use retry::RetryPolicy;

/// Per-service configuration: base URL, rate budget, timeout, retry budget.
/// Auth tokens are not stored here — callers attach them per-request via
/// `secrecy::SecretString` so they never end up in a `Debug` of this struct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub requests_per_second: f64,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// GET-like requests are cacheable; non-idempotent calls bypass C1.
    pub cacheable: bool,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, requests_per_second: f64) -> Self {
        Self {
            name: name.into(),
            requests_per_second,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cacheable: true,
        }
    }
}

/// A single named call against an upstream.
pub struct GatewayRequest<'a, B: Serialize> {
    pub method: Method,
    pub url: &'a str,
    pub body: Option<&'a B>,
    pub bearer_token: Option<&'a str>,
    /// Raw headers beyond bearer auth (e.g. Anthropic's `x-api-key` +
    /// `anthropic-version`, which don't fit the bearer-token shape).
    pub extra_headers: Vec<(&'a str, &'a str)>,
    /// Additional fingerprint parts beyond method+path+params (e.g. a model
    /// name for an LLM call) so cache keys distinguish logically distinct
    /// requests to the same endpoint.
    pub extra_fingerprint_parts: Vec<String>,
}

pub struct Gateway<S: CacheStore> {
    client: Client,
    allowlist: HashSet<String>,
    limiters: RateLimiterRegistry,
    services: std::sync::RwLock<std::collections::HashMap<String, ServiceConfig>>,
    cache: Arc<ContentCache<S>>,
}

impl<S: CacheStore> Gateway<S> {
    pub fn new(cache: Arc<ContentCache<S>>) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(AppError::Http)?;

        let default_allow = [
            "api.crossref.org",
            "api.openalex.org",
            "export.arxiv.org",
            "api.semanticscholar.org",
            "localhost",
            "127.0.0.1",
            "api.openai.com",
            "api.anthropic.com",
            "generativelanguage.googleapis.com",
            "huggingface.co",
            "cdn-lfs.huggingface.co",
        ];

        Ok(Self {
            client,
            allowlist: default_allow.iter().map(|s| s.to_string()).collect(),
            limiters: RateLimiterRegistry::new(),
            services: std::sync::RwLock::new(std::collections::HashMap::new()),
            cache,
        })
    }

    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        self.allowlist.iter().any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub async fn register_service(&self, config: ServiceConfig) {
        self.limiters.register(&config.name, config.requests_per_second).await;
        self.services.write().unwrap().insert(config.name.clone(), config);
    }

    fn service_config(&self, service: &str) -> Result<ServiceConfig> {
        self.services
            .read()
            .unwrap()
            .get(service)
            .cloned()
            .ok_or_else(|| AppError::Fatal(format!("service '{service}' not registered with gateway")))
    }

    /// `call(service, request) -> response`. Applies rate limiting, retries,
    /// caching (for cacheable GETs), and a per-request timeout, in that
    /// order: wait for a token, then retry-loop the (possibly cached) call.
    #[instrument(skip(self, req), fields(service, method = %req.method))]
    pub async fn call<B: Serialize, R: DeserializeOwned>(
        &self,
        service: &str,
        req: GatewayRequest<'_, B>,
    ) -> Result<R> {
        let config = self.service_config(service)?;

        if !self.is_allowed(req.url) {
            return Err(AppError::Upstream4xx(format!(
                "domain not in gateway allowlist for URL {}",
                req.url
            )));
        }

        let is_get_like = req.method == Method::GET && config.cacheable;
        let cache_key = if is_get_like {
            let mut parts = vec![service.to_string(), req.method.to_string(), req.url.to_string()];
            parts.extend(req.extra_fingerprint_parts.iter().cloned());
            Some(fingerprint(&parts.iter().map(String::as_str).collect::<Vec<_>>()))
        } else {
            None
        };

        if let Some(ref key) = cache_key {
            if let Some(hit) = self.cache.get("gateway", key).await {
                if let Ok(parsed) = serde_json::from_slice::<R>(&hit) {
                    return Ok(parsed);
                }
            }
        }

        let limiter = self.limiters.get(service).await.ok_or_else(|| {
            AppError::Fatal(format!("rate limiter for service '{service}' missing after registration"))
        })?;
        limiter.acquire(config.timeout).await?;

        let bytes = self.execute_with_retry(&config, &req).await?;

        if let Some(key) = cache_key {
            self.cache.put("gateway", &key, bytes.clone(), Some(Duration::from_secs(3600))).await;
        }

        serde_json::from_slice(&bytes).map_err(AppError::Serialization)
    }

    /// Like `call`, but returns the raw response body instead of decoding it
    /// as JSON. For upstreams that speak Atom/XML (arXiv) or return opaque
    /// bytes — same allowlist/cache/rate-limit/retry policy applies.
    #[instrument(skip(self, req), fields(service, method = %req.method))]
    pub async fn call_raw<B: Serialize>(&self, service: &str, req: GatewayRequest<'_, B>) -> Result<Vec<u8>> {
        let config = self.service_config(service)?;

        if !self.is_allowed(req.url) {
            return Err(AppError::Upstream4xx(format!(
                "domain not in gateway allowlist for URL {}",
                req.url
            )));
        }

        let is_get_like = req.method == Method::GET && config.cacheable;
        let cache_key = if is_get_like {
            let mut parts = vec![service.to_string(), req.method.to_string(), req.url.to_string()];
            parts.extend(req.extra_fingerprint_parts.iter().cloned());
            Some(fingerprint(&parts.iter().map(String::as_str).collect::<Vec<_>>()))
        } else {
            None
        };

        if let Some(ref key) = cache_key {
            if let Some(hit) = self.cache.get("gateway", key).await {
                return Ok(hit);
            }
        }

        let limiter = self.limiters.get(service).await.ok_or_else(|| {
            AppError::Fatal(format!("rate limiter for service '{service}' missing after registration"))
        })?;
        limiter.acquire(config.timeout).await?;

        let bytes = self.execute_with_retry(&config, &req).await?;

        if let Some(key) = cache_key {
            self.cache.put("gateway", &key, bytes.clone(), Some(Duration::from_secs(3600))).await;
        }

        Ok(bytes)
    }

    async fn execute_with_retry<B: Serialize>(
        &self,
        config: &ServiceConfig,
        req: &GatewayRequest<'_, B>,
    ) -> Result<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut builder = self.client.request(req.method.clone(), req.url).timeout(config.timeout);
            if let Some(token) = req.bearer_token {
                builder = builder.bearer_auth(token);
            }
            for (name, value) in &req.extra_headers {
                builder = builder.header(*name, *value);
            }
            if let Some(body) = req.body {
                builder = builder.json(body);
            }

            let outcome = builder.send().await;
            match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);

                    if status.is_success() {
                        return resp.bytes().await.map(|b| b.to_vec()).map_err(AppError::Http);
                    }

                    if !config.retry.should_retry(attempt, Some(status.as_u16())) {
                        return Err(AppError::Upstream4xx(format!("{} returned {}", req.url, status)));
                    }

                    warn!(service = %config.name, attempt, %status, "transient upstream failure, retrying");
                    tokio::time::sleep(config.retry.delay_for(attempt, retry_after)).await;
                }
                Err(err) => {
                    if !config.retry.should_retry(attempt, None) {
                        return Err(AppError::Transient(err.to_string()));
                    }
                    warn!(service = %config.name, attempt, error = %err, "network error, retrying");
                    tokio::time::sleep(config.retry.delay_for(attempt, None)).await;
                }
            }
        }
    }
}

/// Emitted by `call_structured` callers after exhausting schema-validation
/// retries (§4.2). Kept distinct from `AppError::SchemaViolation` so callers
/// can attach the last raw output for diagnostics without growing the
/// shared error enum's payload.
#[derive(Debug, Clone)]
pub struct SchemaViolationDetail {
    pub service: String,
    pub attempts: u32,
    pub last_raw_output: String,
}

impl std::fmt::Display for SchemaViolationDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "service '{}' failed schema validation after {} attempts",
            self.service, self.attempts
        )
    }
}

pub fn log_call_outcome(service: &str, cache_hit: bool, ok: bool) {
    info!(service, cache_hit, ok, "gateway call completed");
}
