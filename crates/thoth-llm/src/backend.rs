//! LLM backend trait and concrete implementations.
//!
//! Every backend sends its HTTP traffic through `thoth-common`'s
//! `ExternalGateway` (C2) rather than holding its own `reqwest::Client`, so
//! rate limiting, retries, and the allowlist apply uniformly to local and
//! remote model calls alike (§4.2).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use thoth_common::cache::CacheStore;
use thoth_common::error::AppError;
use thoth_common::gateway::{Gateway, GatewayRequest, ServiceConfig};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("gateway error: {0}")]
    Gateway(#[from] AppError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("data classification policy blocked this request: {0}")]
    PolicyBlocked(String),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

impl LlmError {
    fn from_gateway(err: AppError) -> Self {
        match err {
            AppError::RateLimited(_) => LlmError::RateLimitExceeded,
            AppError::SchemaViolation(msg) => LlmError::PolicyBlocked(msg),
            other => LlmError::Gateway(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
    fn max_context_tokens(&self) -> usize;
    fn max_output_tokens(&self) -> usize;
}

fn chat_choice_content(json: &serde_json::Value, fallback_model: &str) -> LlmResponse {
    LlmResponse {
        content: json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

// ---------------------------------------------------------------------------
// Ollama backend (local)
// ---------------------------------------------------------------------------

pub struct OllamaBackend<S: CacheStore> {
    gateway: Arc<Gateway<S>>,
    service: String,
    base_url: String,
    model: String,
}

impl<S: CacheStore> OllamaBackend<S> {
    /// Registers the `llm-ollama` service with the gateway and returns a
    /// backend bound to it. `requests_per_second` comes from
    /// `LlmRateLimits::local_requests_per_second`.
    pub async fn new(gateway: Arc<Gateway<S>>, base_url: impl Into<String>, model: impl Into<String>, requests_per_second: f64) -> Self {
        let service = "llm-ollama".to_string();
        gateway.register_service(ServiceConfig::new(service.clone(), requests_per_second)).await;
        Self { gateway, service, base_url: base_url.into(), model: model.into() }
    }
}

#[async_trait]
impl<S: CacheStore + Send + Sync + 'static> LlmBackend for OllamaBackend<S> {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        // Ollama OpenAI-compatible /v1/chat/completions endpoint.
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });

        let gw_req = GatewayRequest {
            method: Method::POST,
            url: &url,
            body: Some(&body),
            bearer_token: None,
            extra_headers: Vec::new(),
            extra_fingerprint_parts: vec![model.clone()],
        };
        let json: serde_json::Value = self.gateway.call(&self.service, gw_req).await.map_err(LlmError::from_gateway)?;
        Ok(chat_choice_content(&json, &model))
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({"model": &self.model, "input": text});
            let gw_req = GatewayRequest {
                method: Method::POST,
                url: &url,
                body: Some(&body),
                bearer_token: None,
                extra_headers: Vec::new(),
                extra_fingerprint_parts: vec![self.model.clone()],
            };
            let json: serde_json::Value = self.gateway.call(&self.service, gw_req).await.map_err(LlmError::from_gateway)?;
            let vec: Vec<f32> = serde_json::from_value(json["data"][0]["embedding"].clone())?;
            embeddings.push(vec);
        }
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
    fn is_local(&self) -> bool {
        true
    }
    fn max_context_tokens(&self) -> usize {
        32768
    }
    fn max_output_tokens(&self) -> usize {
        8192
    }
}

// ---------------------------------------------------------------------------
// OpenAI backend (remote)
// ---------------------------------------------------------------------------

pub struct OpenAiBackend<S: CacheStore> {
    gateway: Arc<Gateway<S>>,
    service: String,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl<S: CacheStore> OpenAiBackend<S> {
    pub async fn new(gateway: Arc<Gateway<S>>, base_url: impl Into<String>, model: impl Into<String>, api_key: SecretString, requests_per_second: f64) -> Self {
        let service = "llm-openai".to_string();
        gateway.register_service(ServiceConfig::new(service.clone(), requests_per_second)).await;
        Self { gateway, service, base_url: base_url.into(), model: model.into(), api_key }
    }
}

#[async_trait]
impl<S: CacheStore + Send + Sync + 'static> LlmBackend for OpenAiBackend<S> {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });

        let gw_req = GatewayRequest {
            method: Method::POST,
            url: &url,
            body: Some(&body),
            bearer_token: Some(self.api_key.expose_secret()),
            extra_headers: Vec::new(),
            extra_fingerprint_parts: vec![model.clone()],
        };
        let json: serde_json::Value = self.gateway.call(&self.service, gw_req).await.map_err(LlmError::from_gateway)?;
        Ok(chat_choice_content(&json, &model))
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({"model": &self.model, "input": texts});
        let gw_req = GatewayRequest {
            method: Method::POST,
            url: &url,
            body: Some(&body),
            bearer_token: Some(self.api_key.expose_secret()),
            extra_headers: Vec::new(),
            extra_fingerprint_parts: vec![self.model.clone()],
        };
        let json: serde_json::Value = self.gateway.call(&self.service, gw_req).await.map_err(LlmError::from_gateway)?;
        let embeddings = json["data"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|item| serde_json::from_value(item["embedding"].clone()).unwrap_or_default())
            .collect();
        Ok(embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
    fn is_local(&self) -> bool {
        false
    }
    fn max_context_tokens(&self) -> usize {
        128000
    }
    fn max_output_tokens(&self) -> usize {
        16384
    }
}

// ---------------------------------------------------------------------------
// Anthropic backend (remote)
// ---------------------------------------------------------------------------

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend<S: CacheStore> {
    gateway: Arc<Gateway<S>>,
    service: String,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl<S: CacheStore> AnthropicBackend<S> {
    pub async fn new(gateway: Arc<Gateway<S>>, base_url: impl Into<String>, model: impl Into<String>, api_key: SecretString, requests_per_second: f64) -> Self {
        let service = "llm-anthropic".to_string();
        gateway.register_service(ServiceConfig::new(service.clone(), requests_per_second)).await;
        Self { gateway, service, base_url: base_url.into(), model: model.into(), api_key }
    }
}

#[async_trait]
impl<S: CacheStore + Send + Sync + 'static> LlmBackend for AnthropicBackend<S> {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{}/messages", self.base_url);

        // Anthropic takes the system prompt out-of-band from the turn list.
        let (system, turns): (Vec<&Message>, Vec<&Message>) = req.messages.iter().partition(|m| m.role == "system");
        let system_prompt: Option<String> = if system.is_empty() { None } else { Some(system.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")) };

        let mut body = serde_json::json!({
            "model": model,
            "messages": turns,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });
        if let Some(system_prompt) = &system_prompt {
            body["system"] = serde_json::Value::String(system_prompt.clone());
        }

        let api_key = self.api_key.expose_secret().to_string();
        let gw_req = GatewayRequest {
            method: Method::POST,
            url: &url,
            body: Some(&body),
            bearer_token: None,
            extra_headers: vec![("x-api-key", api_key.as_str()), ("anthropic-version", ANTHROPIC_VERSION)],
            extra_fingerprint_parts: vec![model.clone()],
        };
        let json: serde_json::Value = self.gateway.call(&self.service, gw_req).await.map_err(LlmError::from_gateway)?;

        Ok(LlmResponse {
            content: json["content"][0]["text"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or(&model).to_string(),
            prompt_tokens: json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::Unavailable("Anthropic does not expose an embeddings endpoint".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
    fn is_local(&self) -> bool {
        false
    }
    fn max_context_tokens(&self) -> usize {
        200000
    }
    fn max_output_tokens(&self) -> usize {
        8192
    }
}
