//! LLM router — selects a backend by data classification (§4.4 privacy
//! routing: confidential content never leaves the local backend).

use std::collections::HashMap;
use std::sync::Arc;

use thoth_config::{DataClassification, LlmConfig};

use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};

pub const LOCAL_BACKEND_NAME: &str = "local";

/// Which named backend handles each classification tier. Confidential
/// always routes to `local_backend` regardless of `public`/`internal` —
/// that invariant is enforced in [`LlmRouter::select_backend`], not here.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub local_backend: String,
    pub public_backend: String,
    pub internal_backend: String,
}

impl RoutingPolicy {
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            local_backend: LOCAL_BACKEND_NAME.to_string(),
            public_backend: llm.routing.public.clone(),
            internal_backend: llm.routing.internal.clone(),
        }
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            local_backend: LOCAL_BACKEND_NAME.to_string(),
            public_backend: "openai".to_string(),
            internal_backend: LOCAL_BACKEND_NAME.to_string(),
        }
    }
}

pub struct LlmRouter {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
    policy: RoutingPolicy,
}

impl LlmRouter {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { backends: HashMap::new(), policy }
    }

    pub fn register_backend(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Route a request under the given classification: select backend →
    /// execute → return response. Classification is the caller's to assert
    /// (AnalysisEngine knows whether it's sending paper text or a
    /// user-authored note), not sniffed from the prompt.
    pub async fn route(&self, req: LlmRequest, class: DataClassification) -> Result<LlmResponse, LlmError> {
        let backend = self.select_backend(class)?;

        tracing::info!(model = backend.model_id(), class = ?class, is_local = backend.is_local(), "LLM request routed");

        backend.complete(req).await
    }

    /// Embed texts using the configured embedding backend (always local
    /// unless the caller explicitly registered a remote one under `name`).
    pub async fn embed(&self, texts: Vec<String>, backend_name: &str) -> Result<Vec<Vec<f32>>, LlmError> {
        let backend = self.backends.get(backend_name).ok_or_else(|| LlmError::Unavailable(format!("embedding backend '{backend_name}' not registered")))?;
        backend.embed(texts).await
    }

    fn select_backend(&self, class: DataClassification) -> Result<&Arc<dyn LlmBackend>, LlmError> {
        match class {
            DataClassification::Confidential => {
                let b = self.backends.get(&self.policy.local_backend).ok_or_else(|| LlmError::Unavailable("local backend not configured for confidential data".to_string()))?;
                if !b.is_local() {
                    return Err(LlmError::PolicyBlocked("confidential data cannot be sent to a remote LLM".to_string()));
                }
                Ok(b)
            }
            DataClassification::Internal => self.backends.get(&self.policy.internal_backend).ok_or_else(|| LlmError::Unavailable(format!("internal-routed backend '{}' not configured", self.policy.internal_backend))),
            DataClassification::Public => self.backends.get(&self.policy.public_backend).ok_or_else(|| LlmError::Unavailable(format!("public-routed backend '{}' not configured", self.policy.public_backend))),
        }
    }

    /// Context window of whichever backend `class` resolves to — used by
    /// AnalysisEngine (C4) to pick direct/refine/map-reduce without hardcoding
    /// a model's limits.
    pub fn max_context_tokens(&self, class: DataClassification) -> Result<usize, LlmError> {
        Ok(self.select_backend(class)?.max_context_tokens())
    }

    /// Which model id a classification tier currently resolves to — used in
    /// C1 cache fingerprints so a routing change invalidates stale results.
    pub fn model_id(&self, class: DataClassification) -> Result<String, LlmError> {
        Ok(self.select_backend(class)?.model_id().to_string())
    }

    pub fn registered_backends(&self) -> Vec<(&str, bool)> {
        self.backends.iter().map(|(name, b)| (name.as_str(), b.is_local())).collect()
    }
}

/// Builds a router with every backend named by `config` registered:
/// `local` always, `openai`/`anthropic` when their section is present (i.e.
/// an API key was found at startup — see `thoth_config::load`).
///
/// Takes `config` by value (rather than `&LlmConfig`) so the loaded
/// `SecretString` API keys can move into their backend instead of being
/// cloned — `secrecy` deliberately doesn't derive `Clone` for secret types.
pub async fn build_router<S>(gateway: Arc<thoth_common::gateway::Gateway<S>>, config: LlmConfig) -> LlmRouter
where
    S: thoth_common::cache::CacheStore + Send + Sync + 'static,
{
    let mut router = LlmRouter::new(RoutingPolicy::from_config(&config));

    let local = crate::backend::OllamaBackend::new(gateway.clone(), &config.local_base_url, &config.local_model, config.rate_limits.local_requests_per_second).await;
    router.register_backend(LOCAL_BACKEND_NAME, Arc::new(local));

    if let Some(openai) = config.openai {
        if let Some(api_key) = openai.api_key {
            let backend = crate::backend::OpenAiBackend::new(gateway.clone(), openai.base_url, openai.model, api_key, config.rate_limits.openai_requests_per_second).await;
            router.register_backend("openai", Arc::new(backend));
        } else {
            tracing::warn!("llm.openai configured but no API key loaded, skipping registration");
        }
    }

    if let Some(anthropic) = config.anthropic {
        if let Some(api_key) = anthropic.api_key {
            let backend = crate::backend::AnthropicBackend::new(gateway.clone(), anthropic.base_url, anthropic.model, api_key, config.rate_limits.anthropic_requests_per_second).await;
            router.register_backend("anthropic", Arc::new(backend));
        } else {
            tracing::warn!("llm.anthropic configured but no API key loaded, skipping registration");
        }
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Message;
    use async_trait::async_trait;

    struct FakeBackend {
        name: &'static str,
        local: bool,
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse { content: self.name.to_string(), model: self.name.to_string(), prompt_tokens: 0, completion_tokens: 0 })
        }
        async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(vec![])
        }
        fn model_id(&self) -> &str {
            self.name
        }
        fn is_local(&self) -> bool {
            self.local
        }
        fn max_context_tokens(&self) -> usize {
            4096
        }
        fn max_output_tokens(&self) -> usize {
            1024
        }
    }

    fn router_with_local_and_remote() -> LlmRouter {
        let mut router = LlmRouter::new(RoutingPolicy::default());
        router.register_backend(LOCAL_BACKEND_NAME, Arc::new(FakeBackend { name: "local-model", local: true }));
        router.register_backend("openai", Arc::new(FakeBackend { name: "gpt", local: false }));
        router
    }

    fn sample_request() -> LlmRequest {
        LlmRequest { messages: vec![Message { role: "user".to_string(), content: "hi".to_string() }], model: None, max_tokens: None, temperature: None }
    }

    #[tokio::test]
    async fn confidential_always_routes_local() {
        let router = router_with_local_and_remote();
        let resp = router.route(sample_request(), DataClassification::Confidential).await.unwrap();
        assert_eq!(resp.model, "local-model");
    }

    #[tokio::test]
    async fn public_routes_to_configured_default() {
        let router = router_with_local_and_remote();
        let resp = router.route(sample_request(), DataClassification::Public).await.unwrap();
        assert_eq!(resp.model, "gpt");
    }

    #[tokio::test]
    async fn internal_stays_local_by_default_policy() {
        let router = router_with_local_and_remote();
        let resp = router.route(sample_request(), DataClassification::Internal).await.unwrap();
        assert_eq!(resp.model, "local-model");
    }

    #[tokio::test]
    async fn confidential_errors_if_local_backend_missing() {
        let mut router = LlmRouter::new(RoutingPolicy::default());
        router.register_backend("openai", Arc::new(FakeBackend { name: "gpt", local: false }));
        let err = router.route(sample_request(), DataClassification::Confidential).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
