//! Scriptable `LlmBackend` (C2's structured-LLM leg), promoted from the
//! shape `thoth-llm`'s own router tests already use privately, extended
//! with a call counter and a configurable embedding dimension so
//! `thoth-rag`/`thoth-notes` tests can assert on what was sent without a
//! real model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thoth_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse};

/// Always succeeds with a canned response; records every request it saw.
pub struct FakeLlmBackend {
    model_id: String,
    local: bool,
    response_text: String,
    embedding_dim: usize,
    calls: Mutex<Vec<LlmRequest>>,
    call_count: AtomicUsize,
}

impl FakeLlmBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), local: true, response_text: "fake response".to_string(), embedding_dim: 8, calls: Mutex::new(Vec::new()), call_count: AtomicUsize::new(0) }
    }

    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response_text = text.into();
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request `complete` has been called with so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmBackend for FakeLlmBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(req);
        Ok(LlmResponse { content: self.response_text.clone(), model: self.model_id.clone(), prompt_tokens: 0, completion_tokens: 0 })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| deterministic_embedding(t, self.embedding_dim)).collect())
    }

    fn model_id(&self) -> &str {
        &self.model_id
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

/// A reproducible, non-random embedding derived from the text's own bytes,
/// so two calls on the same text always fuse/cosine-compare consistently
/// in tests without pulling in a real model.
fn deterministic_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % dim] += byte as f32;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use thoth_llm::Message;

    #[tokio::test]
    async fn complete_returns_canned_response_and_records_the_request() {
        let backend = FakeLlmBackend::new("fake-1").with_response("hello");
        let req = LlmRequest { messages: vec![Message { role: "user".to_string(), content: "hi".to_string() }], model: None, max_tokens: None, temperature: None };

        let resp = backend.complete(req).await.unwrap();

        assert_eq!(resp.content, "hello");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn embed_is_deterministic_for_the_same_text() {
        let backend = FakeLlmBackend::new("fake-1").with_embedding_dim(16);
        let a = backend.embed(vec!["same text".to_string()]).await.unwrap();
        let b = backend.embed(vec!["same text".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }
}
