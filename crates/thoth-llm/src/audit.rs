//! Audit trail for LLM calls: which backend, how much, and a hash of the
//! output rather than the output itself, so logs stay reviewable without
//! duplicating (possibly large) model output into the audit store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thoth_config::DataClassification;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub data_class: DataClassification,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    pub fn new(model: String, backend: String, prompt_tokens: u32, completion_tokens: u32, data_class: DataClassification, output: &str, latency_ms: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self { id: Uuid::new_v4(), model, backend, prompt_tokens, completion_tokens, data_class, output_hash, latency_ms, called_at: Utc::now() }
    }
}
