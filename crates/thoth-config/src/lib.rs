//! Layered configuration for Thoth.
//!
//! Resolution order (lowest to highest precedence): built-in defaults, then
//! `thoth.toml` (path from `THOTH_CONFIG`, default `./thoth.toml`), then
//! `THOTH_`-prefixed environment variables (`THOTH_LLM__MODE`, etc., double
//! underscore separates nesting — see [`apply_env_overrides`]). Secrets
//! (API keys, bearer tokens) are never read from the toml file directly;
//! they're loaded from environment/`.env` into [`secrecy::SecretString`] so
//! they never appear in a `Debug` print or a log line.

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

mod tests;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_vault_path")]
    pub vault_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path(), vault_path: default_vault_path() }
    }
}

fn default_db_path() -> String {
    "./data/thoth.db".to_string()
}
fn default_vault_path() -> String {
    "./vault".to_string()
}

/// Data classification that gates which LLM backend a call may use
/// (§4.4 privacy routing). Kept as a config-facing string enum so
/// `thoth.toml` stays human-editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    Confidential,
    Internal,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_local_backend")]
    pub local_backend: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
    pub openai: Option<LlmBackendConfig>,
    pub anthropic: Option<LlmBackendConfig>,
    #[serde(default)]
    pub rate_limits: LlmRateLimits,
    /// Routing policy: which backend handles each classification tier.
    /// Confidential always routes to `local_backend` regardless of this
    /// map (§4.4 invariant), so only `internal`/`public` are consulted.
    #[serde(default)]
    pub routing: LlmRouting,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            local_backend: default_local_backend(),
            local_model: default_local_model(),
            local_base_url: default_local_base_url(),
            openai: None,
            anthropic: None,
            rate_limits: LlmRateLimits::default(),
            routing: LlmRouting::default(),
        }
    }
}

fn default_local_backend() -> String {
    "ollama".to_string()
}
fn default_local_model() -> String {
    "llama3:8b".to_string()
}
fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    pub model: String,
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    /// Populated from environment at load time, never from the toml file.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

fn default_remote_base_url() -> String {
    String::new()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRateLimits {
    #[serde(default = "default_openai_rpm")]
    pub openai_requests_per_second: f64,
    #[serde(default = "default_anthropic_rpm")]
    pub anthropic_requests_per_second: f64,
    #[serde(default = "default_local_rpm")]
    pub local_requests_per_second: f64,
}

impl Default for LlmRateLimits {
    fn default() -> Self {
        Self {
            openai_requests_per_second: default_openai_rpm(),
            anthropic_requests_per_second: default_anthropic_rpm(),
            local_requests_per_second: default_local_rpm(),
        }
    }
}

fn default_openai_rpm() -> f64 {
    1.0
}
fn default_anthropic_rpm() -> f64 {
    1.0
}
fn default_local_rpm() -> f64 {
    4.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRouting {
    #[serde(default = "default_public_backend")]
    pub public: String,
    #[serde(default = "default_internal_backend")]
    pub internal: String,
}

impl Default for LlmRouting {
    fn default() -> Self {
        Self { public: default_public_backend(), internal: default_internal_backend() }
    }
}

fn default_public_backend() -> String {
    "openai".to_string()
}
fn default_internal_backend() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_intake_dir")]
    pub intake_dir: String,
    #[serde(default = "default_chunk_overlap")]
    pub analysis_chunk_overlap_tokens: usize,
    #[serde(default = "default_crossref_rps")]
    pub crossref_requests_per_second: f64,
    /// Contact address sent in the `User-Agent` of polite-pool API calls
    /// (CrossRef, OpenAlex). No default — an empty value is a
    /// configuration error the caller should surface, not silently mask.
    pub contact_email: Option<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            intake_dir: default_intake_dir(),
            analysis_chunk_overlap_tokens: default_chunk_overlap(),
            crossref_requests_per_second: default_crossref_rps(),
            contact_email: None,
        }
    }
}

fn default_intake_dir() -> String {
    "./intake".to_string()
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_crossref_rps() -> f64 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: default_embed_model(), dim: default_embed_dim(), batch_size: default_batch_size() }
    }
}

fn default_embed_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}
fn default_embed_dim() -> usize {
    384
}
fn default_batch_size() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_rag_chunk_tokens")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_rag_overlap_tokens")]
    pub chunk_overlap_tokens: usize,
    #[serde(default = "default_hybrid_vector_weight")]
    pub hybrid_vector_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_rag_chunk_tokens(),
            chunk_overlap_tokens: default_rag_overlap_tokens(),
            hybrid_vector_weight: default_hybrid_vector_weight(),
        }
    }
}

fn default_rag_chunk_tokens() -> usize {
    1000
}
fn default_rag_overlap_tokens() -> usize {
    200
}
fn default_hybrid_vector_weight() -> f64 {
    0.6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default = "default_notes_template")]
    pub template_name: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self { template_name: default_notes_template() }
    }
}

fn default_notes_template() -> String {
    "paper_note".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { enabled: bool_true(), debounce_ms: default_debounce_ms() }
    }
}

fn bool_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    500
}

impl Settings {
    /// Load configuration: defaults, then `thoth.toml` if present, then
    /// `THOTH_`-prefixed environment overrides, then secret material from
    /// the environment (never from the toml file).
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("THOTH_CONFIG").unwrap_or_else(|_| "thoth.toml".to_string());
        let mut settings = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        apply_env_overrides(&mut settings)?;
        load_secrets(&mut settings);
        Ok(settings)
    }
}

/// Applies `THOTH_SECTION__FIELD`-style environment overrides on top of the
/// toml-loaded settings. Only the handful of fields operators actually
/// override at deploy time are wired up here; anything else belongs in
/// `thoth.toml`.
fn apply_env_overrides(settings: &mut Settings) -> anyhow::Result<()> {
    if let Ok(v) = std::env::var("THOTH_STORAGE__DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Ok(v) = std::env::var("THOTH_STORAGE__VAULT_PATH") {
        settings.storage.vault_path = v;
    }
    if let Ok(v) = std::env::var("THOTH_LLM__LOCAL_BACKEND") {
        settings.llm.local_backend = v;
    }
    if let Ok(v) = std::env::var("THOTH_LLM__LOCAL_BASE_URL") {
        settings.llm.local_base_url = v;
    }
    if let Ok(v) = std::env::var("THOTH_INGESTION__CONTACT_EMAIL") {
        settings.ingestion.contact_email = Some(v);
    }
    if let Ok(v) = std::env::var("THOTH_WATCH__ENABLED") {
        settings.watch.enabled = v.parse().unwrap_or(settings.watch.enabled);
    }
    Ok(())
}

/// Populates API keys from environment variables into `SecretString`s so
/// they never round-trip through the toml file or a log line.
fn load_secrets(settings: &mut Settings) {
    if let Ok(key) = std::env::var("THOTH_OPENAI_API_KEY") {
        let cfg = settings.llm.openai.get_or_insert_with(|| LlmBackendConfig {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
        });
        cfg.api_key = Some(SecretString::from(key));
    }
    if let Ok(key) = std::env::var("THOTH_ANTHROPIC_API_KEY") {
        let cfg = settings.llm.anthropic.get_or_insert_with(|| LlmBackendConfig {
            model: "claude-3-5-haiku-latest".to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: None,
        });
        cfg.api_key = Some(SecretString::from(key));
    }
}
