use thiserror::Error;

/// Abstract error kinds from the error-handling design (spec §7).
///
/// Every crate boundary in the workspace returns this type (or wraps it)
/// rather than `Box<dyn Error>` or bare `anyhow::Error`, so callers can match
/// on the kind to decide retry/propagation behavior per component.
#[derive(Debug, Error)]
pub enum AppError {
    /// Retryable I/O or upstream 5xx/429; exhausted retries surface this to
    /// the caller unchanged (ExternalGateway retries internally first).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Rate limiter budget exhausted before the caller's deadline elapsed.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Non-retryable upstream rejection (bad request, auth failure, 404).
    #[error("upstream rejected request: {0}")]
    Upstream4xx(String),

    /// LLM structured output failed schema validation after bounded retries.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent modification of the active version was detected.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Cross-store mismatch detected (relational/graph/vector disagree).
    #[error("integrity error: {0}")]
    IntegrityError(String),

    /// Deadline exceeded or caller cancellation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Unrecoverable — disk full, corrupt state, programmer error surfaced
    /// at a boundary that cannot route it anywhere else.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether C2's retry policy should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
