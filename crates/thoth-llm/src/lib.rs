//! thoth-llm — LLM backend abstraction and routing (the structured-LLM leg
//! of ExternalGateway, C2) used by AnalysisEngine (C4) to call local and
//! remote models under a data-classification policy.

pub mod audit;
pub mod backend;
pub mod router;

pub use audit::LlmAuditEntry;
pub use backend::{AnthropicBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OllamaBackend, OpenAiBackend};
pub use router::{build_router, LlmRouter, RoutingPolicy, LOCAL_BACKEND_NAME};
