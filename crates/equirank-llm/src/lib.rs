//! equirank-llm — Model backend abstraction for Equirank.
//!
//! Priority-ordered text generation over several remote and local model
//! services, with retry and backoff per backend, a bounded audit trail, and
//! a deterministic offline generator used whenever no backend answers.

pub mod audit;
pub mod backend;
pub mod classification;
pub mod narrator;
pub mod offline;
pub mod prompts;
pub mod router;

pub use backend::{
    AnthropicBackend, BackendKind, GeminiBackend, LlmError, MockBackend, ModelBackend,
    ModelRequest, ModelResponse, OpenAiCompatibleBackend, SamplingDefaults, SamplingParams,
};
pub use narrator::Narrator;
pub use prompts::AnalysisKind;
pub use router::{build_router, BackendConfig, BackendStatus, ModelRouter, RouterSettings};
