//! Narration client surface for Tollgate.
//!
//! Provides the `LlmClient` trait, a Cohere chat implementation, and the
//! `Narrator` that turns free-form model replies into structured JSON with
//! deterministic fallbacks.
mod cohere;
mod narration;
mod retry;
mod types;

pub use cohere::{CohereClient, CohereConfig, DEFAULT_COHERE_API_BASE};
pub use narration::{
    extract_json_object, NarrationPair, Narrator, DEFAULT_NARRATION_MODEL,
    DEFAULT_NARRATION_TEMPERATURE,
};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole, TollgateAiError,
};
