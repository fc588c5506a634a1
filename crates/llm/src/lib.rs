//! LLM Orchestrator (C4): a provider chain (Groq, Gemini, OpenAI) behind
//! one streaming interface, plus the system-prompt builder and the
//! response cache that sits in front of it.

pub mod backend;
pub mod orchestrator;
pub mod prompt;
pub mod response_cache;

pub use backend::{GeminiBackend, GroqBackend, OpenAiBackend};
pub use orchestrator::LlmOrchestrator;
pub use prompt::{system_prompt, PromptBuilder};
pub use response_cache::{fingerprint, InMemoryResponseCache, RedisResponseCache};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation error: {0}")]
    Generation(String),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no providers configured")]
    NoProviders,

    #[error("all providers exhausted: {0}")]
    Exhausted(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for assistant_core::Error {
    fn from(err: LlmError) -> Self {
        assistant_core::Error::Llm(err.to_string())
    }
}
