//! Conversation engine (C5): streams a chat answer by combining retrieval,
//! LLM generation, response caching and conversation persistence behind a
//! single operation.

pub mod engine;
pub mod events;

pub use engine::ConversationEngine;
pub use events::{EndPayload, StreamEvent};
