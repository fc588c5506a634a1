use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationStats, ConversationTurn, HistoryMessage};
use crate::error::Result;

/// A chat message in the unified `{role, content}` wire shape every LLM
/// provider is translated to and from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Capability interface every concrete LLM provider implements.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Returns a single-pass, finite stream of text chunks. Implementations
    /// must preserve token order bit-exactly relative to `generate`.
    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream>;

    fn name(&self) -> &str;
}

/// Capability interface every concrete embedding provider implements.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dim(&self) -> usize;

    fn name(&self) -> &str;
}

/// Abstract conversation memory port. A pure port with no back-reference
/// to the engine, so memory and engine never form a cycle.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// Most recent `limit` messages for `user_id`, oldest first.
    async fn load_context(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryMessage>>;

    async fn clear_conversation(&self, user_id: &str) -> Result<()>;

    async fn stats(&self, user_id: &str) -> Result<ConversationStats>;

    /// Archives conversations inactive for longer than `days`. Returns the
    /// number of conversations removed.
    async fn cleanup_older_than(&self, days: i64) -> Result<usize>;
}

/// Process-local or Redis-backed cache for fully-generated responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Option<String>;

    async fn set(&self, fingerprint: &str, payload: &str, ttl_secs: u64);
}
