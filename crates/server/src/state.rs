//! Application state
//!
//! Shared across all handlers.

use std::sync::Arc;

use assistant_config::Settings;
use assistant_engine::ConversationEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Settings,
    pub engine: Arc<ConversationEngine>,
    /// Set once the vector store and embedding chain latch successfully.
    /// `GET /chat/status` reports this without touching the retriever.
    pub rag_initialized: bool,
    pub knowledge_documents: u64,
    pub embedding_provider: String,
    pub providers_configured: Vec<&'static str>,
}

impl AppState {
    pub fn new(
        config: Settings,
        engine: Arc<ConversationEngine>,
        rag_initialized: bool,
        knowledge_documents: u64,
        embedding_provider: String,
        providers_configured: Vec<&'static str>,
    ) -> Self {
        Self { config, engine, rag_initialized, knowledge_documents, embedding_provider, providers_configured }
    }
}
