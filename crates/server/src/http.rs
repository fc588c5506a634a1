//! HTTP endpoints: a synchronous ask, a streaming ask and a status probe.

use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/chat/ask", post(ask))
        .route("/chat/ask/stream", post(ask_stream))
        .route("/chat/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    message: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    reply: String,
    sources: Vec<assistant_core::document::Source>,
    rag_used: bool,
    language: &'static str,
}

async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> impl IntoResponse {
    match state.engine.answer(request.message, request.user_id).await {
        Ok(data) => Json(AskResponse {
            reply: data.reply,
            sources: data.sources,
            rag_used: data.rag_used,
            language: data.language,
        })
        .into_response(),
        Err(message) => {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": message }))).into_response()
        }
    }
}

async fn ask_stream(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.engine.answer_streaming(request.message, request.user_id);
    let events = ReceiverStream::new(rx).map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| r#"{"type":"error","message":"serialization failure"}"#.to_string());
        Ok(Event::default().data(payload))
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    rag_initialized: bool,
    knowledge_documents: u64,
    embedding_provider: String,
    llm_providers_configured: Vec<&'static str>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        rag_initialized: state.rag_initialized,
        knowledge_documents: state.knowledge_documents,
        embedding_provider: state.embedding_provider.clone(),
        llm_providers_configured: state.providers_configured.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_config::Settings;
    use assistant_core::traits::{ConversationStore, LlmBackend, Message, ResponseCache, TokenStream};
    use assistant_core::{ConversationStats, HistoryMessage};
    use assistant_engine::ConversationEngine;
    use assistant_llm::LlmOrchestrator;
    use assistant_rag::{RetrievalOutcome, RetrievalPort};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EmptyRetriever;
    #[async_trait]
    impl RetrievalPort for EmptyRetriever {
        async fn retrieve(&self, _query: assistant_core::retrieval::Query) -> RetrievalOutcome {
            RetrievalOutcome::default()
        }
    }

    struct EchoBackend;
    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(&self, _messages: &[Message]) -> assistant_core::Result<String> {
            Ok("ok".to_string())
        }
        async fn generate_stream(&self, _messages: &[Message]) -> assistant_core::Result<TokenStream> {
            Ok(Box::pin(futures::stream::iter(vec![Ok("ok".to_string())])))
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct NullStore;
    #[async_trait]
    impl ConversationStore for NullStore {
        async fn save_turn(&self, _turn: &assistant_core::ConversationTurn) -> assistant_core::Result<()> {
            Ok(())
        }
        async fn load_context(&self, _user_id: &str, _limit: usize) -> assistant_core::Result<Vec<HistoryMessage>> {
            Ok(Vec::new())
        }
        async fn clear_conversation(&self, _user_id: &str) -> assistant_core::Result<()> {
            Ok(())
        }
        async fn stats(&self, _user_id: &str) -> assistant_core::Result<ConversationStats> {
            Ok(ConversationStats::default())
        }
        async fn cleanup_older_than(&self, _days: i64) -> assistant_core::Result<usize> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct NullCache;
    #[async_trait]
    impl ResponseCache for NullCache {
        async fn get(&self, _fingerprint: &str) -> Option<String> {
            None
        }
        async fn set(&self, _fingerprint: &str, _payload: &str, _ttl_secs: u64) {}
    }

    fn test_state() -> AppState {
        let engine = Arc::new(ConversationEngine::new(
            Arc::new(EmptyRetriever),
            Arc::new(LlmOrchestrator::new(vec![Arc::new(EchoBackend)])),
            Arc::new(NullCache),
            Arc::new(NullStore),
        ));
        AppState::new(Settings::default(), engine, false, 0, "dummy".to_string(), vec![])
    }

    #[test]
    fn router_builds_with_the_three_documented_routes() {
        let _ = create_router(test_state());
    }
}
