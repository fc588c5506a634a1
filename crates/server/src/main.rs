//! Process entry point: loads configuration, latches the embedding chain,
//! opens the vector store, wires the LLM provider chain and the
//! conversation engine, then serves HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_config::{load_settings, Settings};
use assistant_core::traits::{LlmBackend, ResponseCache};
use assistant_core::EmbeddingBackend;
use assistant_engine::ConversationEngine;
use assistant_llm::{GeminiBackend, GroqBackend, InMemoryResponseCache, LlmOrchestrator, OpenAiBackend, RedisResponseCache};
use assistant_persistence::PostgresConfig;
use assistant_rag::{
    CollectionStore, CollectionStoreConfig, DummyEmbedder, EmbeddingProviderChain, LocalEmbedder,
    RemoteApiAEmbedder, RemoteApiBEmbedder, Retriever, RetrieverConfig,
};
use assistant_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("ASSISTANT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!(environment = ?config.environment, "starting assistant server");

    let embeddings = Arc::new(build_embedding_chain(&config).await);
    let embedding_provider = embeddings.name().to_string();
    tracing::info!(provider = %embedding_provider, dim = embeddings.dim(), "embedding provider latched");

    let (retriever, rag_initialized, knowledge_documents) = match build_retriever(&config, embeddings).await {
        Ok((retriever, count)) => (Some(retriever), true, count),
        Err(e) => {
            tracing::warn!(error = %e, "vector store unavailable, RAG context will be empty");
            (None, false, 0)
        }
    };

    let llm_backends = build_llm_backends(&config);
    let mut providers_configured = Vec::new();
    if config.llm.groq_api_key.is_some() {
        providers_configured.push("groq");
    }
    if config.llm.google_api_key.is_some() {
        providers_configured.push("gemini");
    }
    if config.llm.openai_api_key.is_some() {
        providers_configured.push("openai");
    }
    let pinned = config.llm.pinned_provider.map(|p| match p {
        assistant_config::LlmProvider::Groq => "groq",
        assistant_config::LlmProvider::Gemini => "gemini",
        assistant_config::LlmProvider::OpenAi => "openai",
    });
    let orchestrator = Arc::new(LlmOrchestrator::new(llm_backends).with_pinned(pinned));

    let response_cache: Arc<dyn ResponseCache> = match &config.persistence.redis_url {
        Some(url) if config.persistence.redis_cache_enabled => match RedisResponseCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("response cache backed by Redis");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to Redis, using in-memory response cache");
                Arc::new(InMemoryResponseCache::new())
            }
        },
        _ => Arc::new(InMemoryResponseCache::new()),
    };

    let conversation_store = match &config.persistence.conversation_db_url {
        Some(url) => match assistant_persistence::init(PostgresConfig::from_url(url.clone())).await {
            Ok(store) => {
                tracing::info!("conversation store backed by Postgres");
                Arc::new(store) as Arc<dyn assistant_core::traits::ConversationStore>
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize Postgres conversation store");
                return Err(Box::new(e) as Box<dyn std::error::Error>);
            }
        },
        None => {
            tracing::warn!("CONVERSATION_DB_URL not set, falling back to an empty conversation store");
            Arc::new(NullConversationStore)
        }
    };

    let retriever: Arc<dyn assistant_rag::RetrievalPort> = match retriever {
        Some(r) => Arc::new(r),
        None => Arc::new(EmptyRetriever),
    };

    let engine = Arc::new(ConversationEngine::new(retriever, orchestrator, response_cache, conversation_store));

    let port = config.server.port;
    let host = config.server.host.clone();
    let state = AppState::new(config, engine, rag_initialized, knowledge_documents, embedding_provider, providers_configured);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn build_embedding_chain(config: &Settings) -> EmbeddingProviderChain {
    use assistant_config::constants::endpoints;
    use assistant_rag::embeddings::EmbeddingConfig;

    let dim = config.rag.vector_dim;
    let embedding_config = EmbeddingConfig { embedding_dim: dim, ..EmbeddingConfig::default() };
    let local: Arc<dyn EmbeddingBackend> = Arc::new(LocalEmbedder::hash_fallback(embedding_config));
    let api_a: Arc<dyn EmbeddingBackend> =
        Arc::new(RemoteApiAEmbedder::new(endpoints::HF_API_DEFAULT.clone(), config.rag.hf_api_key.clone(), dim));
    let api_b: Arc<dyn EmbeddingBackend> = Arc::new(RemoteApiBEmbedder::new(endpoints::LOCAL_EMBEDDING_DEFAULT.clone(), dim));
    let dummy: Arc<dyn EmbeddingBackend> = Arc::new(DummyEmbedder::new(dim));

    let mut candidates = vec![local, api_a, api_b, dummy];
    let pinned_index = match config.rag.embedding_primary.as_deref() {
        Some("local") => Some(0),
        Some("apiA") => Some(1),
        Some("apiB") => Some(2),
        _ => None,
    };
    if let Some(i) = pinned_index {
        let pinned = candidates.remove(i);
        candidates.insert(0, pinned);
    }
    EmbeddingProviderChain::latch(candidates).await
}

async fn build_retriever(
    config: &Settings,
    embeddings: Arc<EmbeddingProviderChain>,
) -> Result<(Retriever, u64), assistant_rag::RagError> {
    let store_config = CollectionStoreConfig { endpoint: config.rag.vector_store_path.clone(), api_key: None };
    let store = CollectionStore::connect(store_config)?;
    let retriever_config = RetrieverConfig {
        website_collection: config.rag.website_collection.clone(),
        ista_collection: config.rag.ista_collection.clone(),
        ..Default::default()
    };
    let retriever = Retriever::new(embeddings, store, retriever_config).await?;
    // Precise counts would require exposing the store's per-collection
    // counters through the retriever; left at zero rather than guessing.
    Ok((retriever, 0))
}

fn build_llm_backends(config: &Settings) -> Vec<Arc<dyn LlmBackend>> {
    let mut backends: Vec<Arc<dyn LlmBackend>> = Vec::new();
    if let Some(key) = &config.llm.groq_api_key {
        backends.push(Arc::new(GroqBackend::new(key.clone(), "llama-3.1-8b-instant")));
    }
    if let Some(key) = &config.llm.google_api_key {
        backends.push(Arc::new(GeminiBackend::new(key.clone(), "gemini-1.5-flash")));
    }
    if let Some(key) = &config.llm.openai_api_key {
        backends.push(Arc::new(OpenAiBackend::new(key.clone(), "gpt-3.5-turbo")));
    }
    backends
}

struct EmptyRetriever;

#[async_trait::async_trait]
impl assistant_rag::RetrievalPort for EmptyRetriever {
    async fn retrieve(&self, _query: assistant_core::retrieval::Query) -> assistant_rag::RetrievalOutcome {
        assistant_rag::RetrievalOutcome::default()
    }
}

struct NullConversationStore;

#[async_trait::async_trait]
impl assistant_core::traits::ConversationStore for NullConversationStore {
    async fn save_turn(&self, _turn: &assistant_core::ConversationTurn) -> assistant_core::Result<()> {
        Ok(())
    }
    async fn load_context(&self, _user_id: &str, _limit: usize) -> assistant_core::Result<Vec<assistant_core::HistoryMessage>> {
        Ok(Vec::new())
    }
    async fn clear_conversation(&self, _user_id: &str) -> assistant_core::Result<()> {
        Ok(())
    }
    async fn stats(&self, _user_id: &str) -> assistant_core::Result<assistant_core::ConversationStats> {
        Ok(assistant_core::ConversationStats::default())
    }
    async fn cleanup_older_than(&self, _days: i64) -> assistant_core::Result<usize> {
        Ok(0)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("assistant={},tower_http=debug", config.observability.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    if config.observability.log_json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
}
