//! Retrieval pipeline: an embedding provider chain (C1), a Qdrant-backed
//! vector store adapter (C2), and the multi-collection retriever that ties
//! them together with intent detection and metadata re-ranking (C3).

pub mod cache;
pub mod embeddings;
pub mod intent;
pub mod reranker;
pub mod retriever;
pub mod vector_store;

pub use cache::EmbeddingCache;
pub use embeddings::{DummyEmbedder, EmbeddingProviderChain, LocalEmbedder, RemoteApiAEmbedder, RemoteApiBEmbedder};
pub use intent::{detect_group, detect_weekday, expand_query, Intent};
pub use reranker::{render_candidate, score_candidates};
pub use retriever::{RetrievalOutcome, RetrievalPort, Retriever, RetrieverConfig};
pub use vector_store::{CollectionStore, CollectionStoreConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("collection dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<RagError> for assistant_core::Error {
    fn from(err: RagError) -> Self {
        assistant_core::Error::Rag(err.to_string())
    }
}
