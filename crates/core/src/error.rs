use thiserror::Error;

/// Umbrella error type every crate's error converts into at its public boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("retrieval error: {0}")]
    Rag(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
