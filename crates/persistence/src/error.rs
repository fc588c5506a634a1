use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::Query(err.to_string())
    }
}

impl From<PersistenceError> for assistant_core::Error {
    fn from(err: PersistenceError) -> Self {
        assistant_core::Error::Persistence(err.to_string())
    }
}
