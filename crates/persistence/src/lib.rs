//! Postgres-backed conversation memory (C5's storage port).

pub mod client;
pub mod error;
pub mod schema;
pub mod store;

pub use client::{PostgresClient, PostgresConfig};
pub use error::PersistenceError;
pub use store::PostgresConversationStore;

/// Connects, ensures the schema exists, and returns a ready-to-use store.
pub async fn init(config: PostgresConfig) -> Result<PostgresConversationStore, PersistenceError> {
    let client = PostgresClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(PostgresConversationStore::new(client))
}
