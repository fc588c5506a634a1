//! Postgres client and connection management.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::PersistenceError;
use crate::schema;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), max_connections: 10 }
    }
}

#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    pub async fn connect(config: PostgresConfig) -> Result<Self, PersistenceError> {
        tracing::info!("connecting to Postgres conversation store");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::create_tables(&self.pool).await?;
        tracing::info!("conversation store schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
