//! Postgres schema for the conversation store.

use sqlx::PgPool;

use crate::error::PersistenceError;

/// Creates the `conversations` and `messages` tables if they don't exist.
/// One row per user in `conversations` (this engine tracks a single ongoing
/// session per user, so `session_id` mirrors `user_id`), one row per turn's
/// message in `messages`, linked through `conversation_id`.
pub async fn create_tables(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            session_id TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_activity TIMESTAMPTZ NOT NULL,
            message_count BIGINT NOT NULL DEFAULT 0,
            history_json JSONB NOT NULL DEFAULT '[]'::jsonb
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| PersistenceError::Schema(e.to_string()))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id BIGSERIAL PRIMARY KEY,
            conversation_id BIGINT NOT NULL REFERENCES conversations(id),
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| PersistenceError::Schema(e.to_string()))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS messages_conversation_id_created_at_idx ON messages (conversation_id, created_at)")
        .execute(pool)
        .await
        .map_err(|e| PersistenceError::Schema(e.to_string()))?;

    tracing::info!("conversation store tables ensured");
    Ok(())
}
