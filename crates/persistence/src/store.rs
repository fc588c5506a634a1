//! `ConversationStore` implementation backed by the `conversations`/
//! `messages` tables.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use assistant_core::traits::ConversationStore;
use assistant_core::{ConversationStats, ConversationTurn, HistoryMessage, Result, TurnRole};

use crate::client::PostgresClient;
use crate::error::PersistenceError;

fn role_to_str(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    }
}

fn role_from_str(role: &str) -> TurnRole {
    match role {
        "assistant" => TurnRole::Assistant,
        _ => TurnRole::User,
    }
}

pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { pool: client.pool().clone() }
    }
}

/// Looks up (or lazily creates) the conversation row for `user_id`, returning
/// its id. This engine keeps one ongoing conversation per user, so
/// `session_id` is set equal to `user_id` at creation time.
async fn ensure_conversation(tx: &mut sqlx::PgConnection, user_id: &str, at: chrono::DateTime<Utc>) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO conversations (user_id, session_id, is_active, last_activity)
        VALUES ($1, $1, TRUE, $2)
        ON CONFLICT (user_id) DO UPDATE SET last_activity = EXCLUDED.last_activity, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(at)
    .fetch_one(&mut *tx)
    .await
    .map_err(PersistenceError::from)?;
    Ok(row.0)
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from)?;

        let conversation_id = ensure_conversation(&mut *tx, &turn.user_id, turn.created_at).await?;

        sqlx::query("INSERT INTO messages (conversation_id, role, content, created_at) VALUES ($1, $2, $3, $4)")
            .bind(conversation_id)
            .bind(role_to_str(TurnRole::User))
            .bind(&turn.user_message)
            .bind(turn.created_at)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;

        sqlx::query("INSERT INTO messages (conversation_id, role, content, created_at) VALUES ($1, $2, $3, $4)")
            .bind(conversation_id)
            .bind(role_to_str(TurnRole::Assistant))
            .bind(&turn.assistant_message)
            .bind(turn.created_at)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;

        sqlx::query(
            r#"
            UPDATE conversations SET
                message_count = message_count + 2,
                history_json = (
                    SELECT COALESCE(jsonb_agg(jsonb_build_object('role', role, 'content', content, 'created_at', created_at) ORDER BY created_at), '[]'::jsonb)
                    FROM messages WHERE conversation_id = $1
                )
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::from)?;

        tx.commit().await.map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn load_context(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryMessage>> {
        let rows: Vec<(String, String, chrono::DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT m.role, m.content, m.created_at
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.user_id = $1
            ORDER BY m.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PersistenceError::from)?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(role, content, created_at)| HistoryMessage { role: role_from_str(&role), content, created_at })
            .collect())
    }

    async fn clear_conversation(&self, user_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from)?;
        sqlx::query("DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations WHERE user_id = $1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;
        sqlx::query("DELETE FROM conversations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;
        tx.commit().await.map_err(PersistenceError::from)?;
        Ok(())
    }

    async fn stats(&self, user_id: &str) -> Result<ConversationStats> {
        let total_conversations: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await
            .map_err(PersistenceError::from)?;

        let active_since = Utc::now() - Duration::hours(24);
        let active_conversations: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM conversations WHERE is_active AND last_activity >= $1")
                .bind(active_since)
                .fetch_one(&self.pool)
                .await
                .map_err(PersistenceError::from)?;

        let total_messages: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(message_count), 0) FROM conversations WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(PersistenceError::from)?;

        let last_activity: (Option<chrono::DateTime<Utc>>,) =
            sqlx::query_as("SELECT last_activity FROM conversations WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(PersistenceError::from)?
                .unwrap_or((None,));

        Ok(ConversationStats {
            total_conversations: total_conversations.0,
            active_conversations: active_conversations.0,
            total_messages: total_messages.0,
            last_activity: last_activity.0,
        })
    }

    async fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from)?;

        let stale_ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM conversations WHERE last_activity < $1")
            .bind(cutoff)
            .fetch_all(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;

        for (id,) in &stale_ids {
            sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(PersistenceError::from)?;
        }

        sqlx::query("UPDATE conversations SET is_active = FALSE WHERE last_activity < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from)?;

        tx.commit().await.map_err(PersistenceError::from)?;
        Ok(stale_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_its_string_form() {
        assert_eq!(role_from_str(role_to_str(TurnRole::User)), TurnRole::User);
        assert_eq!(role_from_str(role_to_str(TurnRole::Assistant)), TurnRole::Assistant);
    }
}
