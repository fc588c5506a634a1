use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum stored length of a single message.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One `(user_message, assistant_message)` pair produced by a single
/// invocation of the conversation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_id: impl Into<String>, user_message: String, assistant_message: String) -> Self {
        Self {
            user_id: user_id.into(),
            user_message: truncate(user_message),
            assistant_message: truncate(assistant_message),
            created_at: Utc::now(),
        }
    }
}

fn truncate(mut s: String) -> String {
    if s.chars().count() > MAX_MESSAGE_CHARS {
        s = s.chars().take(MAX_MESSAGE_CHARS).collect();
    }
    s
}

/// A single role-tagged message as loaded from history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: i64,
    pub active_conversations: i64,
    pub total_messages: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_10000_chars() {
        let long = "a".repeat(10_001);
        let turn = ConversationTurn::new("u1", long, "reply".to_string());
        assert_eq!(turn.user_message.chars().count(), MAX_MESSAGE_CHARS);
    }
}
