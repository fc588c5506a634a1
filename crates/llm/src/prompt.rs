//! Builds the message list sent to a provider: the fixed system prompt,
//! recent conversation history, retrieved context and the current turn.

use assistant_core::traits::Message;

/// The assistant's fixed persona and grounding instructions, in French to
/// match the audience it serves.
pub fn system_prompt() -> &'static str {
    "Tu es un assistant intelligent pour l'école NTIC2, un institut de \
formation avec un système de gestion des présences. Aide les \
utilisateurs avec les emplois du temps, les examens (EFM), les stages, \
les débouchés professionnels, les parrains de classe, les règles de \
l'institution et les fonctionnalités de l'application Smart Presence. \
Base tes réponses sur le contexte fourni ci-dessous quand il est \
pertinent, structure-les en puces quand c'est utile, cite tes sources, \
et indique clairement quand tu ne disposes pas d'information \
suffisante plutôt que d'inventer une réponse."
}

/// Assembles the ordered message list for one generation call.
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self { messages: vec![Message::system(system_prompt())] }
    }

    pub fn with_history(mut self, history: &[assistant_core::HistoryMessage]) -> Self {
        for turn in history {
            let message = match turn.role {
                assistant_core::TurnRole::User => Message::user(turn.content.as_str()),
                assistant_core::TurnRole::Assistant => Message::assistant(turn.content.as_str()),
            };
            self.messages.push(message);
        }
        self
    }

    /// Appends to the persona system message rather than pushing a second
    /// one: providers that only honor a single system turn (Gemini) would
    /// otherwise silently drop the persona whenever context is non-empty.
    pub fn with_context(mut self, context: &str) -> Self {
        if !context.is_empty() {
            if let Some(system) = self.messages.first_mut() {
                system.content.push_str(&format!("\n\nContexte pertinent:\n{context}"));
            }
        }
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_system_history_and_user_turn_in_order() {
        let history = vec![assistant_core::HistoryMessage {
            role: assistant_core::TurnRole::User,
            content: "bonjour".to_string(),
            created_at: chrono::Utc::now(),
        }];
        let messages = PromptBuilder::new().with_history(&history).with_context("ctx").with_user_message("salut").build();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, assistant_core::Role::System);
        assert_eq!(messages.last().unwrap().content, "salut");
    }

    #[test]
    fn context_is_appended_to_the_persona_system_message_not_a_new_one() {
        let messages = PromptBuilder::new().with_context("ctx").with_user_message("salut").build();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, assistant_core::Role::System);
        assert!(messages[0].content.contains(system_prompt()));
        assert!(messages[0].content.ends_with("Contexte pertinent:\nctx"));
    }
}
