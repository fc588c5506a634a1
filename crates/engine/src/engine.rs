//! Conversation engine (C5): ties the retriever, the LLM orchestrator, the
//! response cache and the conversation store into the single streaming
//! answer operation.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use assistant_core::retrieval::Query;
use assistant_core::traits::{ConversationStore, ResponseCache};
use assistant_core::{ConversationTurn, Language};
use assistant_llm::{fingerprint, LlmOrchestrator, PromptBuilder};
use assistant_rag::RetrievalPort;

use crate::events::{EndPayload, StreamEvent};

const HISTORY_TURNS: usize = 10;
const RESPONSE_CACHE_TTL_SECS: u64 = 3_600;

pub struct ConversationEngine {
    retriever: Arc<dyn RetrievalPort>,
    llm: Arc<LlmOrchestrator>,
    response_cache: Arc<dyn ResponseCache>,
    conversation_store: Arc<dyn ConversationStore>,
}

impl ConversationEngine {
    pub fn new(
        retriever: Arc<dyn RetrievalPort>,
        llm: Arc<LlmOrchestrator>,
        response_cache: Arc<dyn ResponseCache>,
        conversation_store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self { retriever, llm, response_cache, conversation_store }
    }

    /// Streams one turn's events onto the returned receiver. The stream
    /// always ends with exactly one `end` or `error` event; the channel
    /// closes immediately after.
    pub fn answer_streaming(self: Arc<Self>, message: String, user_id: String) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            self.run(message, user_id, tx).await;
        });
        rx
    }

    async fn run(&self, message: String, user_id: String, tx: mpsc::Sender<StreamEvent>) {
        let language = Language::detect(&message);
        let key = fingerprint(&user_id, &message);

        if let Some(cached) = self.response_cache.get(&key).await {
            if tx.send(StreamEvent::Content { content: cached.clone() }).await.is_err() {
                return;
            }
            let _ = tx
                .send(StreamEvent::End {
                    data: EndPayload {
                        reply: cached,
                        sources: Vec::new(),
                        rag_used: false,
                        language: language.code(),
                        cached: true,
                    },
                })
                .await;
            return;
        }

        let history = match self.conversation_store.load_context(&user_id, HISTORY_TURNS).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversation history, continuing without it");
                Vec::new()
            }
        };

        let outcome = self.retriever.retrieve(Query::new(message.clone())).await;

        let prompt = PromptBuilder::new()
            .with_context(&outcome.context)
            .with_history(&history)
            .with_user_message(&message)
            .build();

        let (mut stream, _provider) = match self.llm.generate_stream(&prompt).await {
            Ok(result) => result,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let mut full_text = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(token) => {
                    full_text.push_str(&token);
                    if tx.send(StreamEvent::Content { content: token }).await.is_err() {
                        // Receiver dropped: client disconnected. Abort without persisting.
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error { message: e.to_string() }).await;
                    return;
                }
            }
        }

        let turn = ConversationTurn::new(user_id, message, full_text.clone());
        if let Err(e) = self.conversation_store.save_turn(&turn).await {
            tracing::warn!(error = %e, "failed to persist conversation turn");
        }
        self.response_cache.set(&key, &full_text, RESPONSE_CACHE_TTL_SECS).await;

        let _ = tx
            .send(StreamEvent::End {
                data: EndPayload {
                    reply: full_text,
                    sources: outcome.sources,
                    rag_used: outcome.rag_used,
                    language: language.code(),
                    cached: false,
                },
            })
            .await;
    }

    /// Non-streaming convenience wrapper: drains the stream and returns the
    /// terminal payload, or the error message if the stream ended early.
    pub async fn answer(self: Arc<Self>, message: String, user_id: String) -> Result<EndPayload, String> {
        let mut rx = self.answer_streaming(message, user_id);
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::End { data } => return Ok(data),
                StreamEvent::Error { message } => return Err(message),
                StreamEvent::Content { .. } => continue,
            }
        }
        Err("stream closed without a terminal event".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::Mutex;

    use assistant_core::document::Source;
    use assistant_core::traits::{ConversationStore, LlmBackend, Message, ResponseCache, TokenStream};
    use assistant_core::{ConversationStats, HistoryMessage};
    use assistant_llm::LlmOrchestrator;
    use assistant_rag::{RetrievalOutcome, RetrievalPort};

    struct FakeRetriever {
        outcome: RetrievalOutcome,
    }

    #[async_trait]
    impl RetrievalPort for FakeRetriever {
        async fn retrieve(&self, _query: Query) -> RetrievalOutcome {
            self.outcome.clone()
        }
    }

    struct ScriptedBackend {
        chunks: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(&self, _messages: &[Message]) -> assistant_core::Result<String> {
            Ok(self.chunks.concat())
        }
        async fn generate_stream(&self, _messages: &[Message]) -> assistant_core::Result<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<assistant_core::Result<String>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl LlmBackend for FailingBackend {
        async fn generate(&self, _messages: &[Message]) -> assistant_core::Result<String> {
            Err(assistant_core::Error::Llm("down".to_string()))
        }
        async fn generate_stream(&self, _messages: &[Message]) -> assistant_core::Result<TokenStream> {
            Err(assistant_core::Error::Llm("down".to_string()))
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<ConversationTurn>>,
    }

    #[async_trait]
    impl ConversationStore for RecordingStore {
        async fn save_turn(&self, turn: &ConversationTurn) -> assistant_core::Result<()> {
            self.saved.lock().await.push(turn.clone());
            Ok(())
        }
        async fn load_context(&self, _user_id: &str, _limit: usize) -> assistant_core::Result<Vec<HistoryMessage>> {
            Ok(Vec::new())
        }
        async fn clear_conversation(&self, _user_id: &str) -> assistant_core::Result<()> {
            Ok(())
        }
        async fn stats(&self, _user_id: &str) -> assistant_core::Result<ConversationStats> {
            Ok(ConversationStats::default())
        }
        async fn cleanup_older_than(&self, _days: i64) -> assistant_core::Result<usize> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<std::collections::HashMap<String, String>>,
    }

    #[async_trait]
    impl ResponseCache for FakeCache {
        async fn get(&self, fingerprint: &str) -> Option<String> {
            self.entries.lock().await.get(fingerprint).cloned()
        }
        async fn set(&self, fingerprint: &str, payload: &str, _ttl_secs: u64) {
            self.entries.lock().await.insert(fingerprint.to_string(), payload.to_string());
        }
    }

    #[tokio::test]
    async fn streams_content_then_end_and_persists_the_turn() {
        let retriever = Arc::new(FakeRetriever {
            outcome: RetrievalOutcome {
                context: "contexte".to_string(),
                sources: vec![Source { title: "t".to_string(), section: "s".to_string(), url: "u".to_string() }],
                rag_used: true,
            },
        });
        let backend = Arc::new(ScriptedBackend { chunks: vec!["Bon", "jour"], calls: AtomicUsize::new(0) });
        let llm = Arc::new(LlmOrchestrator::new(vec![backend.clone()]));
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(FakeCache::default());

        let engine = Arc::new(ConversationEngine::new(retriever, llm, cache, store.clone()));
        let result = engine.answer("salut".to_string(), "u1".to_string()).await.unwrap();

        assert_eq!(result.reply, "Bonjour");
        assert!(result.rag_used);
        assert_eq!(result.sources.len(), 1);
        assert!(!result.cached);
        assert_eq!(store.saved.lock().await.len(), 1);
        assert_eq!(store.saved.lock().await[0].assistant_message, "Bonjour");
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_the_provider_chain() {
        let retriever = Arc::new(FakeRetriever { outcome: RetrievalOutcome::default() });
        let backend = Arc::new(ScriptedBackend { chunks: vec!["unused"], calls: AtomicUsize::new(0) });
        let llm = Arc::new(LlmOrchestrator::new(vec![backend.clone()]));
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(FakeCache::default());
        cache.set(&assistant_llm::fingerprint("u1", "salut"), "reponse en cache", 60).await;

        let engine = Arc::new(ConversationEngine::new(retriever, llm, cache, store.clone()));
        let result = engine.answer("salut".to_string(), "u1".to_string()).await.unwrap();

        assert_eq!(result.reply, "reponse en cache");
        assert!(result.cached);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(store.saved.lock().await.is_empty());
    }

    #[tokio::test]
    async fn provider_exhaustion_emits_error_and_does_not_persist() {
        let retriever = Arc::new(FakeRetriever { outcome: RetrievalOutcome::default() });
        let llm = Arc::new(LlmOrchestrator::new(vec![Arc::new(FailingBackend)]));
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(FakeCache::default());

        let engine = Arc::new(ConversationEngine::new(retriever, llm, cache, store.clone()));
        let result = engine.answer("salut".to_string(), "u1".to_string()).await;

        assert!(result.is_err());
        assert!(store.saved.lock().await.is_empty());
    }
}
