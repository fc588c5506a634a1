//! Ordered fallback over the provider chain. A pinned provider (via
//! `LLM_PROVIDER`) moves to the front without excluding the rest: fallback
//! dominance — the chain still recovers if the pinned provider fails.

use std::sync::Arc;

use assistant_core::traits::{LlmBackend, Message, TokenStream};

use crate::LlmError;

pub struct LlmOrchestrator {
    providers: Vec<Arc<dyn LlmBackend>>,
}

impl LlmOrchestrator {
    pub fn new(providers: Vec<Arc<dyn LlmBackend>>) -> Self {
        Self { providers }
    }

    /// Moves the provider named `pinned` to the front of the chain, if present.
    pub fn with_pinned(mut self, pinned: Option<&str>) -> Self {
        if let Some(pinned) = pinned {
            if let Some(pos) = self.providers.iter().position(|p| p.name() == pinned) {
                let provider = self.providers.remove(pos);
                self.providers.insert(0, provider);
            }
        }
        self
    }

    pub async fn generate(&self, messages: &[Message]) -> Result<(String, &str), LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        let mut errors = Vec::new();
        for provider in &self.providers {
            match provider.generate(messages).await {
                Ok(text) => return Ok((text, provider.name())),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "provider generation failed, trying next");
                    errors.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(LlmError::Exhausted(errors.join("; ")))
    }

    pub async fn generate_stream(&self, messages: &[Message]) -> Result<(TokenStream, String), LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        let mut errors = Vec::new();
        for provider in &self.providers {
            match provider.generate_stream(messages).await {
                Ok(stream) => return Ok((stream, provider.name().to_string())),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "provider stream failed, trying next");
                    errors.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(LlmError::Exhausted(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::Result;
    use async_trait::async_trait;

    struct FailingBackend(&'static str);

    #[async_trait]
    impl LlmBackend for FailingBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<String> {
            Err(assistant_core::Error::Llm("down".to_string()))
        }
        async fn generate_stream(&self, _messages: &[Message]) -> Result<TokenStream> {
            Err(assistant_core::Error::Llm("down".to_string()))
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    struct WorkingBackend(&'static str);

    #[async_trait]
    impl LlmBackend for WorkingBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<String> {
            Ok(format!("reply from {}", self.0))
        }
        async fn generate_stream(&self, _messages: &[Message]) -> Result<TokenStream> {
            Err(assistant_core::Error::Llm("streaming unsupported in test double".to_string()))
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_failure() {
        let orchestrator = LlmOrchestrator::new(vec![Arc::new(FailingBackend("a")), Arc::new(WorkingBackend("b"))]);
        let (reply, provider) = orchestrator.generate(&[]).await.unwrap();
        assert_eq!(provider, "b");
        assert!(reply.contains("b"));
    }

    #[tokio::test]
    async fn pinned_provider_moves_to_front_without_dropping_others() {
        let orchestrator = LlmOrchestrator::new(vec![Arc::new(WorkingBackend("a")), Arc::new(WorkingBackend("b"))])
            .with_pinned(Some("b"));
        let (_, provider) = orchestrator.generate(&[]).await.unwrap();
        assert_eq!(provider, "b");
    }

    #[tokio::test]
    async fn exhausted_chain_returns_error() {
        let orchestrator = LlmOrchestrator::new(vec![Arc::new(FailingBackend("a"))]);
        assert!(orchestrator.generate(&[]).await.is_err());
    }
}
