//! Provider backends: Groq and OpenAI speak the same chat-completions
//! wire format; Gemini gets its own request/response shape. All three
//! stream over SSE and implement `assistant_core::traits::LlmBackend`.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use assistant_config::constants::timeouts::LLM_REQUEST_MS;
use assistant_core::traits::{LlmBackend, Message, Role, TokenStream};
use assistant_core::{Error, Result};

use crate::LlmError;

fn client() -> reqwest::Client {
    reqwest::Client::builder().timeout(Duration::from_millis(LLM_REQUEST_MS)).build().unwrap_or_default()
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// ---------------------------------------------------------------------
// OpenAI-compatible chat completions (Groq, OpenAI)
// ---------------------------------------------------------------------

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionStreamChunk {
    choices: Vec<ChatCompletionStreamChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionStreamChoice {
    delta: ChatCompletionDelta,
}

#[derive(Deserialize)]
struct ChatCompletionDelta {
    content: Option<String>,
}

struct OpenAiCompatible {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    name: &'static str,
}

impl OpenAiCompatible {
    fn to_wire_messages<'a>(messages: &'a [Message]) -> Vec<ChatMessage<'a>> {
        messages.iter().map(|m| ChatMessage { role: role_str(m.role), content: &m.content }).collect()
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: Self::to_wire_messages(messages),
            temperature: 0.7,
            stream: false,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Into::<Error>::into(LlmError::from(e)))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(body).into());
        }

        let parsed: ChatCompletionResponse =
            resp.json().await.map_err(|e| Into::<Error>::into(LlmError::from(e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()).into())
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: Self::to_wire_messages(messages),
            temperature: 0.7,
            stream: true,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Into::<Error>::into(LlmError::from(e)))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(body).into());
        }

        let mut byte_stream = resp.bytes_stream();
        let stream = stream! {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Into::<Error>::into(LlmError::from(e)));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(idx) = buffer.find('\n') {
                    let line = buffer[..idx].trim().to_string();
                    buffer.drain(..=idx);
                    let Some(payload) = line.strip_prefix("data: ") else { continue };
                    if payload == "[DONE]" {
                        return;
                    }
                    match serde_json::from_str::<ChatCompletionStreamChunk>(payload) {
                        Ok(parsed) => {
                            if let Some(choice) = parsed.choices.into_iter().next() {
                                if let Some(token) = choice.delta.content {
                                    if !token.is_empty() {
                                        yield Ok(token);
                                    }
                                }
                            }
                        }
                        Err(_) => continue,
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqBackend {
    inner: OpenAiCompatible,
}

impl GroqBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAiCompatible {
                client: client(),
                endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                api_key: api_key.into(),
                model: model.into(),
                name: "groq",
            },
        }
    }
}

#[async_trait]
impl LlmBackend for GroqBackend {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.inner.generate(messages).await
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream> {
        self.inner.generate_stream(messages).await
    }

    fn name(&self) -> &str {
        self.inner.name
    }
}

/// The official OpenAI chat completions endpoint.
pub struct OpenAiBackend {
    inner: OpenAiCompatible,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAiCompatible {
                client: client(),
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: api_key.into(),
                model: model.into(),
                name: "openai",
            },
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.inner.generate(messages).await
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream> {
        self.inner.generate_stream(messages).await
    }

    fn name(&self) -> &str {
        self.inner.name
    }
}

// ---------------------------------------------------------------------
// Gemini (Google Generative Language API)
// ---------------------------------------------------------------------

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: client(), api_key: api_key.into(), model: model.into() }
    }

    fn split_system(messages: &[Message]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system = None;
        let mut contents = Vec::new();
        for m in messages {
            if m.role == Role::System {
                system = Some(GeminiContent { role: None, parts: vec![GeminiPart { text: m.content.clone() }] });
            } else {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                contents.push(GeminiContent { role: Some(role.to_string()), parts: vec![GeminiPart { text: m.content.clone() }] });
            }
        }
        (system, contents)
    }

    fn endpoint(&self, streaming: bool) -> String {
        let method = if streaming { "streamGenerateContent" } else { "generateContent" };
        let alt = if streaming { "&alt=sse" } else { "" };
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:{}?key={}{}",
            self.model, method, self.api_key, alt
        )
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let (system_instruction, contents) = Self::split_system(messages);
        let request = GeminiRequest { contents, system_instruction };
        let resp = self
            .client
            .post(self.endpoint(false))
            .json(&request)
            .send()
            .await
            .map_err(|e| Into::<Error>::into(LlmError::from(e)))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(body).into());
        }

        let parsed: GeminiResponse = resp.json().await.map_err(|e| Into::<Error>::into(LlmError::from(e)))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| LlmError::InvalidResponse("empty candidates".to_string()).into())
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let (system_instruction, contents) = Self::split_system(messages);
        let request = GeminiRequest { contents, system_instruction };
        let resp = self
            .client
            .post(self.endpoint(true))
            .json(&request)
            .send()
            .await
            .map_err(|e| Into::<Error>::into(LlmError::from(e)))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(body).into());
        }

        let mut byte_stream = resp.bytes_stream();
        let stream = stream! {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Into::<Error>::into(LlmError::from(e)));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(idx) = buffer.find('\n') {
                    let line = buffer[..idx].trim().to_string();
                    buffer.drain(..=idx);
                    let Some(payload) = line.strip_prefix("data: ") else { continue };
                    match serde_json::from_str::<GeminiResponse>(payload) {
                        Ok(parsed) => {
                            for candidate in parsed.candidates {
                                for part in candidate.content.parts {
                                    if !part.text.is_empty() {
                                        yield Ok(part.text);
                                    }
                                }
                            }
                        }
                        Err(_) => continue,
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mapping_matches_wire_format() {
        assert_eq!(role_str(Role::System), "system");
        assert_eq!(role_str(Role::User), "user");
        assert_eq!(role_str(Role::Assistant), "assistant");
    }

    #[test]
    fn gemini_splits_system_instruction_from_turns() {
        let messages = vec![Message::system("tu es un assistant"), Message::user("bonjour")];
        let (system, contents) = GeminiBackend::split_system(&messages);
        assert!(system.is_some());
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
    }
}
