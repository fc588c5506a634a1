//! The wire-level event sequence a stream emits: zero or more `content`
//! events, then exactly one of `end` or `error`.

use serde::Serialize;

use assistant_core::document::Source;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Content { content: String },
    End { data: EndPayload },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EndPayload {
    pub reply: String,
    pub sources: Vec<Source>,
    pub rag_used: bool,
    pub language: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}
