use std::collections::HashSet;

use crate::language::Language;

/// Ephemeral retrieval request (`Q` in the data model).
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub n_results: usize,
    pub section_hint: Option<String>,
    pub language: Option<Language>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            n_results: 3,
            section_hint: None,
            language: None,
        }
    }
}

/// Query enriched by deterministic understanding rules: detected intent,
/// class-group reference, weekday mention and expected answer language.
#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    pub text: String,
    pub expanded_text: String,
    pub detected_intent: Option<&'static str>,
    pub detected_group: Option<String>,
    pub detected_day: Option<&'static str>,
    pub expected_language: Language,
    pub keyword_set: HashSet<String>,
}
