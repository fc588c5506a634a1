//! Closed keyword-group intent detection, regex group extraction and query
//! expansion. No ML involved: everything here is deterministic string
//! matching against `assistant_config::constants::intents`.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use assistant_config::constants::intents::{GROUPS, WEEKDAYS_FR};
use assistant_config::constants::rag::KEYWORD_SCAN_MIN_TOKEN_LEN;
use assistant_core::language::Language;
use assistant_core::retrieval::{ExpandedQuery, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub key: &'static str,
    pub trigger_words: &'static [&'static str],
}

static GROUP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:ntic2[- ]?)?(fs|dev|id|ge)(\d{3})").unwrap());

/// Scans `text` against the intent groups in their declared first-match-wins
/// order and returns the first group whose trigger word appears.
pub fn detect_intent(text: &str) -> Option<Intent> {
    let lowered = text.to_lowercase();
    GROUPS
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| lowered.contains(t)))
        .map(|(key, triggers)| Intent { key, trigger_words: triggers })
}

/// Extracts a class-group reference like `fs203` or `ntic2-dev101` and
/// normalizes it to `NTIC2-{PREFIX}{DIGITS}`.
pub fn detect_group(text: &str) -> Option<String> {
    let caps = GROUP_PATTERN.captures(text)?;
    let prefix = caps.get(1)?.as_str().to_uppercase();
    let digits = caps.get(2)?.as_str();
    Some(format!("NTIC2-{prefix}{digits}"))
}

/// Finds the first French weekday name mentioned in `text`.
pub fn detect_weekday(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    WEEKDAYS_FR.iter().find(|day| lowered.contains(*day)).copied()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= KEYWORD_SCAN_MIN_TOKEN_LEN)
        .map(|w| w.to_string())
        .collect()
}

/// Builds the expanded query: detects intent/group/weekday, appends their
/// trigger vocabulary to the search text, and derives the expected answer
/// language.
pub fn expand_query(query: &Query) -> ExpandedQuery {
    let intent = detect_intent(&query.text);
    let group = detect_group(&query.text);
    let weekday = detect_weekday(&query.text);
    let expected_language = query.language.unwrap_or_else(|| Language::detect(&query.text));

    let mut expanded_text = query.text.clone();
    if let Some(intent) = &intent {
        expanded_text.push(' ');
        expanded_text.push_str(&intent.trigger_words.join(" "));
    }
    if group.is_some() {
        expanded_text.push_str(" groupe emploi temps");
    }

    let keyword_set = tokenize(&expanded_text);

    ExpandedQuery {
        text: query.text.clone(),
        expanded_text,
        detected_intent: intent.map(|i| i.key),
        detected_group: group,
        detected_day: weekday,
        expected_language,
        keyword_set,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_edt_before_debouches_on_shared_trigger() {
        let intent = detect_intent("quel est mon emploi du temps cette semaine").unwrap();
        assert_eq!(intent.key, "edt");
    }

    #[test]
    fn detects_debouches_on_its_own_trigger() {
        let intent = detect_intent("quels sont les debouches metier apres ce diplome").unwrap();
        assert_eq!(intent.key, "debouches");
    }

    #[test]
    fn extracts_and_normalizes_group_reference() {
        assert_eq!(detect_group("je suis dans le groupe fs203").as_deref(), Some("NTIC2-FS203"));
        assert_eq!(detect_group("ntic2-dev101 a cours ou").as_deref(), Some("NTIC2-DEV101"));
        assert_eq!(detect_group("aucune reference ici"), None);
    }

    #[test]
    fn detects_weekday() {
        assert_eq!(detect_weekday("le cours de mardi matin"), Some("mardi"));
        assert_eq!(detect_weekday("pas de jour ici"), None);
    }

    #[test]
    fn expand_query_includes_intent_vocabulary() {
        let expanded = expand_query(&Query::new("emploi du temps fs203 mardi"));
        assert_eq!(expanded.detected_intent, Some("edt"));
        assert_eq!(expanded.detected_group.as_deref(), Some("NTIC2-FS203"));
        assert_eq!(expanded.detected_day, Some("mardi"));
        assert!(expanded.expanded_text.contains("planning"));
    }
}
