//! Candidate scoring and role-specific rendering for the retriever.

use assistant_config::constants::rag::{
    CONTENT_TRUNCATE_CHARS, DISTANCE_SCORE_EPSILON, KEYWORD_SCORE_MATCH_TOKEN_LEN, KEYWORD_SCORE_WEIGHT,
    SOURCE_BOOST,
};
use assistant_core::document::{Candidate, CollectionOrigin, Source};
use assistant_core::retrieval::ExpandedQuery;

fn intent_source_type(intent: &str) -> &'static str {
    if assistant_config::constants::intents::APP_SOURCE_INTENTS.contains(&intent) {
        "app"
    } else {
        "site"
    }
}

fn intent_document_type(intent: &str) -> Option<&'static str> {
    match intent {
        "edt" => Some("emploi_du_temps"),
        "efm" => Some("efm"),
        "parrain" => Some("parrain"),
        "stage" => Some("stage"),
        "debouches" => Some("debouches"),
        "contact" => Some("institution"),
        "horaires" => None, // matched on info_type=horaires instead of type
        "regles" => Some("institution"),
        _ => None,
    }
}

fn keyword_score(candidate: &Candidate, keyword_set: &std::collections::HashSet<String>) -> f32 {
    let haystack = format!(
        "{} {} {}",
        candidate.document.content.to_lowercase(),
        candidate.document.meta("title").unwrap_or_default().to_lowercase(),
        candidate.document.meta("keywords").unwrap_or_default().to_lowercase(),
    );
    let count = keyword_set
        .iter()
        .filter(|token| token.chars().count() > KEYWORD_SCORE_MATCH_TOKEN_LEN && haystack.contains(token.as_str()))
        .count();
    KEYWORD_SCORE_WEIGHT * count as f32
}

fn metadata_boost(candidate: &Candidate, query: &ExpandedQuery) -> f32 {
    if candidate.collection_origin != CollectionOrigin::IstaDocuments {
        return 0.0;
    }

    let mut boost = 0.5; // baseline relevance bonus for structured candidates
    let doc_type = candidate.document.meta("type");

    if let Some(intent) = query.detected_intent {
        if intent == "horaires" {
            if candidate.document.meta("info_type") == Some("horaires") {
                boost += 10.0;
            }
        } else if let Some(expected_type) = intent_document_type(intent) {
            if doc_type == Some(expected_type) {
                boost += 10.0;
            }
        }
        if intent != "edt" && doc_type == Some("emploi_du_temps") {
            boost -= 5.0;
        }
    }

    if let Some(group) = &query.detected_group {
        match candidate.document.meta("groupe") {
            Some(g) if g.eq_ignore_ascii_case(group) => boost += 5.0,
            _ if query.text.to_lowercase().contains(&group.to_lowercase()) => boost += 3.0,
            _ => {}
        }
    }

    if let Some(day) = query.detected_day {
        match candidate.document.meta("jour") {
            Some(j) if j.eq_ignore_ascii_case(day) => boost += 3.0,
            _ if query.text.to_lowercase().contains(day) => boost += 1.5,
            _ => {}
        }
    }

    for field in ["module", "professeur"] {
        if let Some(value) = candidate.document.meta(field) {
            let lowered = value.to_lowercase();
            if query.keyword_set.iter().any(|token| lowered.contains(token.as_str())) {
                boost += 0.8;
            }
        }
    }

    boost
}

/// Computes `final_score` for every candidate and sorts descending.
pub fn score_candidates(mut candidates: Vec<Candidate>, query: &ExpandedQuery) -> Vec<Candidate> {
    let dominant_source_type = query.detected_intent.map(intent_source_type);

    for candidate in &mut candidates {
        let distance_score = 1.0 / (candidate.raw_distance + DISTANCE_SCORE_EPSILON);
        let kw_score = keyword_score(candidate, &query.keyword_set);

        let source_boost = match (dominant_source_type, candidate.document.meta("source_type")) {
            (Some(expected), Some(actual)) if expected == actual => SOURCE_BOOST,
            _ => 0.0,
        };

        let meta_boost = metadata_boost(candidate, query);

        candidate.keyword_hits = query
            .keyword_set
            .iter()
            .filter(|t| candidate.document.content.to_lowercase().contains(t.as_str()))
            .count();
        candidate.metadata_boost = source_boost + meta_boost;
        candidate.final_score = distance_score + kw_score + candidate.metadata_boost;
    }

    candidates.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// Renders one candidate according to its structural role and returns the
/// rendering plus the source it should contribute (if any).
pub fn render_candidate(candidate: &Candidate) -> (String, Option<Source>) {
    let doc = &candidate.document;
    match doc.meta("type") {
        Some("emploi_du_temps") => {
            let rendering = format!(
                "📅 Groupe: {}\n🕐 {} {}\n📚 Module: {}\n👨‍🏫 Professeur: {}\n🏫 Salle: {}",
                doc.meta("groupe").unwrap_or("?"),
                doc.meta("jour").unwrap_or("?"),
                doc.meta("heure").unwrap_or("?"),
                doc.meta("module").unwrap_or("?"),
                doc.meta("professeur").unwrap_or("?"),
                doc.meta("salle").unwrap_or("?"),
            );
            (rendering, None)
        }
        Some("efm") => {
            let rendering = format!(
                "📚 Module: {}\n📅 Date: {}\n🕐 Heure: {}",
                doc.meta("module").unwrap_or("?"),
                doc.meta("date").unwrap_or("?"),
                doc.meta("heure").unwrap_or("?"),
            );
            (rendering, None)
        }
        Some("parrain") => {
            let rendering =
                format!("👥 Groupe: {}\n🤝 Parrain: {}", doc.meta("groupe").unwrap_or("?"), doc.meta("parrain").unwrap_or("?"));
            (rendering, None)
        }
        _ if candidate.collection_origin == CollectionOrigin::IstaDocuments => {
            // stage/debouches/institution and any other unrecognized ista_documents
            // type: no structured template to apply, render the document verbatim
            // and don't synthesize a website-style Source for it.
            (doc.content.clone(), None)
        }
        _ => {
            let title = doc.meta("title").unwrap_or("Sans titre").to_string();
            let section = doc.meta("section").unwrap_or("").to_string();
            let url = doc.meta("url").unwrap_or("").to_string();
            let truncated: String = doc.content.chars().take(CONTENT_TRUNCATE_CHARS).collect();
            let content = if doc.content.chars().count() > CONTENT_TRUNCATE_CHARS {
                format!("{truncated}...")
            } else {
                truncated
            };
            let rendering = format!("Titre: {title}\nSection: {section}\nURL source: {url}\nContenu: {content}");
            let source = Source { title, section, url };
            (rendering, source.dedup_key().is_some().then_some(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::document::Document;
    use std::collections::{HashMap, HashSet};

    fn candidate(distance: f32, origin: CollectionOrigin, meta: &[(&str, &str)]) -> Candidate {
        let metadata: HashMap<String, String> = meta.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Candidate {
            document: Document::new("id", "contenu de test").with_metadata(metadata),
            raw_distance: distance,
            keyword_hits: 0,
            metadata_boost: 0.0,
            final_score: 0.0,
            collection_origin: origin,
        }
    }

    fn query(intent: Option<&'static str>, group: Option<&str>, day: Option<&'static str>) -> ExpandedQuery {
        ExpandedQuery {
            text: "emploi du temps NTIC2-FS201 lundi".to_string(),
            expanded_text: String::new(),
            detected_intent: intent,
            detected_group: group.map(|s| s.to_string()),
            detected_day: day,
            expected_language: assistant_core::language::Language::French,
            keyword_set: HashSet::new(),
        }
    }

    #[test]
    fn matching_group_and_day_outranks_plain_schedule_entry() {
        let exact = candidate(
            0.5,
            CollectionOrigin::IstaDocuments,
            &[("type", "emploi_du_temps"), ("groupe", "NTIC2-FS201"), ("jour", "lundi")],
        );
        let generic = candidate(0.5, CollectionOrigin::IstaDocuments, &[("type", "emploi_du_temps")]);
        let q = query(Some("edt"), Some("NTIC2-FS201"), Some("lundi"));

        let ranked = score_candidates(vec![generic, exact], &q);
        assert_eq!(ranked[0].document.meta("groupe"), Some("NTIC2-FS201"));
    }

    #[test]
    fn non_schedule_intent_penalizes_schedule_entries() {
        let schedule = candidate(0.5, CollectionOrigin::IstaDocuments, &[("type", "emploi_du_temps")]);
        let debouches = candidate(0.5, CollectionOrigin::IstaDocuments, &[("type", "debouches")]);
        let q = query(Some("debouches"), None, None);

        let ranked = score_candidates(vec![schedule, debouches], &q);
        assert_eq!(ranked[0].document.meta("type"), Some("debouches"));
    }

    #[test]
    fn unstructured_rendering_truncates_long_content_and_keeps_source() {
        let mut doc = Document::new("id", &"x".repeat(1000));
        doc.metadata.insert("title".to_string(), "Horaires portails".to_string());
        doc.metadata.insert("url".to_string(), "https://example.org/horaires".to_string());
        let candidate = Candidate {
            document: doc,
            raw_distance: 0.2,
            keyword_hits: 0,
            metadata_boost: 0.0,
            final_score: 0.0,
            collection_origin: CollectionOrigin::WebsiteContent,
        };
        let (rendering, source) = render_candidate(&candidate);
        assert!(rendering.contains("..."));
        assert!(source.is_some());
    }

    #[test]
    fn structured_entries_carry_no_source() {
        let doc = Document::new("id", "n/a").with_metadata(
            [("type", "emploi_du_temps"), ("groupe", "NTIC2-FS201")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let candidate = Candidate {
            document: doc,
            raw_distance: 0.2,
            keyword_hits: 0,
            metadata_boost: 0.0,
            final_score: 0.0,
            collection_origin: CollectionOrigin::IstaDocuments,
        };
        let (_, source) = render_candidate(&candidate);
        assert!(source.is_none());
    }
}
