//! Centralized tuning constants for the conversational assistant.
//!
//! This module ONLY contains:
//! - Service endpoints (generic infrastructure)
//! - Timeouts (generic operational parameters)
//! - RAG scoring constants
//! - Intent keyword groups, in their authoritative iteration order
//!
//! Business copy (the system prompt, rendering templates) lives in
//! `assistant-engine`/`assistant-rag`, not here.

/// Service endpoints (loaded from env vars with fallback defaults).
pub mod endpoints {
    use once_cell::sync::Lazy;

    /// Local embedding daemon (RemoteApiB), env: `LOCAL_EMBEDDING_URL`.
    pub static LOCAL_EMBEDDING_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("LOCAL_EMBEDDING_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
    });

    /// Hosted feature-extraction endpoint (RemoteApiA), env: `HF_API_URL`.
    pub static HF_API_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("HF_API_URL").unwrap_or_else(|_| {
            "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string()
        })
    });

    /// Qdrant vector-store endpoint, env: `QDRANT_URL`.
    pub static QDRANT_DEFAULT: Lazy<String> = Lazy::new(|| {
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6333".to_string())
    });
}

/// Convenience accessor so `settings.rs` doesn't need to know the `Lazy` shape.
pub fn endpoints_qdrant_default() -> String {
    endpoints::QDRANT_DEFAULT.clone()
}

/// Timeouts, in milliseconds unless noted.
pub mod timeouts {
    pub const EMBEDDING_LOCAL_MS: u64 = 3_000;
    pub const EMBEDDING_REMOTE_MS: u64 = 30_000;
    pub const LLM_REQUEST_MS: u64 = 30_000;
}

/// RAG retrieval and scoring defaults.
pub mod rag {
    pub const DEFAULT_N_RESULTS: usize = 3;
    pub const MAX_TOP_K: usize = 20;
    pub const TOP_K_MULTIPLIER: usize = 4;
    pub const DEFAULT_EMBEDDING_DIM: usize = 384;
    pub const EMBEDDING_CACHE_CAPACITY: usize = 1_000;
    pub const CONTENT_TRUNCATE_CHARS: usize = 600;
    pub const SECTION_FILTER_MIN_POOL: usize = 10;
    pub const ADAPTIVE_DISTANCE_MIN_POOL: usize = 10;
    pub const ADAPTIVE_DISTANCE_MEAN_THRESHOLD: f32 = 1000.0;
    pub const ADAPTIVE_DISTANCE_MULTIPLIER: f32 = 1.5;
    pub const KEYWORD_SCAN_MIN_TOKEN_LEN: usize = 3;
    pub const KEYWORD_SCORE_MATCH_TOKEN_LEN: usize = 2;
    pub const KEYWORD_SCORE_WEIGHT: f32 = 0.2;
    pub const SOURCE_BOOST: f32 = 0.2;
    pub const DISTANCE_SCORE_EPSILON: f32 = 0.1;
}

/// Response cache defaults.
pub mod cache {
    pub const RESPONSE_CACHE_TTL_SECS: u64 = 3_600;
}

/// Intent keyword groups, declared in first-match-wins iteration order.
/// `edt` precedes `debouches` so the shared trigger word `"emploi"` resolves
/// to `edt` rather than `debouches` (see DESIGN.md for the reasoning).
pub mod intents {
    pub const GROUPS: &[(&str, &[&str])] = &[
        ("edt", &["emploi", "edt", "planning", "horaire"]),
        ("efm", &["efm", "examen", "convocation", "regional"]),
        ("stage", &["stage", "entreprise", "convention"]),
        ("rentree", &["rentree"]),
        ("regles", &["blouse", "badge", "acces"]),
        ("notif", &["notification", "push", "alerte"]),
        ("live", &["monitoring", "temps reel"]),
        ("debouches", &["emploi", "metier", "carriere"]),
        ("parrain", &["mentor", "responsable"]),
        ("contact", &["email", "telephone"]),
        ("horaires", &["ouverture", "portail"]),
    ];

    /// Intents whose dominant source is the attendance app rather than the
    /// marketing website.
    pub const APP_SOURCE_INTENTS: &[&str] = &["notif", "live"];

    pub const WEEKDAYS_FR: &[&str] = &[
        "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
    ];
}
