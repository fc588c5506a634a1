//! Main settings module.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// The single recognized LLM provider order override (`LLM_PROVIDER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    Gemini,
    OpenAi,
}

impl LlmProvider {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub rag: RagSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Vector store, embedding provider and retriever tuning (C1-C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override the vector-store endpoint (env: `CHROMA_PATH` in the
    /// original source; kept as the recognized name even though this
    /// adapter targets Qdrant rather than a directory).
    #[serde(default = "crate::constants::endpoints_qdrant_default")]
    pub vector_store_path: String,

    #[serde(default = "default_website_collection")]
    pub website_collection: String,

    #[serde(default = "default_ista_collection")]
    pub ista_collection: String,

    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// Forces a provider from {`local`, `apiA`, `apiB`} (env: `EMBEDDING_PRIMARY`).
    #[serde(default)]
    pub embedding_primary: Option<String>,

    #[serde(default = "default_n_results")]
    pub default_n_results: usize,

    pub hf_api_key: Option<String>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            vector_store_path: crate::constants::endpoints_qdrant_default(),
            website_collection: default_website_collection(),
            ista_collection: default_ista_collection(),
            vector_dim: default_vector_dim(),
            embedding_primary: std::env::var("EMBEDDING_PRIMARY").ok(),
            default_n_results: default_n_results(),
            hf_api_key: std::env::var("HF_API_KEY").ok(),
        }
    }
}

fn default_website_collection() -> String {
    "website_content".to_string()
}
fn default_ista_collection() -> String {
    "ista_documents".to_string()
}
fn default_vector_dim() -> usize {
    crate::constants::rag::DEFAULT_EMBEDDING_DIM
}
fn default_n_results() -> usize {
    crate::constants::rag::DEFAULT_N_RESULTS
}

/// LLM provider credentials and ordering (C4).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSettings {
    pub groq_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Pins the first provider tried (env: `LLM_PROVIDER`); the rest of the
    /// chain still runs on failure.
    pub pinned_provider: Option<LlmProvider>,
}

impl LlmSettings {
    pub fn from_env() -> Self {
        Self {
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            pinned_provider: std::env::var("LLM_PROVIDER")
                .ok()
                .and_then(|s| LlmProvider::from_str_loose(&s)),
        }
    }
}

/// Conversation store and response cache backing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Postgres DSN, env: `CONVERSATION_DB_URL`.
    pub conversation_db_url: Option<String>,

    /// Redis DSN, env: `REDIS_URL`.
    pub redis_url: Option<String>,

    #[serde(default)]
    pub redis_cache_enabled: bool,

    #[serde(default = "default_response_cache_ttl")]
    pub response_cache_ttl_secs: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            conversation_db_url: std::env::var("CONVERSATION_DB_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            redis_cache_enabled: std::env::var("REDIS_CACHE_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            response_cache_ttl_secs: default_response_cache_ttl(),
        }
    }
}

fn default_response_cache_ttl() -> u64 {
    crate::constants::cache::RESPONSE_CACHE_TTL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_json: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.vector_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.vector_dim".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Layered load: env vars (`ASSISTANT__section__field`) > `config/{env}.yaml`
/// > `config/default.yaml` > struct defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let mut builder = Config::builder();
    builder = builder.add_source(File::with_name("config/default").required(false));
    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix("ASSISTANT").separator("__").try_parsing(true),
    );

    let built = builder.build()?;
    let mut settings: Settings = built.try_deserialize().unwrap_or_default();

    // Env-var credentials always take precedence over file config, mirroring
    // the original source's module-level `os.getenv` reads.
    settings.llm = LlmSettings::from_env();

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.rag.vector_dim, 384);
    }

    #[test]
    fn llm_provider_parses_aliases() {
        assert_eq!(LlmProvider::from_str_loose("google"), Some(LlmProvider::Gemini));
        assert_eq!(LlmProvider::from_str_loose("nope"), None);
    }
}
