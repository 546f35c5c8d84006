use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HearthError, Result};

/// Top-level configuration for the Hearth assistant.
///
/// Loaded from `~/.hearth/config.toml` by default. Every section falls back
/// to its defaults when omitted, so a partial file is always valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearthConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl HearthConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HearthConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HearthError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite listing database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port for the chat API.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.hearth/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Semantic search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum cosine similarity for a vector hit to count.
    pub similarity_threshold: f64,
    /// Maximum number of vector candidates.
    pub max_results: usize,
    /// Phrase prepended to the query before embedding.
    pub query_prefix: String,
    /// Maximum number of keyword-fallback matches.
    pub fallback_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.2,
            max_results: 20,
            query_prefix: "Vacation rental listing matching:".to_string(),
            fallback_limit: 20,
        }
    }
}

/// Which rerank strategy orders search candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    /// Deterministic keyword scoring (0-100).
    #[default]
    Heuristic,
    /// Generative model scoring (0-10) with written justification.
    Generative,
}

/// Rerank settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub strategy: RerankStrategy,
    /// Listings serialized into the generative prompt.
    pub max_candidates: usize,
    /// Description characters kept per listing in the generative prompt.
    pub description_chars: usize,
    /// Listings kept after heuristic scoring.
    pub top_k: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Heuristic,
            max_candidates: 10,
            description_chars: 150,
            top_k: 10,
        }
    }
}

/// Which intent parser classifies utterances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStrategy {
    #[default]
    Generative,
    RuleBased,
}

/// Intent parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub strategy: IntentStrategy,
    /// Recent messages passed to the parser as dialogue context.
    pub history_messages: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            strategy: IntentStrategy::Generative,
            history_messages: 6,
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Messages retained per conversation.
    pub max_messages: usize,
    /// Conversations idle longer than this are reaped.
    pub idle_timeout_minutes: u32,
    /// Minutes between reaper sweeps.
    pub reap_interval_minutes: u32,
    /// Longest accepted utterance, in characters.
    pub max_message_chars: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            idle_timeout_minutes: 24 * 60,
            reap_interval_minutes: 30,
            max_message_chars: 2000,
        }
    }
}

/// Per-turn limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Deadline for a whole turn; expiry is reported as a pipeline failure.
    pub timeout_secs: u64,
    /// Listings returned by the search branch.
    pub search_display_limit: usize,
    /// Listings returned by the date-check branch.
    pub date_check_limit: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            search_display_limit: 5,
            date_check_limit: 10,
        }
    }
}

/// Gemini API settings for generation and embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key. The `GEMINI_API_KEY` environment variable takes precedence.
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = HearthConfig::default();
        assert_eq!(config.general.data_dir, "~/.hearth/data");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.search.similarity_threshold, 0.2);
        assert_eq!(config.search.max_results, 20);
        assert_eq!(config.rerank.strategy, RerankStrategy::Heuristic);
        assert_eq!(config.intent.strategy, IntentStrategy::Generative);
        assert_eq!(config.conversation.max_messages, 20);
        assert_eq!(config.turn.search_display_limit, 5);
        assert_eq!(config.turn.date_check_limit, 10);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"
port = 8080

[rerank]
strategy = "generative"
max_candidates = 8

[intent]
strategy = "rule_based"
"#;
        let file = create_temp_config(content);
        let config = HearthConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.rerank.strategy, RerankStrategy::Generative);
        assert_eq!(config.rerank.max_candidates, 8);
        // Unspecified field in a present section keeps its default.
        assert_eq!(config.rerank.description_chars, 150);
        assert_eq!(config.intent.strategy, IntentStrategy::RuleBased);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[search]\nmax_results = 5\n");
        let config = HearthConfig::load(file.path()).unwrap();
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.similarity_threshold, 0.2);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nport = ");
        let result = HearthConfig::load(file.path());
        assert!(matches!(result, Err(HearthError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = HearthConfig::load_or_default(Path::new("/nonexistent/hearth.toml"));
        assert_eq!(config.general.port, 3040);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = HearthConfig::default();
        config.turn.timeout_secs = 15;
        config.rerank.strategy = RerankStrategy::Generative;
        config.save(&path).unwrap();

        let reloaded = HearthConfig::load(&path).unwrap();
        assert_eq!(reloaded.turn.timeout_secs, 15);
        assert_eq!(reloaded.rerank.strategy, RerankStrategy::Generative);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = HearthConfig::load(file.path()).unwrap();
        assert_eq!(config.gemini.chat_model, "gemini-2.5-flash");
        assert_eq!(config.gemini.embedding_model, "text-embedding-004");
        assert_eq!(config.conversation.idle_timeout_minutes, 1440);
    }
}
