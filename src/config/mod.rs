//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden from
//! `REFCONTEXT_*` environment variables.
//!
//! | Environment Variable | Description | Default |
//! |---------------------|-------------|---------|
//! | `REFCONTEXT_LLM_PROVIDER` | `gemini` or `openai` | `gemini` |
//! | `REFCONTEXT_LLM_MODEL` | Model name | provider default |
//! | `REFCONTEXT_LLM_API_KEY` | API key | provider env var |
//! | `REFCONTEXT_LLM_TIMEOUT_MS` | HTTP request timeout | `30000` |
//! | `REFCONTEXT_EXTRACTION_USE_LLM` | Try the LLM before the fallback | `true` |
//! | `REFCONTEXT_EXTRACTION_TIMEOUT_MS` | Extraction deadline | `15000` |
//! | `REFCONTEXT_STORAGE_BACKEND` | `memory` or `filesystem` | `memory` |
//! | `REFCONTEXT_DATA_DIR` | Filesystem store directory | `.refcontext` |

mod limits;

pub use limits::{ExtractionConfig, HistoryLimits, SalienceConfig};

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for refcontext.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Salience decay and entity bounds.
    pub salience: SalienceConfig,
    /// Assistant-output history caps.
    pub history: HistoryLimits,
    /// Extraction behavior.
    pub extraction: ExtractionConfig,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Session storage configuration.
    pub storage: StorageConfig,
    /// Raw logging settings, resolved by [`crate::observability::LoggingConfig`].
    pub logging: LoggingSettings,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Which provider to use.
    pub provider: LlmProviderKind,
    /// Model name.
    pub model: Option<String>,
    /// API key. Falls back to the provider's own environment variable.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    /// Google Gemini.
    #[default]
    Gemini,
    /// `OpenAI` chat completions (or any compatible endpoint).
    OpenAi,
}

impl LlmProviderKind {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" | "open-ai" => Self::OpenAi,
            _ => Self::Gemini,
        }
    }
}

/// Session storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Bounded in-process map.
    #[default]
    Memory,
    /// One JSON file per session.
    Filesystem,
}

impl StorageBackend {
    /// Parses a backend string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "filesystem" | "fs" | "file" => Self::Filesystem,
            _ => Self::Memory,
        }
    }
}

/// Session storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Which backend to use.
    pub backend: StorageBackend,
    /// Directory for the filesystem backend.
    pub data_dir: PathBuf,
    /// Session capacity of the memory backend.
    pub max_sessions: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from(".refcontext"),
            max_sessions: 1024,
        }
    }
}

/// Logging section as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Optional log file path.
    pub file: Option<String>,
    /// `EnvFilter` directive.
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Salience section.
    pub salience: Option<ConfigFileSalience>,
    /// History section.
    pub history: Option<ConfigFileHistory>,
    /// Extraction section.
    pub extraction: Option<ConfigFileExtraction>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Salience section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSalience {
    /// Decay per turn.
    pub decay_per_turn: Option<f32>,
    /// Decay floor.
    pub floor: Option<f32>,
    /// Salience of a fresh mention.
    pub default: Option<f32>,
    /// Entity cap per collection.
    pub max_entities: Option<usize>,
    /// Measurement cap.
    pub max_measurements: Option<usize>,
}

/// History section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHistory {
    /// Lists cap.
    pub lists: Option<usize>,
    /// Recommendations cap.
    pub recommendations: Option<usize>,
    /// Examples cap.
    pub examples: Option<usize>,
    /// Procedures cap.
    pub procedures: Option<usize>,
}

/// Extraction section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileExtraction {
    /// Try the LLM first.
    pub use_llm: Option<bool>,
    /// Deadline in milliseconds.
    pub llm_timeout_ms: Option<u64>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Backend name.
    pub backend: Option<String>,
    /// Data directory.
    pub data_dir: Option<String>,
    /// Memory backend capacity.
    pub max_sessions: Option<usize>,
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting salience settings are out of range.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::NotFound(path.display().to_string()));
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let config = Self::parse_toml(&contents)?.with_env_overrides();
        config.salience.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text without env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn parse_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<config_dir>/refcontext/config.toml`, then
    /// `~/.config/refcontext/config.toml`. Falls back to defaults with env
    /// overrides when neither exists or parses.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default().with_env_overrides();
        };

        let candidates = [
            base_dirs.config_dir().join("refcontext").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("refcontext")
                .join("config.toml"),
        ];

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a `ConfigFile` to `EngineConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(salience) = file.salience {
            let s = &mut config.salience;
            s.decay_per_turn = salience.decay_per_turn.unwrap_or(s.decay_per_turn);
            s.floor = salience.floor.unwrap_or(s.floor);
            s.default_salience = salience.default.unwrap_or(s.default_salience);
            s.max_entities = salience.max_entities.unwrap_or(s.max_entities);
            s.max_measurements = salience.max_measurements.unwrap_or(s.max_measurements);
        }
        if let Some(history) = file.history {
            let h = &mut config.history;
            h.lists = history.lists.unwrap_or(h.lists);
            h.recommendations = history.recommendations.unwrap_or(h.recommendations);
            h.examples = history.examples.unwrap_or(h.examples);
            h.procedures = history.procedures.unwrap_or(h.procedures);
        }
        if let Some(extraction) = file.extraction {
            if let Some(v) = extraction.use_llm {
                config.extraction.use_llm = v;
            }
            if let Some(v) = extraction.llm_timeout_ms {
                config.extraction.llm_timeout_ms = v;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProviderKind::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key;
            config.llm.base_url = llm.base_url;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }
        if let Some(storage) = file.storage {
            if let Some(backend) = storage.backend {
                config.storage.backend = StorageBackend::parse(&backend);
            }
            if let Some(dir) = storage.data_dir {
                config.storage.data_dir = PathBuf::from(dir);
            }
            if let Some(max) = storage.max_sessions {
                config.storage.max_sessions = max;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies `REFCONTEXT_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("REFCONTEXT_LLM_PROVIDER") {
            self.llm.provider = LlmProviderKind::parse(&v);
        }
        if let Ok(v) = std::env::var("REFCONTEXT_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("REFCONTEXT_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env_parse::<u64>("REFCONTEXT_LLM_TIMEOUT_MS") {
            self.llm.timeout_ms = Some(v);
        }
        if let Some(v) = env_parse::<bool>("REFCONTEXT_EXTRACTION_USE_LLM") {
            self.extraction.use_llm = v;
        }
        if let Some(v) = env_parse::<u64>("REFCONTEXT_EXTRACTION_TIMEOUT_MS") {
            self.extraction.llm_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("REFCONTEXT_STORAGE_BACKEND") {
            self.storage.backend = StorageBackend::parse(&v);
        }
        if let Ok(v) = std::env::var("REFCONTEXT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        self
    }

    /// Disables the LLM path so extraction runs on patterns only.
    #[must_use]
    pub fn without_llm(mut self) -> Self {
        self.extraction.use_llm = false;
        self
    }
}

/// Reads and parses an environment variable, ignoring unparsable values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_sections() {
        let config = EngineConfig::parse_toml(
            r#"
            [salience]
            decay_per_turn = 0.2
            max_entities = 6

            [history]
            procedures = 2

            [extraction]
            use_llm = false
            llm_timeout_ms = 500

            [llm]
            provider = "openai"
            model = "gpt-4o-mini"

            [storage]
            backend = "filesystem"
            data_dir = "/tmp/refcontext"
            "#,
        )
        .unwrap();

        assert!((config.salience.decay_per_turn - 0.2).abs() < f32::EPSILON);
        assert!((config.salience.floor - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.salience.max_entities, 6);
        assert_eq!(config.history.procedures, 2);
        assert_eq!(config.history.lists, 5);
        assert!(!config.extraction.use_llm);
        assert_eq!(config.extraction.llm_timeout_ms, 500);
        assert_eq!(config.llm.provider, LlmProviderKind::OpenAi);
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/refcontext"));
    }

    #[test]
    fn test_parse_toml_invalid() {
        assert!(EngineConfig::parse_toml("[salience\nfloor = ").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load_from_file(std::path::Path::new("/nonexistent/x.toml"));
        assert!(matches!(result, Err(crate::Error::NotFound(_))));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProviderKind::parse("OpenAI"), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::parse("gemini"), LlmProviderKind::Gemini);
        assert_eq!(LlmProviderKind::parse("unknown"), LlmProviderKind::Gemini);
    }

    #[test]
    fn test_without_llm() {
        let config = EngineConfig::default().without_llm();
        assert!(!config.extraction.use_llm);
    }
}
