//! Configuration management.
//!
//! Configuration is loaded once at start-up and passed by reference:
//!
//! 1. TOML file from `--config`, `ZNANIUM_CONFIG_PATH`, or the platform
//!    config directory (`znanium/config.toml`)
//! 2. `.env` in the working directory (loaded by the binary via `dotenvy`)
//! 3. Environment overrides (`OPENAI_TOKEN`, `OPENAI_API_BASE`, `GPT_MODEL`,
//!    `ZNANIUM_*`)
//! 4. Prompt templates from `prompts_path`, if set

mod prompts;

pub use prompts::{PromptTemplates, render_template};

use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ZNANIUM_CONFIG_PATH";

/// Main configuration for znanium.
#[derive(Debug, Clone)]
pub struct ZnaniumConfig {
    /// Directory for the database and other local state.
    pub data_dir: PathBuf,
    /// Explicit database file, otherwise `<data_dir>/knowledge.db`.
    pub database_path: Option<PathBuf>,
    /// Text-generation provider settings.
    pub llm: LlmConfig,
    /// Location matcher settings.
    pub matcher: MatcherConfig,
    /// Label of the root folder generated answers are saved into.
    pub ai_answers_folder: String,
    /// Prompt templates.
    pub prompts: PromptTemplates,
    /// Where `prompts` were loaded from, if not built in.
    pub prompts_path: Option<PathBuf>,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Text-generation provider configuration (OpenAI-compatible API).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name.
    pub model: String,
    /// API key.
    pub api_key: Option<SecretString>,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: Option<u64>,
    /// Retries for retryable failures.
    pub max_retries: Option<u32>,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the circuit stays open in milliseconds.
    pub breaker_reset_ms: Option<u64>,
}

impl LlmConfig {
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    /// Default completion length.
    pub const DEFAULT_MAX_TOKENS: u32 = 500;
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            timeout_ms: None,
            connect_timeout_ms: None,
            max_retries: None,
            retry_backoff_ms: None,
            breaker_failure_threshold: None,
            breaker_reset_ms: None,
        }
    }
}

/// Location matcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// A folder is accepted only when its similarity is strictly above this.
    pub threshold: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: 70 }
    }
}

/// Raw logging settings, resolved by [`crate::observability`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `znanium=debug`.
    pub filter: Option<String>,
    /// Log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database file.
    pub database_path: Option<String>,
    /// Root folder for saved answers.
    pub ai_answers_folder: Option<String>,
    /// Prompt templates JSON file.
    pub prompts_path: Option<String>,
    /// LLM configuration.
    pub llm: Option<ConfigFileLlm>,
    /// Matcher configuration.
    pub matcher: Option<ConfigFileMatcher>,
    /// Logging configuration.
    pub logging: Option<LoggingSettings>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens.
    pub max_tokens: Option<u32>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Retry count.
    pub max_retries: Option<u32>,
    /// Retry backoff.
    pub retry_backoff_ms: Option<u64>,
    /// Breaker failure threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset timeout.
    pub breaker_reset_ms: Option<u64>,
}

/// Matcher section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMatcher {
    /// Acceptance threshold, 0–100.
    pub threshold: Option<u8>,
}

impl Default for ZnaniumConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "znanium")
            .map_or_else(|| PathBuf::from(".znanium"), |dirs| dirs.data_dir().to_path_buf());
        Self {
            data_dir,
            database_path: None,
            llm: LlmConfig::default(),
            matcher: MatcherConfig::default(),
            ai_answers_folder: crate::services::DEFAULT_AI_ANSWERS_FOLDER.to_string(),
            prompts: PromptTemplates::default(),
            prompts_path: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl ZnaniumConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the full configuration: file, environment, prompt templates.
    ///
    /// `explicit` takes precedence over `ZNANIUM_CONFIG_PATH`; without either
    /// the default locations are tried.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named config file or the prompt
    /// templates file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let config = match named {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config
            .with_env_overrides_from(|key| std::env::var(key).ok())
            .with_prompts_loaded()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`znanium/config.toml`), then
    /// `~/.config/znanium/config.toml`. Returns defaults if neither parses.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("znanium").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("znanium")
                .join("config.toml"),
        ];
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring config file"),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `ZnaniumConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.database_path = file.database_path.map(PathBuf::from);
        if let Some(label) = file.ai_answers_folder.filter(|l| !l.trim().is_empty()) {
            config.ai_answers_folder = label;
        }
        config.prompts_path = file.prompts_path.map(PathBuf::from);
        if let Some(llm) = file.llm {
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            config.llm.api_key = llm.api_key.map(SecretString::from);
            config.llm.base_url = llm.base_url;
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
            config.llm.max_retries = llm.max_retries;
            config.llm.retry_backoff_ms = llm.retry_backoff_ms;
            config.llm.breaker_failure_threshold = llm.breaker_failure_threshold;
            config.llm.breaker_reset_ms = llm.breaker_reset_ms;
        }
        if let Some(threshold) = file.matcher.and_then(|m| m.threshold) {
            config.matcher.threshold = threshold.min(100);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored.
    #[must_use]
    pub fn with_env_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_TOKEN").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.llm.api_key = Some(SecretString::from(key));
        }
        if let Some(base) = non_empty("OPENAI_API_BASE") {
            self.llm.base_url = Some(base);
        }
        if let Some(model) = non_empty("GPT_MODEL").or_else(|| non_empty("gpt_model")) {
            self.llm.model = model;
        }
        if let Some(timeout_ms) = non_empty("ZNANIUM_LLM_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.llm.timeout_ms = Some(timeout_ms);
        }
        if let Some(retries) = non_empty("ZNANIUM_LLM_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.llm.max_retries = Some(retries);
        }
        if let Some(threshold) = non_empty("ZNANIUM_MATCH_THRESHOLD").and_then(|v| v.parse::<u8>().ok())
        {
            self.matcher.threshold = threshold.min(100);
        }
        if let Some(dir) = non_empty("ZNANIUM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty("ZNANIUM_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("ZNANIUM_PROMPTS_PATH") {
            self.prompts_path = Some(PathBuf::from(path));
        }
        if let Some(format) = non_empty("ZNANIUM_LOG_FORMAT") {
            self.logging.format = Some(format);
        }

        self
    }

    /// Replaces the built-in prompts with those from `prompts_path`, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn with_prompts_loaded(mut self) -> Result<Self> {
        if let Some(path) = &self.prompts_path {
            self.prompts = PromptTemplates::load_from_json(path)?;
        }
        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ZnaniumConfig::default();
        assert_eq!(config.matcher.threshold, 70);
        assert_eq!(config.ai_answers_folder, "AI answers");
        assert_eq!(config.llm.max_tokens, 500);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
data_dir = "/tmp/znanium-test"
ai_answers_folder = "Generated"

[llm]
model = "gpt-4o"
api_key = "sk-file"
timeout_ms = 5000

[matcher]
threshold = 80

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ZnaniumConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/znanium-test"));
        assert_eq!(config.ai_answers_folder, "Generated");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.timeout_ms, Some(5000));
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-file".to_string())
        );
        assert_eq!(config.matcher.threshold, 80);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_load_from_file_rejects_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "data_dir = [").unwrap();
        assert!(ZnaniumConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_TOKEN", "sk-env"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
            ("gpt_model", "local-model"),
            ("ZNANIUM_MATCH_THRESHOLD", "250"),
            ("ZNANIUM_LLM_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ZnaniumConfig::default()
            .with_env_overrides_from(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("sk-env".to_string())
        );
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.llm.model, "local-model");
        // clamped to the 0–100 scale
        assert_eq!(config.matcher.threshold, 100);
        assert_eq!(config.llm.timeout_ms, None);
    }

    #[test]
    fn test_prompts_loaded_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"generate_answer": "Q: {{}}"}}"#).unwrap();

        let mut config = ZnaniumConfig::default();
        config.prompts_path = Some(file.path().to_path_buf());
        let config = config.with_prompts_loaded().unwrap();
        assert_eq!(config.prompts.generate_answer("why?"), "Q: why?");
    }
}
