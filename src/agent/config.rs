//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! [`load_env_file`] should run first so that values from `.env.local` are
//! visible to [`AgentConfigBuilder::from_env`].

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4-1106-preview";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Default env file, relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env.local";
/// Default maximum tokens per completion.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Default maximum tool-calling loop iterations.
const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
/// Default number of chunks retrieved per query.
const DEFAULT_SIMILARITY_TOP_K: usize = 2;
/// Default context budget per QA/refine pass, in characters.
const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Configuration for the language-model side of the pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Chat model identifier.
    pub model: String,
    /// Sampling temperature (0.0–2.0).
    pub temperature: f32,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Maximum tool-calling loop iterations before aborting.
    pub max_tool_iterations: usize,
    /// Chunks retrieved from an index per query.
    pub similarity_top_k: usize,
    /// Context budget for one QA or refine pass.
    ///
    /// Retrieved chunks that do not fit are folded in with the refine
    /// template on later passes.
    pub max_context_chars: usize,
    /// Directory containing prompt template overrides.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }
}

/// Loads `KEY=value` pairs from `path` into the process environment.
///
/// Variables already set in the environment win. A missing file is not an
/// error; returns whether the file was loaded.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFile`] if the file exists but cannot be parsed.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded env file");
            Ok(true)
        }
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::EnvFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_tool_iterations: Option<usize>,
    similarity_top_k: Option<usize>,
    max_context_chars: Option<usize>,
    prompt_dir: Option<PathBuf>,
}

/// Reads an optional environment variable and parses it.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable is set
    /// but does not parse.
    pub fn from_env(mut self) -> Result<Self, ConfigError> {
        if self.provider.is_none() {
            self.provider = std::env::var("PAPERCHAT_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("PAPERCHAT_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("PAPERCHAT_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("PAPERCHAT_MODEL").ok();
        }
        if self.temperature.is_none() {
            self.temperature = env_parse("PAPERCHAT_TEMPERATURE")?;
        }
        if self.max_tool_iterations.is_none() {
            self.max_tool_iterations = env_parse("PAPERCHAT_MAX_TOOL_ITERATIONS")?;
        }
        if self.similarity_top_k.is_none() {
            self.similarity_top_k = env_parse("PAPERCHAT_TOP_K")?;
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("PAPERCHAT_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        Ok(self)
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the completion max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the maximum tool-calling loop iterations.
    #[must_use]
    pub const fn max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = Some(n);
        self
    }

    /// Sets how many chunks are retrieved per query.
    #[must_use]
    pub const fn similarity_top_k(mut self, n: usize) -> Self {
        self.similarity_top_k = Some(n);
        self
    }

    /// Sets the per-pass context budget in characters.
    #[must_use]
    pub const fn max_context_chars(mut self, n: usize) -> Self {
        self.max_context_chars = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ApiKeyMissing`] if no non-blank API key was set,
    /// and [`ConfigError::InvalidValue`] for an empty model name, a
    /// temperature outside 0.0–2.0, or zero-valued limits.
    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::ApiKeyMissing)?;

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature".to_string(),
                message: format!("{temperature} is outside 0.0-2.0"),
            });
        }

        let max_tool_iterations = self
            .max_tool_iterations
            .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS);
        let similarity_top_k = self.similarity_top_k.unwrap_or(DEFAULT_SIMILARITY_TOP_K);
        for (key, value) in [
            ("max_tool_iterations", max_tool_iterations),
            ("similarity_top_k", similarity_top_k),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model,
            temperature,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_tool_iterations,
            similarity_top_k,
            max_context_chars: self.max_context_chars.unwrap_or(DEFAULT_MAX_CONTEXT_CHARS),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert_eq!(config.similarity_top_k, DEFAULT_SIMILARITY_TOP_K);
        assert_eq!(config.max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(ConfigError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_blank_api_key() {
        let result = AgentConfig::builder().api_key("   ").build();
        assert!(matches!(result, Err(ConfigError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_rejects_out_of_range_temperature() {
        let result = AgentConfig::builder().api_key("k").temperature(3.5).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "temperature"));
    }

    #[test]
    fn test_builder_rejects_empty_model() {
        let result = AgentConfig::builder().api_key("k").model("").build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "model"));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .model("gpt-4o-mini")
            .temperature(0.0)
            .max_tool_iterations(3)
            .similarity_top_k(5)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tool_iterations, 3);
        assert_eq!(config.similarity_top_k, 5);
    }

    #[test]
    fn test_load_env_file_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let loaded = load_env_file(&dir.path().join(".env.local"));
        assert!(matches!(loaded, Ok(false)));
    }

    #[test]
    fn test_load_env_file_sets_variables() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join(".env.local");
        std::fs::write(&path, "PAPERCHAT_TEST_ENV_FILE_VALUE=from-file\n")
            .unwrap_or_else(|_| unreachable!());
        let loaded = load_env_file(&path);
        assert!(matches!(loaded, Ok(true)));
        assert_eq!(
            std::env::var("PAPERCHAT_TEST_ENV_FILE_VALUE").ok().as_deref(),
            Some("from-file")
        );
    }
}
