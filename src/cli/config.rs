//! Configuration management for TutorBuddy
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.tutorbuddy/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{Result, TutorError};
use crate::retrieval::Provider;

/// Complete configuration for TutorBuddy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptLimits,
    pub vision: VisionConfig,
    pub images: ImagesConfig,
    pub embedding: EmbeddingConfig,
    pub coder: CoderConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
}

/// Text-generation endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub timeout_secs: u64,
}

/// Retrieval adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub sources: Vec<Provider>,
    pub wikipedia_url: String,
    pub wikipedia_top_k: usize,
    pub wikipedia_max_chars: usize,
    pub duckduckgo_url: String,
    pub tavily_url: String,
    pub result_count: usize,
    pub timeout_secs: u64,
}

/// Prompt truncation limits, in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLimits {
    pub max_source_chars: usize,
    pub max_context_chars: usize,
}

/// Vision captioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Image crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub search_url: String,
    pub root_dir: String,
    pub max_num: usize,
    pub min_width: u32,
    pub min_height: u32,
}

/// Embedding endpoint and chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

/// Code assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderConfig {
    pub max_attempts: u32,
    pub python: String,
    pub timeout_secs: u64,
}

/// Terminal output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
    pub show_progress_bars: bool,
    pub color_output: bool,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub history_file: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            model: "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            stream: true,
            timeout_secs: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            sources: vec![Provider::Wikipedia, Provider::Duckduckgo],
            wikipedia_url: "https://en.wikipedia.org".to_string(),
            wikipedia_top_k: 3,
            wikipedia_max_chars: 4000,
            duckduckgo_url: "https://api.duckduckgo.com".to_string(),
            tavily_url: "https://api.tavily.com".to_string(),
            result_count: 3,
            timeout_secs: 30,
        }
    }
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_source_chars: 2000,
            max_context_chars: 6000,
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.bing.com/images/async".to_string(),
            root_dir: "./images".to_string(),
            max_num: 1,
            min_width: 100,
            min_height: 100,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string(),
            model: "sentence-transformers/all-MiniLM-l6-v2".to_string(),
            chunk_size: 500,
            chunk_overlap: 0,
            top_k: 4,
        }
    }
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            python: "python3".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            show_progress_bars: true,
            color_output: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            history_file: "~/.tutorbuddy/history".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TutorError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| TutorError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".tutorbuddy").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(TutorError::ConfigError(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.inference.max_tokens == 0 {
            return Err(TutorError::ConfigError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.inference.timeout_secs == 0
            || self.retrieval.timeout_secs == 0
            || self.vision.timeout_secs == 0
            || self.coder.timeout_secs == 0
        {
            return Err(TutorError::ConfigError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.prompt.max_source_chars == 0 || self.prompt.max_context_chars == 0 {
            return Err(TutorError::ConfigError(
                "prompt limits must be greater than 0".to_string(),
            ));
        }

        if self.embedding.chunk_overlap >= self.embedding.chunk_size {
            return Err(TutorError::ConfigError(
                "chunk_overlap must be less than chunk_size".to_string(),
            ));
        }

        if self.coder.max_attempts == 0 {
            return Err(TutorError::ConfigError(
                "coder.max_attempts must be at least 1".to_string(),
            ));
        }

        match self.telemetry.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            _ => {
                return Err(TutorError::ConfigError(format!(
                    "Invalid verbosity level: {}",
                    self.telemetry.default_verbosity
                )))
            }
        }

        Ok(())
    }

    /// Render as TOML for display
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TutorError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Request timeout for the text-generation endpoint
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_secs)
    }

    /// Request timeout for retrieval, vision and crawler calls
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval.timeout_secs)
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get REPL history file path
    pub fn history_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.history_file)
    }

    /// Get image download root
    pub fn image_root(&self) -> PathBuf {
        Self::expand_path(&self.images.root_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inference.model, "mistralai/Mixtral-8x7B-Instruct-v0.1");
        assert_eq!(config.inference.max_tokens, 512);
        assert_eq!(
            config.retrieval.sources,
            vec![Provider::Wikipedia, Provider::Duckduckgo]
        );
        assert_eq!(config.embedding.chunk_size, 500);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_temperature() {
        let mut config = Config::default();
        config.inference.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_prompt_limit() {
        let mut config = Config::default();
        config.prompt.max_context_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_overlap() {
        let mut config = Config::default();
        config.embedding.chunk_overlap = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_attempts() {
        let mut config = Config::default();
        config.coder.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let mut config = Config::default();
        config.vision.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.coder.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_verbosity() {
        let mut config = Config::default();
        config.telemetry.default_verbosity = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[inference]\ntemperature = 0.2\n\n[retrieval]\nsources = [\"tavily\"]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!((config.inference.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.inference.max_tokens, 512);
        assert_eq!(config.retrieval.sources, vec![Provider::Tavily]);
    }

    #[test]
    fn test_rendered_toml_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.coder.max_attempts = 7;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.coder.max_attempts, 7);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path("~/.tutorbuddy");
        assert!(!expanded.to_string_lossy().contains('~'));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = "/absolute/path";
        assert_eq!(Config::expand_path(path).to_string_lossy(), path);
    }
}
