use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::rag::constants::DEFAULT_CONTEXT_BUDGET_CHARS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub directory: String,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gemma3:27b".to_string()
}

const fn default_llm_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates requested from the per-message index
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    /// Candidates requested from the dialog-window index
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,
    /// Lookback used by personal search when the caller gives none
    #[serde(default = "default_lookback_days")]
    pub default_lookback_days: u32,
}

pub(crate) const fn default_message_limit() -> usize {
    20
}

pub(crate) const fn default_window_limit() -> usize {
    10
}

pub(crate) const fn default_lookback_days() -> u32 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            window_limit: default_window_limit(),
            default_lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard character budget for the assembled chat context
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,
}

pub(crate) const fn default_budget_chars() -> usize {
    DEFAULT_CONTEXT_BUDGET_CHARS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - File read errors
    /// - TOML syntax or schema errors
    /// - Values rejected by [`AppConfig::validate`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    ///
    /// # Errors
    /// - No `config.toml` or `config.example.toml` in the working directory
    /// - Any error from [`AppConfig::from_file`]
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::ChatRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Reject values the pipeline cannot work with
    ///
    /// # Errors
    /// Returns [`crate::ChatRagError::Config`] naming the offending field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.llm.llm_endpoint.trim().is_empty() {
            return Err(crate::ChatRagError::Config(
                "llm.llm_endpoint must not be empty".to_string(),
            ));
        }
        if self.retrieval.message_limit == 0 || self.retrieval.window_limit == 0 {
            return Err(crate::ChatRagError::Config(
                "retrieval limits must be greater than zero".to_string(),
            ));
        }
        if self.context.budget_chars == 0 {
            return Err(crate::ChatRagError::Config(
                "context.budget_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get LLM endpoint
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    /// Get LLM key
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    /// Get LLM model
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }

    /// Get context budget in characters
    pub fn context_budget_chars(&self) -> usize {
        self.context.budget_chars
    }

    /// Get default personal-search lookback in days
    pub fn default_lookback_days(&self) -> u32 {
        self.retrieval.default_lookback_days
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: default_log_dir(),
            },
            llm: LlmConfig {
                llm_endpoint: "http://localhost:11434".to_string(),
                llm_key: "ollama".to_string(),
                llm_model: default_llm_model(),
                timeout_secs: default_llm_timeout(),
            },
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
        }
    }
}
