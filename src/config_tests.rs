//! Unit tests for configuration module
//!
//! These tests validate configuration parsing, defaults, and validation.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::config::*;
    use crate::errors::ChatRagError;

    const MINIMAL: &str = r#"
[logging]
level = "debug"

[llm]
llm_endpoint = "http://localhost:11434"
llm_key = "ollama"
"#;

    // ====== Default Value Tests ======

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.context_budget_chars(), 16_000);
        assert_eq!(config.default_lookback_days(), 30);
        assert_eq!(config.retrieval.message_limit, 20);
        assert_eq!(config.retrieval.window_limit, 10);
        assert_eq!(config.llm_model(), "gemma3:27b");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_file_fills_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.directory, "logs");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.context.budget_chars, default_budget_chars());
        assert_eq!(config.retrieval.default_lookback_days, default_lookback_days());
    }

    #[test]
    fn test_overrides() {
        let content = format!(
            "{MINIMAL}\n[retrieval]\nmessage_limit = 50\n\n[context]\nbudget_chars = 24000\n"
        );
        let config: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.retrieval.message_limit, 50);
        assert_eq!(config.retrieval.window_limit, default_window_limit());
        assert_eq!(config.context_budget_chars(), 24_000);
    }

    // ====== File Loading Tests ======

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.llm_endpoint(), "http://localhost:11434");
        assert_eq!(config.llm_key(), "ollama");
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ChatRagError::Io(_)));
    }

    // ====== Validation Tests ======

    #[test]
    fn test_zero_budget_rejected() {
        let mut config = AppConfig::default();
        config.context.budget_chars = 0;
        assert!(matches!(config.validate(), Err(ChatRagError::Config(_))));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let mut config = AppConfig::default();
        config.llm.llm_endpoint = "  ".to_string();
        assert!(matches!(config.validate(), Err(ChatRagError::Config(_))));
    }
}
