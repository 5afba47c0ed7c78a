//! Unit tests for error handling
//!
//! Tests error types, conversions, and error message formatting.

#[cfg(test)]
mod tests {
    use std::io;

    use crate::errors::ChatRagError;

    // ====== Error Type Tests ======

    #[test]
    fn test_index_error_display() {
        let error = ChatRagError::Index("window index unavailable".to_string());
        assert_eq!(
            format!("{error}"),
            "Similarity index error: window index unavailable"
        );
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(format!("{}", ChatRagError::Cancelled), "Request cancelled");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(ChatRagError::Index("x".to_string()).is_upstream());
        assert!(ChatRagError::MessageStore("x".to_string()).is_upstream());
        assert!(ChatRagError::Llm("x".to_string()).is_upstream());
        assert!(!ChatRagError::Config("x".to_string()).is_upstream());
        assert!(!ChatRagError::Cancelled.is_upstream());
    }

    // ====== Error Conversion Tests ======

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err: ChatRagError = io_err.into();

        match err {
            ChatRagError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let err: ChatRagError = json_err.into();
        assert!(matches!(err, ChatRagError::Serialization(_)));
    }

    #[test]
    fn test_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: ChatRagError = toml_err.into();
        assert!(matches!(err, ChatRagError::TomlParsing(_)));
        assert!(format!("{err}").starts_with("TOML parsing error"));
    }

    // ====== Result Type Tests ======

    #[test]
    fn test_result_and_then() {
        let result: crate::Result<i32> = Ok(42);
        let chained = result.and_then(|v| {
            if v > 40 {
                Ok(v + 10)
            } else {
                Err(ChatRagError::Config("Too small".to_string()))
            }
        });
        assert_eq!(chained.unwrap(), 52);
    }
}
