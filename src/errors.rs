use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatRagError {
    #[error("Similarity index error: {0}")]
    Index(String),

    #[error("Message store error: {0}")]
    MessageStore(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatRagError {
    /// Whether the error came from a collaborator the core calls out to
    /// (index, store, model), as opposed to local setup problems.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Index(_) | Self::MessageStore(_) | Self::Llm(_) | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatRagError>;
