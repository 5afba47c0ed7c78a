//! Retrieval-augmented question answering over a group chat's history.
//!
//! Start with [`rag::RagService`]; plug in a [`store::SimilarityIndex`], a
//! [`store::MessageStore`] and a [`llm::LanguageModel`].

pub mod cli;
pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod rag;
pub mod store;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod errors_tests;

pub use config::AppConfig;
pub use errors::*;
pub use rag::AskRequest;
pub use rag::AskResponse;
pub use rag::RagService;
