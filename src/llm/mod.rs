//! Language-model capability
//!
//! The RAG core only needs one operation: complete a system + user prompt at
//! a given temperature. Provider routing, retries and fallbacks belong to the
//! implementation behind [`LanguageModel`], not to the callers.

pub mod client;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

pub use client::LlmClient;

use crate::errors::Result;

/// A single prompt to complete
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature,
        }
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Result of one completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    /// Which provider actually served the call
    pub provider_id: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt. No retry contract: failures are returned as-is.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
