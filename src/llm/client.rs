//! OpenAI-compatible chat-completions client (works against Ollama's `/v1` API too)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::Completion;
use super::CompletionRequest;
use super::LanguageModel;
use super::TokenUsage;
use crate::config::AppConfig;
use crate::errors::ChatRagError;
use crate::errors::Result;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// HTTP client for a single chat-completions endpoint
pub struct LlmClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl LlmClient {
    /// Create a client from the `[llm]` config section
    ///
    /// # Errors
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.llm_endpoint().trim_end_matches('/').to_string(),
            api_key: config.llm_key().to_string(),
            model: config.llm_model().to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}{COMPLETIONS_PATH}", self.endpoint)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            stream: false,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
        };

        debug!(
            "LLM request to {} (model: {}, temperature: {})",
            self.endpoint, self.model, request.temperature
        );

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatRagError::Llm(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatRagError::Llm(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatRagError::Llm(format!("unreadable completion response: {e}")))?;
        completion_from_response(parsed, &self.model)
    }
}

fn completion_from_response(response: ChatResponse, fallback_model: &str) -> Result<Completion> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ChatRagError::Llm("response has no message content".to_string()))?;

    let usage = response
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(Completion {
        content,
        usage,
        provider_id: response.model.unwrap_or_else(|| fallback_model.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_choice_content_and_usage() {
        let json = serde_json::json!({
            "model": "gemma3:27b",
            "choices": [{ "message": { "role": "assistant", "content": "Friday." } }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 4, "total_tokens": 124 }
        });
        let response: ChatResponse = serde_json::from_value(json).unwrap();
        let completion = completion_from_response(response, "fallback").unwrap();
        assert_eq!(completion.content, "Friday.");
        assert_eq!(completion.usage.total(), 124);
        assert_eq!(completion.provider_id, "gemma3:27b");
    }

    #[test]
    fn test_missing_content_is_an_error() {
        let json = serde_json::json!({ "choices": [] });
        let response: ChatResponse = serde_json::from_value(json).unwrap();
        let err = completion_from_response(response, "m").unwrap_err();
        assert!(matches!(err, ChatRagError::Llm(_)));
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let mut config = AppConfig::default();
        config.llm.llm_endpoint = "http://localhost:11434/".to_string();
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.url(), "http://localhost:11434/v1/chat/completions");
    }
}
