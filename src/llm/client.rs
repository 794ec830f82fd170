//! Async LLM client for plan generation
//!
//! Model-agnostic HTTP client for OpenAI-compatible chat-completion APIs
//! (OpenAI, DeepSeek, local gateways). The generator only sees the
//! [`CompletionBackend`] trait, so tests can script responses.

use crate::core::config::GenerationConfig;
use crate::core::error::{PipelineError, Result};
use crate::llm::generator::GenerationRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Anything that can turn a prompt pair into generated text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, settings: &GenerationConfig) -> Self {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            api_url,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
        }
    }

    /// Create a client from environment variables
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL (defaults to the OpenAI chat-completions endpoint)
    /// Optional: LLM_MODEL (overrides `generation.model`)
    pub fn from_env(settings: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| PipelineError::Config("LLM_API_KEY not set".into()))?;
        let api_url = std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut client = Self::new(api_key, api_url, settings);
        if let Ok(model) = std::env::var("LLM_MODEL") {
            client.model = model;
        }
        Ok(client)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".into(),
                    content: request.system_prompt.clone(),
                },
                Message {
                    role: "user".into(),
                    content: request.user_prompt.clone(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            response_format: ResponseFormat {
                kind: "json_object".into(),
            },
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!(
                "API error {}: {}",
                status.as_u16(),
                truncate(&error_text, 300)
            )));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Generation(format!("malformed response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| PipelineError::Generation("Empty response".into()))
    }
}

/// Cut `s` to at most `max` bytes on a char boundary
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// OpenAI-compatible chat-completion format
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LlmClient {
        LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            &GenerationConfig::default(),
        )
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.model(), GenerationConfig::default().model);
    }

    #[test]
    fn test_request_shape() {
        let request = GenerationRequest {
            system_prompt: "sys".into(),
            user_prompt: "ban bob".into(),
        };
        let body = serde_json::to_value(client().build_request(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "ban bob");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body["top_p"].is_number());
        assert!(body["max_tokens"].is_number());
    }

    #[test]
    fn test_response_shape() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "{}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello");
        assert_eq!(truncate("あいう", 4), "あ");
    }

    #[test]
    fn test_from_env_missing_key() {
        let result = LlmClient::from_env(&GenerationConfig::default());
        // Should fail if LLM_API_KEY is not set
        if std::env::var("LLM_API_KEY").is_err() {
            assert!(result.is_err());
        }
    }
}
