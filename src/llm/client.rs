//! Async completion client
//!
//! Model-agnostic HTTP client for the completion service.
//! Speaks the Anthropic Messages API and OpenAI-compatible chat completions
//! (DeepSeek, etc). Sampling is always deterministic (temperature 0).

use crate::core::config::LlmSettings;
use crate::core::error::{McpError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Anything that turns a system instruction plus a user prompt into raw text.
///
/// The interpreter only depends on this, so tests can substitute a canned
/// completion for the network.
pub trait CompletionService {
    fn complete(&self, system: &str, user: &str) -> impl Future<Output = Result<String>> + Send;
}

/// API format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// Async LLM client for making API calls
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new LLM client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            max_tokens: 1000,
            api_format,
        }
    }

    /// Build a client from settings; fails when no API key was configured
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| McpError::Config("CLAUDE_API_KEY (or LLM_API_KEY) not set".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_format: settings
                .api_format
                .unwrap_or_else(|| Self::detect_api_format(&settings.api_url)),
        })
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| McpError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(McpError::LlmError(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| McpError::LlmError(e.to_string()))?;

        // No text block is a bad completion, not an unavailable service
        Ok(completion
            .content
            .into_iter()
            .find_map(|c| c.text)
            .unwrap_or_default())
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| McpError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(McpError::LlmError(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| McpError::LlmError(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

impl CompletionService for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::OpenAI => self.complete_openai(system, user).await,
        }
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

// OpenAI-compatible API format (DeepSeek, OpenAI, etc.)
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Shared
#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            "test-model".into(),
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_url, "https://api.example.com");
        assert_eq!(client.model(), "test-model");
        assert_eq!(client.api_format, ApiFormat::OpenAI);
    }

    #[test]
    fn test_anthropic_format_detected() {
        let client = LlmClient::new(
            "k".into(),
            "https://api.anthropic.com/v1/messages".into(),
            "m".into(),
        );
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = LlmSettings::default();
        assert!(matches!(
            LlmClient::from_settings(&settings),
            Err(McpError::Config(_))
        ));
    }

    #[test]
    fn test_from_settings_uses_configured_limits() {
        let settings = LlmSettings {
            api_key: Some("secret".into()),
            max_tokens: 256,
            ..LlmSettings::default()
        };
        let client = LlmClient::from_settings(&settings).unwrap();
        assert_eq!(client.max_tokens, 256);
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_anthropic_request_is_deterministic() {
        let request = AnthropicRequest {
            model: "m".into(),
            max_tokens: 1000,
            temperature: 0.0,
            system: "sys".into(),
            messages: vec![Message {
                role: "user".into(),
                content: "open billing".into(),
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["system"], "sys");
    }

    #[test]
    fn test_explicit_format_overrides_url() {
        let settings = LlmSettings {
            api_key: Some("secret".into()),
            api_url: "http://127.0.0.1:9/v1/messages".into(),
            api_format: Some(ApiFormat::Anthropic),
            ..LlmSettings::default()
        };
        let client = LlmClient::from_settings(&settings).unwrap();
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_api_format_names() {
        let format: ApiFormat = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(format, ApiFormat::OpenAI);
        let format: ApiFormat = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_openai_null_content_decodes() {
        let response: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert_eq!(text, "");
    }

    #[test]
    fn test_anthropic_response_skips_non_text_blocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use"},{"type":"text","text":"{}"}]}"#,
        )
        .unwrap();
        let text = response.content.into_iter().find_map(|c| c.text);
        assert_eq!(text.as_deref(), Some("{}"));
    }
}
