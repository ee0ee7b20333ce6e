//! OpenAI-compatible chat completions client.

use super::{LlmHttpConfig, LlmProvider, build_http_client};
use crate::config::LlmConfig;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

/// `OpenAI` (or compatible) client.
pub struct OpenAiClient {
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Creates a client with default settings and no API key.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&LlmConfig::default())
    }

    /// Creates a client from configuration.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config
                .base_url
                .as_deref()
                .unwrap_or(Self::DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: build_http_client(LlmHttpConfig::from_config(config)),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Checks if the model only accepts `max_completion_tokens` and the
    /// default temperature.
    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("gpt-5")
            || self.model.starts_with("o1")
            || self.model.starts_with("o3")
    }

    fn upstream(cause: impl Into<String>, retryable: bool) -> Error {
        Error::Upstream {
            provider: PROVIDER.to_string(),
            cause: cause.into(),
            retryable,
        }
    }

    fn build_request(&self, messages: Vec<ChatMessage>) -> ChatCompletionRequest {
        if self.is_reasoning_model() {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: None,
                max_completion_tokens: Some(self.max_tokens),
                temperature: None,
            }
        } else {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: Some(self.max_tokens),
                max_completion_tokens: None,
                temperature: Some(self.temperature),
            }
        }
    }

    /// Makes a request to the chat completions endpoint.
    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Self::upstream("API key not configured (set OPENAI_TOKEN)", false))?;

        let request = self.build_request(messages);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| Self::upstream(e.to_string(), e.is_timeout() || e.is_connect() || e.is_request()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Self::upstream(
                format!("API returned status: {status} - {body}"),
                status.is_server_error() || status.as_u16() == 429,
            ));
        }

        let response: ChatCompletionResponse = response
            .json()
            .map_err(|e| Self::upstream(format!("invalid response body: {e}"), false))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Self::upstream("no choices in response", false))
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(vec![ChatMessage::user(prompt)])
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_configuration() {
        let client = OpenAiClient::new()
            .with_api_key("test-key")
            .with_endpoint("https://custom.endpoint/v1/")
            .with_model("gpt-4");

        assert_eq!(client.name(), "openai");
        assert_eq!(client.endpoint(), "https://custom.endpoint/v1");
        assert_eq!(client.model, "gpt-4");
        assert_eq!(
            client.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("test-key".to_string())
        );
    }

    #[test]
    fn test_missing_key_is_not_retryable() {
        let client = OpenAiClient::new();
        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, Error::Upstream { retryable: false, .. }));
    }

    #[test]
    fn test_request_body_for_chat_models() {
        let client = OpenAiClient::new().with_model("gpt-4o-mini");
        let body = serde_json::to_value(client.build_request(vec![ChatMessage::user("hi")])).unwrap();

        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("max_completion_tokens").is_none());
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_request_body_for_reasoning_models() {
        let client = OpenAiClient::new().with_model("o3-mini");
        let body = serde_json::to_value(client.build_request(vec![ChatMessage::user("hi")])).unwrap();

        assert_eq!(body["max_completion_tokens"], 500);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(OpenAiClient::new().with_model("gpt-5-mini").is_reasoning_model());
        assert!(OpenAiClient::new().with_model("o1-preview").is_reasoning_model());
        assert!(!OpenAiClient::new().with_model("gpt-4o").is_reasoning_model());
        assert!(!OpenAiClient::new().with_model("gpt-3.5-turbo").is_reasoning_model());
    }
}
