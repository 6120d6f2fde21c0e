//! Text-generation capability.
//!
//! The pipeline treats generation as a black box: one prompt in, one
//! completion out. [`TextGenerator`] is that seam; [`OpenRouterClient`] is the
//! shipped implementation for OpenAI-compatible chat-completions APIs.

use std::time::Duration;

use askdata_shared::{AskDataError, LlmConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("AskData/", env!("CARGO_PKG_VERSION"));

/// Upper bound on a single HTTP exchange, independent of the per-stage budget.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// A single-shot text completion service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier for tracing.
    fn model(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenRouter client
// ---------------------------------------------------------------------------

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    /// Build a client from the `[llm]` config and an already-validated API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AskDataError::config(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AskDataError::Generation(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(AskDataError::Generation(format!("HTTP {status}: {snippet}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AskDataError::Generation(format!("invalid completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AskDataError::Generation("completion had no content".into()))?;

        debug!(completion_len = content.len(), "completion received");
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        let config = LlmConfig {
            base_url: format!("{}/api/v1/", server.uri()),
            model: "test/model".into(),
            ..LlmConfig::default()
        };
        OpenRouterClient::new(&config, "sk-test").unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test/model",
                "messages": [{"role": "user", "content": "How many rows?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "SELECT COUNT(*) FROM t"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client.generate("How many rows?").await.unwrap();
        assert_eq!(text, "SELECT COUNT(*) FROM t");
        assert_eq!(client.model(), "test/model");
    }

    #[tokio::test]
    async fn http_error_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("q").await.unwrap_err();
        assert!(matches!(err, AskDataError::Generation(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn empty_choices_is_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).generate("q").await.unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_generation_error() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..LlmConfig::default()
        };
        let client = OpenRouterClient::new(&config, "sk-test").unwrap();
        let err = client.generate("q").await.unwrap_err();
        assert!(matches!(err, AskDataError::Generation(_)));
    }
}
