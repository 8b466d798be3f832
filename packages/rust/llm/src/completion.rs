//! Text completion over an OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use autoservice_shared::{AutoserviceError, CompletionConfig, Result, read_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::{build_client, endpoint};

/// Generates text from a single prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as one user message and return the generated text.
    ///
    /// Fails with [`AutoserviceError::CompletionUnavailable`] when the
    /// credential is missing, the request fails, or the reply is empty.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
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
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Completion client for OpenAI and API-compatible servers.
///
/// A client without an API key can still be constructed; every call then
/// fails with `CompletionUnavailable`, so the server starts without a key
/// and only the AI endpoints report the problem.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    url: Url,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Build a client, reading the key from the env var named in `config`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        Self::new(config, read_api_key(&config.api_key_env))
    }

    /// Build a client with an explicit key.
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: endpoint(&config.base_url, "chat/completions")?,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Whether a credential is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AutoserviceError::completion("no API key configured"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AutoserviceError::completion(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(AutoserviceError::completion(format!(
                "HTTP {status}: {snippet}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AutoserviceError::completion(format!("invalid response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AutoserviceError::completion("empty response"));
        }

        debug!(reply_chars = text.len(), "completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            base_url: format!("{}/v1", server.uri()),
            model: "test-model".into(),
            ..Default::default()
        }
    }

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[tokio::test]
    async fn posts_prompt_and_returns_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [{ "role": "user", "content": "Hallo" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("  Guten Tag!\n")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let text = client.complete("Hallo", 0.7).await.unwrap();
        assert_eq!(text, "Guten Tag!");
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), None).unwrap();
        assert!(!client.has_credential());
        let err = client.complete("Hallo", 0.7).await.unwrap_err();
        assert!(matches!(err, AutoserviceError::CompletionUnavailable(_)));
    }

    #[tokio::test]
    async fn http_error_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let err = client.complete("Hallo", 0.7).await.unwrap_err();
        match err {
            AutoserviceError::CompletionUnavailable(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("rate limited"));
            }
            other => panic!("expected CompletionUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_reply_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("   ")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let err = client.complete("Hallo", 0.7).await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn no_choices_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        assert!(client.complete("Hallo", 0.7).await.is_err());
    }
}
