//! Chat completions backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use potsbox_core::{GenerateRequest, LanguageModel, Message, Result, Role};

use crate::LlmError;

/// Backend configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model name/ID
    pub model: String,
    /// API base endpoint
    pub endpoint: String,
    /// API key (optional, e.g. for a local gateway)
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// OpenAI-style chat completions backend
#[derive(Clone)]
pub struct ChatBackend {
    client: Client,
    config: ChatConfig,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
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

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl ChatBackend {
    /// Create a new backend. Fails only if the HTTP client cannot be built.
    pub fn new(config: ChatConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn build_body<'a>(&'a self, request: &'a GenerateRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: request
                .messages
                .iter()
                .map(|m: &Message| WireMessage {
                    role: wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    async fn execute(
        &self,
        body: &ChatCompletionRequest<'_>,
    ) -> std::result::Result<String, LlmError> {
        let mut builder = self.client.post(self.api_url("/v1/chat/completions"));
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            // 5xx is retryable, 4xx is not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {status}: {detail}")));
            }
            return Err(LlmError::Api(format!("{status}: {detail}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        Ok(text.trim().to_string())
    }

    async fn generate_with_retry(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<String, LlmError> {
        let body = self.build_body(request);
        let mut backoff = self.config.initial_backoff;
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.execute(&body).await {
                Ok(text) => return Ok(text),
                Err(err @ LlmError::Network(_)) => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "chat completion failed, retrying"
                    );
                    last_error = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                // Not retryable
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("retries exhausted".to_string())))
    }
}

#[async_trait]
impl LanguageModel for ChatBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        Ok(self.generate_with_retry(request).await?)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        let mut builder = self.client.get(self.api_url("/v1/models"));
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        matches!(builder.send().await, Ok(resp) if resp.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potsbox_core::SamplingParams;

    #[test]
    fn test_build_body() {
        let backend = ChatBackend::new(ChatConfig::default()).unwrap();
        let request = GenerateRequest::new(
            vec![Message::system("be brief"), Message::user("hello")],
            SamplingParams {
                temperature: 0.0,
                max_tokens: 40,
            },
        )
        .json();

        let body = backend.build_body(&request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
        assert_eq!(json["max_tokens"], 40);
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_format_omitted_for_plain_text() {
        let backend = ChatBackend::new(ChatConfig::default()).unwrap();
        let request = GenerateRequest::new(
            vec![Message::user("hello")],
            SamplingParams::default(),
        );
        let json = serde_json::to_value(backend.build_body(&request)).unwrap();
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_api_url_joins_cleanly() {
        let backend = ChatBackend::new(ChatConfig {
            endpoint: "https://api.openai.com/".to_string(),
            ..ChatConfig::default()
        })
        .unwrap();
        assert_eq!(
            backend.api_url("/v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_completion_response() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello there."}}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hello there.")
        );
    }
}
