//! OpenAI-compatible generation backend.
//!
//! Works against any endpoint exposing the `/chat/completions` shape,
//! which covers OpenAI itself as well as the usual self-hosted gateways.

use crate::backend::{ChatMessage, GenerationBackend, GenerationConfig};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request payload for the chat completions endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Response payload from the chat completions endpoint.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionResponse {
    /// Extracts the generated text from the first choice.
    fn into_content(self) -> Result<String, GenerationError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::ResponseParseFailed {
                reason: "response contained no choices with content".to_string(),
            })
    }
}

/// Generation backend for OpenAI-compatible HTTP endpoints.
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: GenerationConfig,
    endpoint: String,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP
    /// client cannot be constructed.
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        if config.base_url.is_empty() {
            return Err(GenerationError::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        if config.model.is_empty() {
            return Err(GenerationError::InvalidConfig {
                reason: "model must not be empty".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let payload = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendRejected {
                status: status.as_u16(),
                reason: body,
            });
        }

        let parsed: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        parsed.into_content()
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
