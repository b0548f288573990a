//! Generation backend abstraction.
//!
//! Provides a unified interface for the text-generation capability the
//! orchestrator consults. The contract is deliberately narrow: an ordered
//! sequence of role-tagged messages in, generated text out.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System/priming message.
    System,
    /// User/human message.
    User,
    /// Assistant message.
    Assistant,
}

/// A message in a generation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Configuration for a generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key (if the endpoint requires one).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Temperature for sampling.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Creates a configuration for an OpenAI-compatible endpoint.
    #[must_use]
    pub fn openai_compatible(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for generation backends.
///
/// The orchestrator treats generation as a single blocking request; no
/// streaming or partial results are part of this contract.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generates a response for the given ordered messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation call fails.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
