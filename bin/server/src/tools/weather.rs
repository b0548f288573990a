//! Weather lookup tool.
//!
//! Suspending capability: fetches current conditions from a configured
//! JSON endpoint. What that endpoint does to produce its data is its own
//! business.

use crate::config::WeatherConfig;
use async_trait::async_trait;
use colloquy_conversation::{SuspendingTool, ToolError};
use serde_json::Value as JsonValue;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches current weather conditions over HTTP.
pub struct WeatherTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WeatherTool {
    /// Builds the capability from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &WeatherConfig) -> Result<Self, ToolError> {
        if config.endpoint.is_empty() {
            return Err(ToolError::init("weather endpoint must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ToolError::init)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl SuspendingTool for WeatherTool {
    async fn invoke(&self, _args: JsonValue) -> Result<JsonValue, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(ToolError::execution)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution(format!(
                "weather endpoint answered {status}"
            )));
        }

        response.json().await.map_err(ToolError::execution)
    }
}
