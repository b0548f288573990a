//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables, e.g. `DATABASE_URL`, `GENERATION__BASE_URL`,
//! `CONVERSATION__CONTEXT_TURNS`.

use colloquy_ai::GenerationConfig;
use colloquy_conversation::OrchestratorSettings;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Generation backend configuration.
    pub generation: GenerationConfig,

    /// Orchestrator tuning.
    #[serde(default)]
    pub conversation: OrchestratorSettings,

    /// Weather tool configuration.
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Configuration for the weather tool capability.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    /// Endpoint returning current conditions as JSON.
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_weather_endpoint() -> String {
    "https://wttr.in/?format=j1".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_weather_endpoint(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_config_has_default_endpoint() {
        let config = WeatherConfig::default();
        assert!(config.endpoint.starts_with("https://"));
    }

    #[test]
    fn listen_addr_defaults_when_absent() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "database_url": "postgres://localhost/colloquy",
            "generation": { "base_url": "http://localhost:8000/v1", "model": "qwen" }
        }))
        .expect("deserialize");

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.conversation.context_turns, 5);
        assert_eq!(config.conversation.history_turns, 20);
    }
}
