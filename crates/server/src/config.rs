//! Server configuration
//!
//! Non-credential settings loaded from the environment with the `GATEWAY_`
//! prefix. Credentials come in through the CLI (with env fallbacks) and are
//! validated eagerly at startup.

use anyhow::Result;
use gateway_lib::Endpoints;
use serde::Deserialize;

/// Server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port for the health/metrics HTTP sidecar
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Override for the New Relic REST v2 base URL
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Override for the Insights query base URL
    #[serde(default)]
    pub insights_base_url: Option<String>,

    /// Override for the GraphQL endpoint URL
    #[serde(default)]
    pub graphql_base_url: Option<String>,

    /// Override for the chat-completions base URL
    #[serde(default)]
    pub llm_base_url: Option<String>,
}

fn default_http_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            api_base_url: None,
            insights_base_url: None,
            graphql_base_url: None,
            llm_base_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("GATEWAY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// New Relic endpoint set with any overrides applied
    pub fn endpoints(&self) -> Result<Endpoints> {
        Ok(Endpoints::with_overrides(
            self.api_base_url.as_deref(),
            self.insights_base_url.as_deref(),
            self.graphql_base_url.as_deref(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, 8080);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_default_endpoints_resolve() {
        let config = ServerConfig::default();
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.api_base.host_str(), Some("api.newrelic.com"));
        assert_eq!(
            endpoints.insights_base.host_str(),
            Some("insights-api.newrelic.com")
        );
    }

    #[test]
    fn test_endpoint_override() {
        let config = ServerConfig {
            api_base_url: Some("http://localhost:9999/v2/".into()),
            ..ServerConfig::default()
        };
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.api_base.host_str(), Some("localhost"));
    }
}
