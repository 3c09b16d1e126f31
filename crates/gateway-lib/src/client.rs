//! HTTP access layer for the New Relic REST, Insights and GraphQL endpoints
//!
//! All three endpoints share one connection-pooled client with bounded
//! connect and request timeouts. Failures never panic: every call returns
//! a [`GatewayError`] the caller reports on its own boundary.

use crate::error::{GatewayError, Result};
use crate::models::Application;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_API_BASE: &str = "https://api.newrelic.com/v2/";
const DEFAULT_INSIGHTS_BASE: &str = "https://insights-api.newrelic.com/v1/";
const DEFAULT_GRAPHQL_BASE: &str = "https://api.newrelic.com/graphql";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint set, overridable for tests and proxied deployments
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_base: Url,
    pub insights_base: Url,
    pub graphql_base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default API URL"),
            insights_base: Url::parse(DEFAULT_INSIGHTS_BASE).expect("valid default Insights URL"),
            graphql_base: Url::parse(DEFAULT_GRAPHQL_BASE).expect("valid default GraphQL URL"),
        }
    }
}

impl Endpoints {
    /// Parse an endpoint set from base-URL strings
    pub fn new(api_base: &str, insights_base: &str, graphql_base: &str) -> Result<Self> {
        let parse = |s: &str| {
            Url::parse(s).map_err(|e| GatewayError::Config(format!("invalid endpoint URL {s}: {e}")))
        };
        Ok(Self {
            api_base: parse(api_base)?,
            insights_base: parse(insights_base)?,
            graphql_base: parse(graphql_base)?,
        })
    }

    /// Default endpoints with any configured overrides applied
    pub fn with_overrides(
        api_base: Option<&str>,
        insights_base: Option<&str>,
        graphql_base: Option<&str>,
    ) -> Result<Self> {
        Self::new(
            api_base.unwrap_or(DEFAULT_API_BASE),
            insights_base.unwrap_or(DEFAULT_INSIGHTS_BASE),
            graphql_base.unwrap_or(DEFAULT_GRAPHQL_BASE),
        )
    }
}

/// Roster entry as the applications index reports it
#[derive(Debug, Deserialize)]
struct ApplicationRecord {
    name: String,
    id: i64,
    health_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApplicationsResponse {
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
}

/// Client for the New Relic REST v2, Insights and GraphQL APIs
pub struct NewRelicClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    api_key: String,
    insights_query_key: String,
    account_id: String,
}

impl NewRelicClient {
    pub fn new(api_key: String, insights_query_key: String, account_id: String) -> Result<Self> {
        Self::with_endpoints(api_key, insights_query_key, account_id, Endpoints::default())
    }

    pub fn with_endpoints(
        api_key: String,
        insights_query_key: String,
        account_id: String,
        endpoints: Endpoints,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoints,
            api_key,
            insights_query_key,
            account_id,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// GET a REST v2 resource, e.g. `applications.json`
    pub async fn rest_get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self
            .endpoints
            .api_base
            .join(path)
            .map_err(|e| GatewayError::Config(format!("invalid path {path}: {e}")))?;
        debug!(url = %url, "Making New Relic REST request");

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .query(params)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Run an NRQL query against the Insights query endpoint
    pub async fn insights_query(&self, nrql: &str) -> Result<Value> {
        let path = format!("accounts/{}/query", self.account_id);
        let url = self
            .endpoints
            .insights_base
            .join(&path)
            .map_err(|e| GatewayError::Config(format!("invalid path {path}: {e}")))?;
        debug!(nrql = %nrql, "Making Insights API request");

        let response = self
            .client
            .get(url)
            .header("X-Query-Key", &self.insights_query_key)
            .query(&[("nrql", nrql)])
            .send()
            .await?;

        Self::decode(response).await
    }

    /// POST a GraphQL document; an `errors` payload in the body is an error
    pub async fn graphql(&self, document: &str) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoints.graphql_base.clone())
            .header("X-Api-Key", &self.api_key)
            .json(&json!({ "query": document }))
            .send()
            .await?;

        let body = Self::decode(response).await?;
        if let Some(errors) = body.get("errors") {
            return Err(GatewayError::Graphql(errors.to_string()));
        }
        Ok(body)
    }

    /// Fetch the application roster, excluding unreporting ("grey") entries
    pub async fn fetch_applications(&self) -> Result<Vec<Application>> {
        let body = self.rest_get("applications.json", &[]).await?;
        let parsed: ApplicationsResponse = serde_json::from_value(body)
            .map_err(|e| GatewayError::Shaping(format!("malformed applications index: {e}")))?;

        info!(count = parsed.applications.len(), "Found applications");
        Ok(parsed
            .applications
            .into_iter()
            .filter(|app| app.health_status.as_deref() != Some("grey"))
            .map(|app| Application {
                name: app.name,
                id: app.id,
            })
            .collect())
    }

    async fn decode(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("{status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("failed to parse response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(server: &mockito::ServerGuard) -> NewRelicClient {
        let base = format!("{}/", server.url());
        let endpoints = Endpoints::new(&base, &base, &server.url()).unwrap();
        NewRelicClient::with_endpoints(
            "test_api_key".into(),
            "test_insights_key".into(),
            "123456".into(),
            endpoints,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rest_get_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/applications.json")
            .match_header("x-api-key", "test_api_key")
            .with_status(200)
            .with_body(r#"{"applications": []}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.rest_get("applications.json", &[]).await.unwrap();
        assert!(result.get("applications").is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rest_get_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/applications.json")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.rest_get("applications.json", &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_insights_query_sends_nrql_param() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts/123456/query")
            .match_header("x-query-key", "test_insights_key")
            .match_query(mockito::Matcher::UrlEncoded(
                "nrql".into(),
                "SELECT * FROM Metric".into(),
            ))
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let result = client.insights_query("SELECT * FROM Metric").await.unwrap();
        assert!(result.get("results").is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_errors_payload_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"errors": [{"message": "bad query"}]}"#)
            .create_async()
            .await;

        let client = test_client(&server);
        let err = client.graphql("{ actor { } }").await.unwrap_err();
        assert!(matches!(err, GatewayError::Graphql(_)));
        assert!(err.to_string().contains("bad query"));
    }

    #[tokio::test]
    async fn test_fetch_applications_filters_grey() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/applications.json")
            .with_status(200)
            .with_body(
                r#"{"applications": [
                    {"name": "App1", "id": 1, "health_status": "green"},
                    {"name": "App2", "id": 2, "health_status": "grey"},
                    {"name": "App3", "id": 3, "health_status": "red"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server);
        let apps = client.fetch_applications().await.unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "App1");
        assert_eq!(apps[1].id, 3);
    }
}
