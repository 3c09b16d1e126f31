//! MCP tool surface
//!
//! Exposes the gateway operations as agent-callable tools over stdio.
//! Every handler answers with a `CallToolResult`: shaped JSON on success,
//! error text otherwise. Failures never escape as transport faults.

use gateway_lib::{Gateway, GatewayMetrics};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

fn default_time_range() -> u32 {
    30
}

fn default_db_time_range() -> u32 {
    15
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ApplicationRequest {
    /// Free-text application name; fuzzily matched against the roster
    #[schemars(description = "Name of the application")]
    pub application_name: String,

    #[serde(default = "default_time_range")]
    #[schemars(description = "Time range in minutes to get data for")]
    pub time_range_minutes: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TransactionRequest {
    #[schemars(description = "Name of the application")]
    pub application_name: String,

    /// Transaction name or API endpoint URI fragment
    #[schemars(description = "Transaction name or endpoint URI to break down")]
    pub transaction_name: String,

    #[serde(default = "default_time_range")]
    #[schemars(description = "Time range in minutes to get data for")]
    pub time_range_minutes: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryLogsRequest {
    /// Raw NRQL, e.g. `SELECT * FROM Log SINCE 15 minutes ago LIMIT 5`
    #[schemars(description = "NRQL query to run against the account")]
    pub nrql_query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DbQueryPerformanceRequest {
    #[schemars(description = "New Relic entity guid of the database operation")]
    pub entity_guid: String,

    #[schemars(description = "Database operation name, e.g. select")]
    pub operation: String,

    #[schemars(description = "Database table name")]
    pub table: String,

    #[schemars(description = "Database system name, e.g. MySQL")]
    pub system: String,

    #[serde(default = "default_db_time_range")]
    #[schemars(description = "Time range in minutes to get data for")]
    pub time_range_minutes: u32,
}

fn success_json<T: Serialize>(value: &T) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

fn error_text(context: &str, error: impl std::fmt::Display) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("{context}: {error}"))])
}

/// The MCP service wrapping the gateway
#[derive(Clone)]
pub struct GatewayToolServer {
    gateway: Arc<Gateway>,
    metrics: GatewayMetrics,
    tool_router: ToolRouter<Self>,
}

impl GatewayToolServer {
    pub fn new(gateway: Arc<Gateway>, metrics: GatewayMetrics) -> Self {
        Self {
            gateway,
            metrics,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl GatewayToolServer {
    #[tool(
        description = "Get overall APM metrics (response time, calls per minute, call count) for an application over a recent time window."
    )]
    pub async fn get_newrelic_apm_metrics(
        &self,
        Parameters(request): Parameters<ApplicationRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics.inc_tool_invocation("get_newrelic_apm_metrics");
        match self
            .gateway
            .apm_metrics(&request.application_name, request.time_range_minutes)
            .await
        {
            Ok(series) => Ok(success_json(&series)),
            Err(e) => Ok(error_text("Error fetching New Relic APM metrics", e)),
        }
    }

    #[tool(
        description = "Get the top slow transactions of an application together with their per-segment breakdown."
    )]
    pub async fn get_application_slow_transactions_details(
        &self,
        Parameters(request): Parameters<ApplicationRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics
            .inc_tool_invocation("get_application_slow_transactions_details");
        match self
            .gateway
            .slow_transaction_details(&request.application_name, request.time_range_minutes)
            .await
        {
            Ok(report) => Ok(success_json(&report)),
            Err(e) => Ok(error_text("Error fetching slow transactions", e)),
        }
    }

    #[tool(
        description = "Get the top database operations of an application, sorted by average query time, with slow-query flags."
    )]
    pub async fn get_application_top_database_operations_details(
        &self,
        Parameters(request): Parameters<ApplicationRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics
            .inc_tool_invocation("get_application_top_database_operations_details");
        match self
            .gateway
            .top_database_operations(&request.application_name, request.time_range_minutes)
            .await
        {
            Ok(report) => Ok(success_json(&report)),
            Err(e) => Ok(error_text("Error fetching top database operations", e)),
        }
    }

    #[tool(
        description = "Get the timing breakdown segments of one transaction or API endpoint, with each segment's share of total time."
    )]
    pub async fn get_transaction_breakdown_segments(
        &self,
        Parameters(request): Parameters<TransactionRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics
            .inc_tool_invocation("get_transaction_breakdown_segments");
        match self
            .gateway
            .transaction_breakdown(
                &request.application_name,
                &request.transaction_name,
                request.time_range_minutes,
            )
            .await
        {
            Ok(breakdown) => Ok(success_json(&breakdown)),
            Err(e) => Ok(error_text("Error fetching transaction breakdown", e)),
        }
    }

    #[tool(
        description = "Get response time and throughput of a single transaction or API endpoint."
    )]
    pub async fn get_transaction_details(
        &self,
        Parameters(request): Parameters<TransactionRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics.inc_tool_invocation("get_transaction_details");
        match self
            .gateway
            .transaction_details(
                &request.application_name,
                &request.transaction_name,
                request.time_range_minutes,
            )
            .await
        {
            Ok(details) => Ok(success_json(&details)),
            Err(e) => Ok(error_text("Error fetching transaction details", e)),
        }
    }

    #[tool(description = "List the APM metric names available for an application.")]
    pub async fn get_available_apm_metrics(
        &self,
        Parameters(request): Parameters<ApplicationRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics.inc_tool_invocation("get_available_apm_metrics");
        match self
            .gateway
            .available_apm_metrics(&request.application_name)
            .await
        {
            Ok(names) => Ok(success_json(&names)),
            Err(e) => Ok(error_text("Error fetching available APM metrics", e)),
        }
    }

    #[tool(
        description = "Run an NRQL query through the GraphQL API and return the rows as formatted text. Useful for log queries."
    )]
    pub async fn query_logs(
        &self,
        Parameters(request): Parameters<QueryLogsRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics.inc_tool_invocation("query_logs");
        let formatted = self.gateway.query_logs(&request.nrql_query).await;
        Ok(CallToolResult::success(vec![Content::text(formatted)]))
    }

    #[tool(
        description = "Get query time, throughput and calling transactions of one database operation, identified by entity guid, operation, table and system."
    )]
    pub async fn db_query_performance(
        &self,
        Parameters(request): Parameters<DbQueryPerformanceRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.metrics.inc_tool_invocation("db_query_performance");
        let result = self
            .gateway
            .db_query_performance(
                &request.entity_guid,
                &request.operation,
                &request.table,
                &request.system,
                request.time_range_minutes,
            )
            .await;
        Ok(success_json(&result))
    }
}

#[tool_handler]
impl ServerHandler for GatewayToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "New Relic monitoring-data gateway. Use the application-level tools \
                 (APM metrics, slow transactions, database operations) with a free-text \
                 application name; it is matched against the account's roster. Use \
                 'query_logs' for raw NRQL and 'db_query_performance' to drill into one \
                 database operation."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

/// Serve the tool surface on stdio until the client disconnects
pub async fn serve_stdio(gateway: Arc<Gateway>, metrics: GatewayMetrics) -> anyhow::Result<()> {
    let server = GatewayToolServer::new(gateway, metrics);
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    info!("MCP server running, waiting for client requests");
    service.waiting().await?;

    info!("MCP client disconnected, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_defaults() {
        let request: ApplicationRequest =
            serde_json::from_str(r#"{"application_name": "checkout"}"#).unwrap();
        assert_eq!(request.time_range_minutes, 30);

        let request: DbQueryPerformanceRequest = serde_json::from_str(
            r#"{"entity_guid": "abc", "operation": "select", "table": "users", "system": "MySQL"}"#,
        )
        .unwrap();
        assert_eq!(request.time_range_minutes, 15);
    }
}
