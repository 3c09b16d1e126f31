//! New Relic MCP server
//!
//! Exposes New Relic APM data as MCP tools over stdio, with a health and
//! metrics HTTP sidecar. Startup sequence: load configuration, validate
//! credentials, initialize the application roster, then accept tool calls.

use anyhow::Result;
use clap::Parser;
use gateway_lib::{
    AppResolver, ApplicationMatcher, Gateway, GatewayMetrics, HealthRegistry, LlmMatcher,
    NameSimilarityMatcher, NewRelicClient,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod tools;

/// New Relic MCP Server
#[derive(Parser)]
#[command(name = "newrelic-mcp")]
#[command(author, version, about = "New Relic MCP server", long_about = None)]
struct Cli {
    /// New Relic API key
    #[arg(long, env = "NEW_RELIC_API_KEY")]
    api_key: Option<String>,

    /// New Relic Insights query key
    #[arg(long, env = "NEW_RELIC_INSIGHTS_QUERY_KEY")]
    insights_query_key: Option<String>,

    /// New Relic account id
    #[arg(long, env = "NEW_RELIC_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Model used to match application names to ids
    #[arg(long, env = "GATEWAY_LLM_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Credential for the matching model
    #[arg(long, env = "GATEWAY_LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Application name matching strategy
    #[arg(long, value_enum, default_value = "llm")]
    matcher: MatcherKind,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum MatcherKind {
    /// Delegate matching to a text-generation model
    Llm,
    /// Deterministic name-similarity matching
    Similarity,
}

struct Credentials {
    api_key: String,
    insights_query_key: String,
    account_id: String,
    llm_api_key: Option<String>,
}

/// Collect credentials, exiting with a listing of everything missing
fn validate_credentials(cli: &Cli) -> Credentials {
    let mut missing = Vec::new();
    if cli.api_key.is_none() {
        missing.push("NEW_RELIC_API_KEY (--api-key)");
    }
    if cli.insights_query_key.is_none() {
        missing.push("NEW_RELIC_INSIGHTS_QUERY_KEY (--insights-query-key)");
    }
    if cli.account_id.is_none() {
        missing.push("NEW_RELIC_ACCOUNT_ID (--account-id)");
    }
    if cli.matcher == MatcherKind::Llm && cli.llm_api_key.is_none() {
        missing.push("GATEWAY_LLM_API_KEY (--llm-api-key)");
    }

    if !missing.is_empty() {
        eprintln!("Missing required configuration:");
        for name in &missing {
            eprintln!("  - {name}");
        }
        std::process::exit(1);
    }

    Credentials {
        api_key: cli.api_key.clone().unwrap_or_default(),
        insights_query_key: cli.insights_query_key.clone().unwrap_or_default(),
        account_id: cli.account_id.clone().unwrap_or_default(),
        llm_api_key: cli.llm_api_key.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs go to stderr; stdout carries the MCP protocol
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting newrelic-mcp");

    let cli = Cli::parse();
    let settings = config::ServerConfig::load()?;
    let credentials = validate_credentials(&cli);

    let client = NewRelicClient::with_endpoints(
        credentials.api_key,
        credentials.insights_query_key,
        credentials.account_id,
        settings.endpoints()?,
    )?;

    let metrics = GatewayMetrics::new();
    let matcher: Arc<dyn ApplicationMatcher> = match cli.matcher {
        MatcherKind::Llm => {
            let llm_api_key = credentials.llm_api_key.unwrap_or_default();
            let matcher = match settings.llm_base_url.as_deref() {
                Some(base_url) => {
                    LlmMatcher::with_base_url(cli.model.clone(), llm_api_key, base_url)?
                }
                None => LlmMatcher::new(cli.model.clone(), llm_api_key)?,
            };
            Arc::new(matcher)
        }
        MatcherKind::Similarity => Arc::new(NameSimilarityMatcher),
    };

    let resolver = AppResolver::new(matcher, metrics.clone());
    let health = HealthRegistry::new();
    let gateway = Arc::new(Gateway::new(client, resolver, metrics.clone(), health.clone()));

    let count = gateway.initialize().await?;
    info!(applications = count, model = %cli.model, "Gateway initialized");
    health.set_ready(true).await;

    // Health and metrics sidecar
    let state = Arc::new(api::AppState::new(health, metrics.clone()));
    tokio::spawn(api::serve(settings.http_port, state));

    tools::serve_stdio(gateway, metrics).await
}
