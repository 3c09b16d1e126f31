//! Gateway library for the New Relic MCP server
//!
//! This crate provides the core functionality for:
//! - Application name resolution with a process-lifetime cache
//! - Shaping of faceted query results into structured summaries
//! - REST, Insights and GraphQL access to New Relic
//! - Health checks and observability

pub mod client;
pub mod error;
pub mod gateway;
pub mod health;
pub mod models;
pub mod nrql;
pub mod observability;
pub mod resolver;
pub mod shaper;

pub use client::{Endpoints, NewRelicClient};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::GatewayMetrics;
pub use resolver::{AppResolver, ApplicationMatcher, LlmMatcher, NameSimilarityMatcher};
