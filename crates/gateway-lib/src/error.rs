//! Error taxonomy for the gateway
//!
//! Transport and GraphQL failures abort the tool invocation that issued the
//! call. Shaping failures are caught per facet and only skip that facet.
//! Resolution failures abort the invoking tool call. Configuration failures
//! are checked once at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or HTTP-level failure talking to a New Relic endpoint.
    #[error("New Relic API request error: {0}")]
    Transport(String),

    /// The GraphQL endpoint answered with an `errors` payload.
    #[error("GraphQL errors: {0}")]
    Graphql(String),

    /// A facet or result array did not match its declared schema.
    #[error("unexpected result shape: {0}")]
    Shaping(String),

    /// The delegated application matcher failed or returned nothing.
    #[error("application resolution failed: {0}")]
    Resolution(String),

    /// Missing or invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
