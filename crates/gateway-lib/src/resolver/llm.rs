//! Generative application matcher
//!
//! Delegates the fuzzy name match to an OpenAI-compatible chat-completions
//! endpoint. The model's single textual answer is taken verbatim as the
//! identifier; it is deliberately not validated against the roster.

use super::matcher::ApplicationMatcher;
use crate::error::{GatewayError, Result};
use crate::models::Application;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

const DEFAULT_COMPLETIONS_BASE: &str = "https://api.openai.com/v1/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Matcher backed by a chat-completions model
pub struct LlmMatcher {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: String,
}

impl LlmMatcher {
    pub fn new(model: String, api_key: String) -> Result<Self> {
        Self::with_base_url(model, api_key, DEFAULT_COMPLETIONS_BASE)
    }

    pub fn with_base_url(model: String, api_key: String, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to create HTTP client: {e}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid completions URL {base_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
        })
    }

    fn build_prompt(name: &str, roster: &[Application]) -> String {
        let roster_json = serde_json::to_string(roster).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Find the application id that best matches the application name \"{name}\" \
             from the available applications.\n\
             The list of applications available are:\n{roster_json}\n\n\
             Important Guidelines:\n\
             - if the application name is exactly the same as the application name in the list, return the application id\n\
             - if the application name is not exactly the same as the application name in the list, return the application id of the application that is the best match\n\n\
             You must return only the application id which is the best match for the \
             application name. No extra text or explanation."
        )
    }
}

#[async_trait]
impl ApplicationMatcher for LlmMatcher {
    async fn best_match(&self, name: &str, roster: &[Application]) -> Result<String> {
        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| GatewayError::Config(format!("invalid completions path: {e}")))?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "system",
                content: Self::build_prompt(name, roster),
            }],
        };

        info!(application_name = %name, model = %self.model, "Finding application id");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Resolution(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Resolution(format!(
                "completion request failed: {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Resolution(format!("malformed completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| GatewayError::Resolution("model returned empty content".into()))?;

        Ok(content)
    }
}
