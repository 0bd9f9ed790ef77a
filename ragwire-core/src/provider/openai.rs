//! OpenAI-compatible chat completions provider.
//!
//! Talks to any endpoint that accepts `POST {base_url}/chat/completions` with
//! the OpenAI request shape. The default configuration points at Bedrock's
//! OpenAI-compatible runtime endpoint.

use super::types::*;
use crate::config::Config;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    /// Builds the provider from `llm.base_url` and the resolved bearer token.
    pub fn from_config(config: &Config) -> Self {
        let api_key = config.llm_api_key();
        if api_key.is_none() {
            warn!(env = %config.llm.api_key_env, "No inference API key set, sending unauthenticated requests");
        }
        Self::new(&config.llm.base_url, api_key)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            tool_count = request.tools.as_ref().map_or(0, Vec::len),
            "Sending chat completion request"
        );

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        Ok(parse_chat_outcome(body))
    }
}

/// Extracts the first choice's message, or reports which keys were present.
pub(crate) fn parse_chat_outcome(body: Value) -> ChatOutcome {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| serde_json::from_value::<Message>(message.clone()).ok());

    match message {
        Some(message) => ChatOutcome::Reply(message),
        None => {
            let available_keys = body
                .as_object()
                .map(|object| object.keys().cloned().collect())
                .unwrap_or_default();
            ChatOutcome::NoResponse { available_keys }
        }
    }
}
