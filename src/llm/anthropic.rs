//! Anthropic Messages API client

use super::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::cli::config::AnthropicConfig;
use crate::errors::{AgentError, Result};
use crate::types::ContentBlock;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2023-06-01";

/// Client for `POST {base_url}/v1/messages`
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: String, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(AgentError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build from configuration; fails when no API key is available
    pub fn from_config(config: &AnthropicConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AgentError::ConfigError(
                    "no Anthropic API key (set ANTHROPIC_API_KEY or [anthropic].api_key)".to_string(),
                )
            })?;

        Self::new(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_sec),
        )
    }

    /// JSON body for the Messages API
    pub fn build_request_body(request: &CompletionRequest) -> Result<Value> {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system_prompt,
            "messages": serde_json::to_value(&request.messages)?,
        });

        if let (Some(tools), Some(obj)) = (&request.tools, body.as_object_mut()) {
            obj.insert("tools".to_string(), serde_json::to_value(tools)?);
        }

        Ok(body)
    }

    /// Parse a Messages API response body
    pub fn parse_response(body: Value) -> Result<CompletionResponse> {
        let stop_reason = body
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let content = body
            .get("content")
            .cloned()
            .ok_or_else(|| AgentError::UpstreamModel("missing content array in response".to_string()))?;

        let content: Vec<ContentBlock> = serde_json::from_value(content)
            .map_err(|e| AgentError::UpstreamModel(format!("malformed content in response: {}", e)))?;

        Ok(CompletionResponse {
            content,
            stop_reason,
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = Self::build_request_body(request)?;
        let url = format!("{}/v1/messages", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "calling completion API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::UpstreamModel(format!("request timed out: {}", e))
                } else {
                    AgentError::UpstreamModel(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamModel(format!("API error ({}): {}", status, text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::UpstreamModel(format!("unreadable response body: {}", e)))?;

        Self::parse_response(body)
    }
}
