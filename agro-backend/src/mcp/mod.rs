//! MCP tool gateway client
//!
//! Remote agricultural data tools (crop prices, mandi prices, web search,
//! soil health, weather, pest identification, scheme lookup) sit behind one
//! HTTP gateway. Tools are invoked as `POST {base}/tools/{name}` and reply
//! in a few envelope shapes that get normalized here:
//! - `{"success": true, "data": ...}` -> data
//! - `{"success": false, "error": ...}` or `{"error": ...}` -> error
//! - `{"results": [...]}` -> results
//! - anything else is passed through as data
//!
//! Only transport-level failures surface as `Err`; a remote business error
//! is a normal payload with `error` set.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Normalized gateway response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayPayload {
    pub fn data(value: Value) -> Self {
        GatewayPayload {
            data: Some(value),
            results: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        GatewayPayload {
            data: None,
            results: None,
            error: Some(message.into()),
        }
    }

    /// Normalize a raw gateway response body.
    pub fn from_response(value: Value) -> Self {
        let Some(obj) = value.as_object() else {
            return GatewayPayload::data(value);
        };

        if obj.get("success").and_then(Value::as_bool) == Some(true) {
            if let Some(data) = obj.get("data") {
                return GatewayPayload::data(data.clone());
            }
        }

        if let Some(err) = obj.get("error") {
            let message = err
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return GatewayPayload::error(message);
        }

        if let Some(data) = obj.get("data") {
            return GatewayPayload::data(data.clone());
        }

        if let Some(results) = obj.get("results") {
            return GatewayPayload {
                data: None,
                results: Some(results.clone()),
                error: None,
            };
        }

        GatewayPayload::data(value)
    }

    /// Collapse into a single JSON value for prompt context.
    pub fn into_value(self) -> Value {
        if let Some(data) = self.data {
            data
        } else if let Some(results) = self.results {
            json!({ "results": results })
        } else if let Some(error) = self.error {
            json!({ "error": error })
        } else {
            Value::Null
        }
    }
}

/// Tool gateway seam. Production uses [`McpClient`]; tests inject mocks.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Invoke a remote tool. `Err` is reserved for transport-level failure;
    /// the caller converts it into a per-tool error outcome.
    async fn call(&self, tool: &str, params: Value) -> Result<GatewayPayload, String>;

    /// Check gateway reachability.
    async fn health(&self) -> bool;
}

/// HTTP client for the MCP tool gateway.
pub struct McpClient {
    client: Client,
    base_url: String,
}

impl McpClient {
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self, String> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        if let Some(token) = auth_token {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| format!("Invalid gateway token format: {}", e))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tool_url(&self, tool: &str) -> String {
        format!("{}/tools/{}", self.base_url, tool)
    }
}

#[async_trait]
impl ToolGateway for McpClient {
    async fn call(&self, tool: &str, params: Value) -> Result<GatewayPayload, String> {
        log::debug!("[MCP] Calling tool {}", tool);

        let response = self
            .client
            .post(self.tool_url(tool))
            .json(&params)
            .send()
            .await
            .map_err(|e| format!("MCP gateway request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[MCP] Tool {} returned status {}: {}", tool, status, body);
            return Ok(GatewayPayload::error(format!(
                "Tool call failed with status {}",
                status
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse MCP gateway response: {}", e))?;

        Ok(GatewayPayload::from_response(value))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("[MCP] Health check failed: {}", e);
                false
            }
        }
    }
}
