//! HTTP MCP transport
//!
//! Opens bindings against MCP-over-HTTP endpoints: `tools/list` on open,
//! `tools/call` per invocation. Connections are pooled by the shared
//! reqwest client, so closing a binding releases no socket of its own.

use crate::agent::{AgentTool, ToolInvokeFn};
use crate::error::{Result, RouterError};
use crate::registry::TransportSpec;
use crate::transport::{ServerBinding, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: String,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

/// Tool descriptor as returned by `tools/list`
#[derive(Debug, Clone, Deserialize)]
struct RemoteTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "inputSchema")]
    input_schema: Option<Value>,
}

/// Transport for MCP-over-HTTP endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, handle: &str, spec: &TransportSpec) -> Result<Box<dyn ServerBinding>> {
        let url = match spec {
            TransportSpec::Http { url } => Url::parse(url)
                .map_err(|e| {
                    RouterError::transport_open(
                        handle.to_string(),
                        format!("invalid base URL '{}': {}", url, e),
                    )
                })?
                .to_string(),
            TransportSpec::Sse { .. } => {
                return Err(RouterError::transport_open(
                    handle.to_string(),
                    "SSE transport requires an external connector".to_string(),
                ));
            }
            TransportSpec::Stdio { .. } => {
                return Err(RouterError::transport_open(
                    handle.to_string(),
                    "stdio transport requires an external connector".to_string(),
                ));
            }
        };

        let tools = list_tools(&self.client, handle, &url).await?;
        info!(
            "Opened HTTP binding for '{}' with {} tool(s)",
            handle,
            tools.len()
        );

        Ok(Box::new(HttpBinding {
            handle: handle.to_string(),
            url,
            client: self.client.clone(),
            remote_tools: tools,
        }))
    }
}

/// Live HTTP binding for one server
#[derive(Debug)]
struct HttpBinding {
    handle: String,
    url: String,
    client: reqwest::Client,
    remote_tools: Vec<RemoteTool>,
}

#[async_trait]
impl ServerBinding for HttpBinding {
    fn tools(&self) -> Vec<AgentTool> {
        self.remote_tools
            .iter()
            .map(|tool| {
                let client = self.client.clone();
                let url = self.url.clone();
                let name = tool.name.clone();
                let invoke: ToolInvokeFn = Arc::new(move |args: Value| {
                    let client = client.clone();
                    let url = url.clone();
                    let name = name.clone();
                    Box::pin(async move { call_tool(&client, &url, &name, args).await })
                });

                AgentTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    schema: tool
                        .input_schema
                        .clone()
                        .unwrap_or_else(|| json!({"type": "object"})),
                    handle: Some(self.handle.clone()),
                    invoke,
                }
            })
            .collect()
    }

    async fn close(&self) {
        debug!("Closed HTTP binding for '{}'", self.handle);
    }
}

/// Fetch the tool list from an MCP endpoint
async fn list_tools(client: &reqwest::Client, handle: &str, url: &str) -> Result<Vec<RemoteTool>> {
    let response = send_request(client, url, "tools/list", None)
        .await
        .map_err(|e| RouterError::transport_open(handle.to_string(), e.to_string()))?;

    let tools_value = response
        .get("tools")
        .cloned()
        .ok_or_else(|| {
            RouterError::transport_open(
                handle.to_string(),
                "missing 'tools' field in tools/list response".to_string(),
            )
        })?;

    serde_json::from_value(tools_value).map_err(|e| {
        RouterError::transport_open(handle.to_string(), format!("invalid tools format: {}", e))
    })
}

/// Invoke a tool over an MCP endpoint
async fn call_tool(client: &reqwest::Client, url: &str, name: &str, args: Value) -> Result<Value> {
    send_request(
        client,
        url,
        "tools/call",
        Some(json!({"name": name, "arguments": args})),
    )
    .await
    .map_err(|e| RouterError::tool_invocation(name.to_string(), e.to_string()))
}

/// Send a single JSON-RPC request and unwrap the result
async fn send_request(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Option<Value>,
) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        id: Uuid::new_v4().to_string(),
        method: method.to_string(),
        params,
    };

    debug!("Sending MCP request to {}: method={}", url, method);

    let response = client.post(url).json(&request).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(RouterError::registry(format!(
            "HTTP {} from MCP endpoint: {}",
            status, error_text
        )));
    }

    let rpc: JsonRpcResponse = response.json().await?;
    if let Some(error) = rpc.error {
        return Err(RouterError::registry(format!(
            "MCP error from endpoint: {}",
            error.message
        )));
    }

    rpc.result
        .ok_or_else(|| RouterError::registry("empty result in MCP response"))
}
