//! The MCP client: one connection to one server, over either transport.

use serde_json::{json, Value};
use tracing::info;

use atelier_core::{McpTransportConfig, RuntimeError};

use crate::http::HttpTransport;
use crate::protocol::{
    McpPrompt, McpResource, McpToolDefinition, McpToolResult, PromptsListResult,
    ResourcesListResult, RpcRequest, ToolsListResult, PROTOCOL_VERSION,
};
use crate::stdio::StdioTransport;

enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

/// A connected MCP server.
pub struct McpClient {
    server_name: String,
    transport: Transport,
    next_id: u64,
}

impl McpClient {
    /// Connects and runs the `initialize` handshake.
    pub async fn connect(
        server_name: &str,
        config: &McpTransportConfig,
    ) -> Result<Self, RuntimeError> {
        let transport = match config {
            McpTransportConfig::Stdio { command, args } => {
                Transport::Stdio(StdioTransport::spawn(command, args).await?)
            }
            McpTransportConfig::Http { url } => Transport::Http(HttpTransport::new(url)?),
        };

        let mut client = Self {
            server_name: server_name.to_string(),
            transport,
            next_id: 0,
        };

        client
            .call(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "atelier", "version": env!("CARGO_PKG_VERSION") }
                })),
            )
            .await
            .map_err(|e| RuntimeError::McpConnectFailed(e.to_string()))?;
        client.notify("notifications/initialized", None).await?;

        info!("MCP: connected to '{}'", server_name);
        Ok(client)
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RuntimeError> {
        self.next_id += 1;
        let request = RpcRequest::new(self.next_id, method, params);
        match &mut self.transport {
            Transport::Stdio(t) => t.request(&request).await,
            Transport::Http(t) => t.request(&request).await,
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), RuntimeError> {
        match &mut self.transport {
            Transport::Stdio(t) => t.notify(method, params).await,
            Transport::Http(t) => t.notify(method, params).await,
        }
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpToolDefinition>, RuntimeError> {
        let result = self.call("tools/list", None).await?;
        let parsed: ToolsListResult =
            serde_json::from_value(result).map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        Ok(parsed.tools)
    }

    pub async fn call_tool(&mut self, name: &str, args: Value) -> Result<McpToolResult, RuntimeError> {
        let result = self
            .call("tools/call", Some(json!({ "name": name, "arguments": args })))
            .await?;
        serde_json::from_value(result).map_err(|e| RuntimeError::McpCallFailed(e.to_string()))
    }

    pub async fn list_prompts(&mut self) -> Result<Vec<McpPrompt>, RuntimeError> {
        let result = self.call("prompts/list", None).await?;
        let parsed: PromptsListResult =
            serde_json::from_value(result).map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        Ok(parsed.prompts)
    }

    /// Fetches a prompt body; message text items are joined in order.
    pub async fn get_prompt(&mut self, name: &str, args: Value) -> Result<String, RuntimeError> {
        let result = self
            .call("prompts/get", Some(json!({ "name": name, "arguments": args })))
            .await?;

        let messages = result
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let text = messages
            .iter()
            .filter_map(|m| m.pointer("/content/text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }

    pub async fn list_resources(&mut self) -> Result<Vec<McpResource>, RuntimeError> {
        let result = self.call("resources/list", None).await?;
        let parsed: ResourcesListResult =
            serde_json::from_value(result).map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        Ok(parsed.resources)
    }

    /// Releases the connection. Stdio servers are killed; HTTP sessions drop.
    pub async fn close(self) {
        if let Transport::Stdio(t) = self.transport {
            t.close().await;
        }
        info!("MCP: released '{}'", self.server_name);
    }
}
