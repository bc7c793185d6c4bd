//! MCP nodes: discovery, tool call, and prompt retrieval.
//!
//! Each node opens its own transport, uses it, and closes it — connections
//! never outlive a single `process` call.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use atelier_core::{McpTransportConfig, RuntimeError};
use atelier_mcp::McpClient;

use crate::node::{error_output, Node, NodeContext, NodeOutputs};

/// Reads the transport configuration off the node's parameters: either
/// `Command` (+ space-separated `Args`) for stdio, or `URL` for HTTP.
fn transport_config(ctx: &NodeContext<'_>) -> Result<McpTransportConfig, RuntimeError> {
    if let Some(command) = ctx.param_str("Command").filter(|c| !c.is_empty()) {
        let args = ctx
            .param_str("Args")
            .map(|a| a.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        return Ok(McpTransportConfig::Stdio { command, args });
    }
    if let Some(url) = ctx.param_str("URL").filter(|u| !u.is_empty()) {
        return Ok(McpTransportConfig::Http { url });
    }
    Err(RuntimeError::NodeExecutionFailed(format!(
        "node '{}' has neither Command nor URL configured",
        ctx.spec.title
    )))
}

fn server_name(ctx: &NodeContext<'_>) -> String {
    ctx.param_str("Server Name")
        .unwrap_or_else(|| ctx.spec.title.clone())
}

/// Lists the server's tools, prompts, and resources as one JSON object.
pub struct McpDiscoveryNode;

#[async_trait]
impl Node for McpDiscoveryNode {
    fn node_type(&self) -> &'static str {
        "mcp_discovery"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let config = transport_config(ctx)?;
        let name = server_name(ctx);

        let mut client = match McpClient::connect(&name, &config).await {
            Ok(client) => client,
            Err(e) => return Ok(error_output(ctx, e)),
        };

        // Servers may not implement every listing; absent ones are empty.
        let tools = client.list_tools().await.unwrap_or_default();
        let prompts = client.list_prompts().await.unwrap_or_default();
        let resources = client.list_resources().await.unwrap_or_default();
        client.close().await;

        info!(
            "NODE '{}': discovered {} tools, {} prompts, {} resources",
            ctx.spec.title,
            tools.len(),
            prompts.len(),
            resources.len()
        );

        let listing = json!({
            "tools": tools,
            "prompts": prompts,
            "resources": resources,
        });
        Ok(ctx.single_output(listing))
    }
}

/// Invokes the tool named by `Tool Name` with the JSON object on the first
/// input socket.
pub struct McpToolCallNode;

#[async_trait]
impl Node for McpToolCallNode {
    fn node_type(&self) -> &'static str {
        "mcp_tool_call"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let config = transport_config(ctx)?;
        let tool_name = ctx.require_param("Tool Name")?;
        let name = server_name(ctx);

        let args = match ctx.input(0) {
            None => json!({}),
            Some(Value::String(raw)) => match serde_json::from_str(raw) {
                Ok(parsed) => parsed,
                Err(e) => return Ok(error_output(ctx, format!("arguments are not JSON: {e}"))),
            },
            Some(other) => other.clone(),
        };

        let mut client = match McpClient::connect(&name, &config).await {
            Ok(client) => client,
            Err(e) => return Ok(error_output(ctx, e)),
        };
        let result = client.call_tool(&tool_name, args).await;
        client.close().await;

        match result {
            Ok(result) if result.is_error => Ok(error_output(ctx, result.text())),
            Ok(result) => Ok(ctx.single_output(Value::String(result.text()))),
            Err(e) => Ok(error_output(ctx, e)),
        }
    }
}

/// Retrieves the prompt named by `Prompt Name`, with optional JSON
/// arguments on the first input socket.
pub struct McpGetPromptNode;

#[async_trait]
impl Node for McpGetPromptNode {
    fn node_type(&self) -> &'static str {
        "mcp_get_prompt"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let config = transport_config(ctx)?;
        let prompt_name = ctx.require_param("Prompt Name")?;
        let name = server_name(ctx);

        let args = match ctx.input(0) {
            None => json!({}),
            Some(Value::String(raw)) if raw.trim_start().starts_with('{') => {
                serde_json::from_str(raw).unwrap_or_else(|_| json!({}))
            }
            Some(other) => other.clone(),
        };

        let mut client = match McpClient::connect(&name, &config).await {
            Ok(client) => client,
            Err(e) => return Ok(error_output(ctx, e)),
        };
        let result = client.get_prompt(&prompt_name, args).await;
        client.close().await;

        match result {
            Ok(body) => Ok(ctx.single_output(Value::String(body))),
            Err(e) => Ok(error_output(ctx, e)),
        }
    }
}
