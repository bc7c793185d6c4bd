//! MCP (Model Context Protocol) clients for atelier.
//!
//! Agents and workflow nodes reach external tool servers through this
//! crate:
//!
//! - [`McpClient`] — connect, list/call tools, fetch prompts and resources
//! - Stdio transport — spawn a local server, JSON-RPC over its standard
//!   streams
//! - HTTP transport — streamable HTTP first, SSE session on fallback
//! - [`McpRegistry`] — per-run client registry, released on every exit path
//!
//! Connections are scoped to the runtime that opened them; two runtimes
//! opening the same logical server hold independent clients.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_core::McpTransportConfig;
//! use atelier_mcp::McpClient;
//!
//! let config = McpTransportConfig::Http { url: "https://mcp.example.com/rpc".into() };
//! let mut client = McpClient::connect("search", &config).await?;
//! let tools = client.list_tools().await?;
//! let result = client.call_tool("web_search", serde_json::json!({"q": "rust"})).await?;
//! println!("{}", result.text());
//! client.close().await;
//! ```

mod client;
mod http;
mod protocol;
mod registry;
mod stdio;

pub use client::McpClient;
pub use protocol::{McpContent, McpPrompt, McpResource, McpToolDefinition, McpToolResult};
pub use registry::McpRegistry;
