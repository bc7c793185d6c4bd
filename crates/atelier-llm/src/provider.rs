//! The provider seam shared by all LLM back-ends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use atelier_core::RuntimeError;

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned id; tool results must echo it.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// JSON-schema description of a callable tool, in the OpenAI function
/// calling shape. The Anthropic client re-expresses it as `input_schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Token usage reported by a provider, zero when the vendor omits it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One model turn: text content plus any tool calls the model requested.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: LlmUsage,
}

impl LlmReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A vendor-neutral conversation turn.
///
/// The system prompt travels separately; each client encodes these turns in
/// its vendor's own shape while preserving the call-id ↔ result mapping.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User { content: content.into() }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }
}

/// An LLM back-end.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider key for logging.
    fn name(&self) -> &str;

    /// Whether the vendor supports native tool calls.
    fn supports_tools(&self) -> bool;

    /// Single-prompt generation: one user message in, text out.
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, RuntimeError>;

    /// Full conversation turn with optional tool schemas.
    async fn call_llm(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<LlmReply, RuntimeError>;
}
