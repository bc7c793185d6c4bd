//! Anthropic Claude API provider.
//!
//! Claude has no "tool" message role; tool exchanges are encoded as
//! `tool_use` blocks on assistant turns and `tool_result` blocks on the
//! following user turn, keyed by the call id.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use atelier_core::RuntimeError;

use crate::provider::{ChatMessage, LlmProvider, LlmReply, LlmUsage, ToolCall, ToolSchema};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

/// Content block in a request or response message.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// Client for Anthropic's messages API.
pub struct AnthropicProvider {
    client: Client,
    model: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Creates a provider; falls back to `ANTHROPIC_API_KEY` when no
    /// credential is supplied.
    pub fn new(model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .unwrap_or_default();

        Self {
            client: Client::new(),
            model: model.to_string(),
            api_key,
        }
    }

    /// Encodes the neutral turns into Anthropic's alternating shape.
    ///
    /// Consecutive tool results are batched into one user turn, matching
    /// the API's requirement that every `tool_use` id is answered in the
    /// immediately following message.
    fn encode_messages(messages: &[ChatMessage]) -> Vec<AnthropicMessage> {
        let mut encoded: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg {
                ChatMessage::User { content } => encoded.push(AnthropicMessage {
                    role: "user",
                    content: vec![ContentBlock::Text { text: content.clone() }],
                }),
                ChatMessage::Assistant { content, tool_calls } => {
                    let mut blocks = Vec::new();
                    if !content.is_empty() {
                        blocks.push(ContentBlock::Text { text: content.clone() });
                    }
                    for call in tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        });
                    }
                    encoded.push(AnthropicMessage { role: "assistant", content: blocks });
                }
                ChatMessage::ToolResult { call_id, content } => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: call_id.clone(),
                        content: content.clone(),
                    };
                    match encoded.last_mut() {
                        Some(last) if last.role == "user"
                            && matches!(last.content.first(), Some(ContentBlock::ToolResult { .. })) =>
                        {
                            last.content.push(block);
                        }
                        _ => encoded.push(AnthropicMessage {
                            role: "user",
                            content: vec![block],
                        }),
                    }
                }
            }
        }

        encoded
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, RuntimeError> {
        let reply = self
            .call_llm(system, &[ChatMessage::user(prompt)], &[])
            .await?;
        Ok(reply.content)
    }

    async fn call_llm(
        &self,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<LlmReply, RuntimeError> {
        let start = Instant::now();

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: system.to_string(),
            messages: Self::encode_messages(messages),
            tools: tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RuntimeError::ProviderHttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::ProviderHttpError(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        let resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::ProviderHttpError(e.to_string()))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in resp.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall { id, name, arguments: input });
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }

        let usage = LlmUsage {
            input_tokens: resp.usage.input_tokens.unwrap_or(0),
            output_tokens: resp.usage.output_tokens.unwrap_or(0),
        };

        info!(
            "LLM: {}ms, tokens: {}/{} (in/out)",
            start.elapsed().as_millis(),
            usage.input_tokens,
            usage.output_tokens
        );

        Ok(LlmReply { content, tool_calls, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_results_batch_into_one_user_turn() {
        let messages = vec![
            ChatMessage::user("look both up"),
            ChatMessage::Assistant {
                content: String::new(),
                tool_calls: vec![
                    ToolCall { id: "c1".into(), name: "a".into(), arguments: json!({}) },
                    ToolCall { id: "c2".into(), name: "b".into(), arguments: json!({}) },
                ],
            },
            ChatMessage::tool_result("c1", "one"),
            ChatMessage::tool_result("c2", "two"),
        ];

        let encoded = AnthropicProvider::encode_messages(&messages);
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded[1].role, "assistant");
        assert_eq!(encoded[2].role, "user");
        assert_eq!(encoded[2].content.len(), 2);
        assert!(matches!(
            encoded[2].content[0],
            ContentBlock::ToolResult { ref tool_use_id, .. } if tool_use_id == "c1"
        ));
    }

    #[test]
    fn assistant_turn_carries_tool_use_blocks() {
        let messages = vec![ChatMessage::Assistant {
            content: "checking".into(),
            tool_calls: vec![ToolCall {
                id: "c9".into(),
                name: "lookup".into(),
                arguments: json!({"q": "rust"}),
            }],
        }];

        let encoded = AnthropicProvider::encode_messages(&messages);
        assert_eq!(encoded[0].content.len(), 2);
        assert!(matches!(
            encoded[0].content[1],
            ContentBlock::ToolUse { ref name, .. } if name == "lookup"
        ));
    }
}
