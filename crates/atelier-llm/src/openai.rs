//! OpenAI-compatible chat provider.
//!
//! Works with the OpenAI API and any compatible endpoint, including
//! Ollama's `/v1` surface via the `api_base` override.

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        FunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use tracing::info;

use atelier_core::RuntimeError;

use crate::provider::{ChatMessage, LlmProvider, LlmReply, LlmUsage, ToolCall, ToolSchema};

fn llm_err(e: impl ToString) -> RuntimeError {
    RuntimeError::ProviderHttpError(e.to_string())
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    /// Creates a provider for the given model.
    ///
    /// `api_base` points the client at a compatible endpoint (Ollama); a
    /// dummy key is used there when no credential is supplied, since local
    /// endpoints ignore it.
    pub fn new(model: &str, api_base: Option<&str>, api_key: Option<&str>) -> Self {
        let mut config = OpenAIConfig::default();
        if let Some(base) = api_base {
            config = config.with_api_base(base).with_api_key("ollama");
        }
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    fn encode_messages(
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, RuntimeError> {
        let mut encoded = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(llm_err)?,
        )];

        for msg in messages {
            let turn = match msg {
                ChatMessage::User { content } => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(content.as_str())
                        .build()
                        .map_err(llm_err)?,
                ),
                ChatMessage::Assistant { content, tool_calls } => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    builder.content(content.as_str());
                    if !tool_calls.is_empty() {
                        let calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                            .iter()
                            .map(|c| ChatCompletionMessageToolCall {
                                id: c.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: c.name.clone(),
                                    arguments: c.arguments.to_string(),
                                },
                            })
                            .collect();
                        builder.tool_calls(calls);
                    }
                    ChatCompletionRequestMessage::Assistant(builder.build().map_err(llm_err)?)
                }
                ChatMessage::ToolResult { call_id, content } => {
                    ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(call_id.as_str())
                            .content(content.as_str())
                            .build()
                            .map_err(llm_err)?,
                    )
                }
            };
            encoded.push(turn);
        }

        Ok(encoded)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let encoded = Self::encode_messages(system, messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(encoded);

        if !tools.is_empty() {
            let openai_tools: Vec<ChatCompletionTool> = tools
                .iter()
                .map(|t| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(t.parameters.clone()),
                        strict: None,
                    },
                })
                .collect();
            builder.tools(openai_tools);
        }

        let request = builder.build().map_err(llm_err)?;
        let response = self.client.chat().create(request).await.map_err(llm_err)?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| LlmUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| llm_err("No response choices"))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();

        info!(
            "LLM: {}ms, tokens: {}/{} (in/out)",
            start.elapsed().as_millis(),
            usage.input_tokens,
            usage.output_tokens
        );

        Ok(LlmReply { content, tool_calls, usage })
    }
}
