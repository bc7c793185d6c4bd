use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use atelier_core::{LlmChoice, RuntimeError};
use atelier_llm::{create_provider, ChatMessage};

use crate::node::{error_output, Node, NodeContext, NodeOutputs};

/// Chat completion node.
///
/// Inputs: prompt on the first socket, optional system prompt on the
/// second. Config: `Model`, `Provider`, `API Key` — all falling back to the
/// workspace defaults. Outputs: the response text and the total token count.
pub struct LlmChatNode;

pub(crate) fn resolve_choice(ctx: &NodeContext<'_>) -> (LlmChoice, Option<String>) {
    let choice = LlmChoice {
        provider: ctx
            .param_str("Provider")
            .unwrap_or_else(|| ctx.services.default_llm.provider.clone()),
        model: ctx
            .param_str("Model")
            .unwrap_or_else(|| ctx.services.default_llm.model.clone()),
    };
    let api_key = ctx
        .param_str("API Key")
        .or_else(|| ctx.services.default_api_key.clone());
    (choice, api_key)
}

#[async_trait]
impl Node for LlmChatNode {
    fn node_type(&self) -> &'static str {
        "llm_chat"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let prompt = ctx.input_str(0).unwrap_or_default();
        let system = ctx.input_str(1).unwrap_or_default();

        let (choice, api_key) = resolve_choice(ctx);
        let provider = create_provider(&choice, api_key.as_deref());

        info!("NODE '{}': chat via {}/{}", ctx.spec.title, choice.provider, choice.model);

        match provider
            .call_llm(&system, &[ChatMessage::user(prompt)], &[])
            .await
        {
            Ok(reply) => {
                let tokens = reply.usage.input_tokens + reply.usage.output_tokens;
                Ok(ctx.pair_output(Value::String(reply.content), Value::from(tokens)))
            }
            Err(e) => Ok(error_output(ctx, e)),
        }
    }
}
