use async_trait::async_trait;
use serde_json::Value;

use atelier_core::RuntimeError;

use crate::node::{Node, NodeContext, NodeOutputs, WORKFLOW_INPUT_TYPE};

/// Injection point for the run's root input. The runtime hands the root
/// input only to this node; it simply republishes it on its output.
pub struct WorkflowInputNode;

#[async_trait]
impl Node for WorkflowInputNode {
    fn node_type(&self) -> &'static str {
        WORKFLOW_INPUT_TYPE
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let input = ctx
            .root_input
            .map(String::from)
            .or_else(|| ctx.input_str(0))
            .unwrap_or_default();
        Ok(ctx.single_output(Value::String(input)))
    }
}
