use async_trait::async_trait;
use serde_json::Value;

use atelier_core::{stringify, RuntimeError};

use crate::node::{Node, NodeContext, NodeOutputs};

const DEFAULT_SEPARATOR: &str = ", ";

/// Joins the values present on its input sockets, in declared socket
/// order, with the configured `Separator`. Absent inputs are skipped.
pub struct JoinNode;

#[async_trait]
impl Node for JoinNode {
    fn node_type(&self) -> &'static str {
        "join"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let separator = ctx
            .param_str("Separator")
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

        let joined = ctx
            .input_values()
            .into_iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(&separator);

        Ok(ctx.single_output(Value::String(joined)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeServices;
    use atelier_core::{LlmChoice, NodeSpec};
    use serde_json::json;
    use std::collections::HashMap;

    fn spec() -> NodeSpec {
        serde_json::from_value(json!({
            "id": 2,
            "nodeType": "join",
            "title": "Join",
            "sockets": [
                { "id": 201, "direction": "input", "dataType": "string" },
                { "id": 202, "direction": "input", "dataType": "string" },
                { "id": 203, "direction": "output", "dataType": "string" }
            ],
            "parameters": [{ "name": "Separator", "type": "string", "defaultValue": "-" }]
        }))
        .unwrap()
    }

    fn services() -> NodeServices {
        NodeServices::new(
            LlmChoice { provider: "openai".into(), model: "gpt-4o".into() },
            None,
        )
    }

    #[tokio::test]
    async fn single_input_passes_through_unseparated() {
        let spec = spec();
        let services = services();
        let ctx = NodeContext {
            spec: &spec,
            inputs: HashMap::from([(201, json!("hi"))]),
            root_input: None,
            services: &services,
        };

        let outputs = JoinNode.process(&ctx).await.unwrap();
        assert_eq!(outputs.get(&203), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn joins_in_declared_socket_order() {
        let spec = spec();
        let services = services();
        let ctx = NodeContext {
            spec: &spec,
            inputs: HashMap::from([(202, json!("b")), (201, json!("a"))]),
            root_input: None,
            services: &services,
        };

        let outputs = JoinNode.process(&ctx).await.unwrap();
        assert_eq!(outputs.get(&203), Some(&json!("a-b")));
    }

    #[tokio::test]
    async fn absent_inputs_are_skipped() {
        let spec = spec();
        let services = services();
        let ctx = NodeContext {
            spec: &spec,
            inputs: HashMap::from([(202, json!(7))]),
            root_input: None,
            services: &services,
        };

        let outputs = JoinNode.process(&ctx).await.unwrap();
        assert_eq!(outputs.get(&203), Some(&json!("7")));
    }
}
