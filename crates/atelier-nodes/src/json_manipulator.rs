use async_trait::async_trait;
use serde_json::Value;

use atelier_core::RuntimeError;

use crate::node::{error_output, Node, NodeContext, NodeOutputs};

/// Pure transformation over a JSON blob.
///
/// The `Operation` parameter selects the mode:
///
/// - `extract` — value at the dot-separated `Path` (array indices allowed)
/// - `filter` — array elements whose `Field` equals `Value`
/// - `count` — array length or object key count
/// - `stringify` — pretty-printed rendering
pub struct JsonManipulatorNode;

fn parse_input(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => serde_json::from_str(s).map_err(|e| format!("invalid JSON input: {e}")),
        other => Ok(other.clone()),
    }
}

fn extract<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = format!("/{}", path.split('.').collect::<Vec<_>>().join("/"));
    data.pointer(&pointer)
}

#[async_trait]
impl Node for JsonManipulatorNode {
    fn node_type(&self) -> &'static str {
        "json_manipulator"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let operation = ctx.require_param("Operation")?;

        let Some(raw) = ctx.input(0) else {
            return Ok(error_output(ctx, "no input to manipulate"));
        };
        let data = match parse_input(raw) {
            Ok(data) => data,
            Err(msg) => return Ok(error_output(ctx, msg)),
        };

        let result = match operation.as_str() {
            "extract" => {
                let path = ctx.require_param("Path")?;
                match extract(&data, &path) {
                    Some(value) => value.clone(),
                    None => return Ok(error_output(ctx, format!("path '{path}' not found"))),
                }
            }
            "filter" => {
                let field = ctx.require_param("Field")?;
                let expected = ctx.param_str("Value").unwrap_or_default();
                match data.as_array() {
                    Some(items) => Value::Array(
                        items
                            .iter()
                            .filter(|item| {
                                item.get(field.as_str())
                                    .map(atelier_core::stringify)
                                    .is_some_and(|v| v == expected)
                            })
                            .cloned()
                            .collect(),
                    ),
                    None => return Ok(error_output(ctx, "filter expects an array")),
                }
            }
            "count" => match &data {
                Value::Array(items) => Value::from(items.len()),
                Value::Object(map) => Value::from(map.len()),
                _ => return Ok(error_output(ctx, "count expects an array or object")),
            },
            "stringify" => match serde_json::to_string_pretty(&data) {
                Ok(text) => Value::String(text),
                Err(e) => return Ok(error_output(ctx, e)),
            },
            other => return Ok(error_output(ctx, format!("unknown operation '{other}'"))),
        };

        Ok(ctx.single_output(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeServices;
    use atelier_core::{LlmChoice, NodeSpec};
    use serde_json::json;
    use std::collections::HashMap;

    fn spec(params: Value) -> NodeSpec {
        serde_json::from_value(json!({
            "id": 4,
            "nodeType": "json_manipulator",
            "title": "Manipulate",
            "sockets": [
                { "id": 401, "direction": "input", "dataType": "json" },
                { "id": 402, "direction": "output", "dataType": "json" }
            ],
            "parameters": params
        }))
        .unwrap()
    }

    fn services() -> NodeServices {
        NodeServices::new(
            LlmChoice { provider: "openai".into(), model: "gpt-4o".into() },
            None,
        )
    }

    async fn run(params: Value, input: Value) -> Value {
        let spec = spec(params);
        let services = services();
        let ctx = NodeContext {
            spec: &spec,
            inputs: HashMap::from([(401, input)]),
            root_input: None,
            services: &services,
        };
        JsonManipulatorNode
            .process(&ctx)
            .await
            .unwrap()
            .remove(&402)
            .unwrap()
    }

    #[tokio::test]
    async fn extract_follows_dot_paths() {
        let out = run(
            json!([{ "name": "Operation", "paramValue": "extract" },
                   { "name": "Path", "paramValue": "items.1.name" }]),
            json!({ "items": [{ "name": "a" }, { "name": "b" }] }),
        )
        .await;
        assert_eq!(out, json!("b"));
    }

    #[tokio::test]
    async fn filter_matches_stringified_field() {
        let out = run(
            json!([{ "name": "Operation", "paramValue": "filter" },
                   { "name": "Field", "paramValue": "kind" },
                   { "name": "Value", "paramValue": "x" }]),
            json!([{ "kind": "x", "n": 1 }, { "kind": "y", "n": 2 }]),
        )
        .await;
        assert_eq!(out, json!([{ "kind": "x", "n": 1 }]));
    }

    #[tokio::test]
    async fn count_handles_arrays_and_objects() {
        let arr = run(
            json!([{ "name": "Operation", "paramValue": "count" }]),
            json!([1, 2, 3]),
        )
        .await;
        assert_eq!(arr, json!(3));

        let obj = run(
            json!([{ "name": "Operation", "paramValue": "count" }]),
            json!({ "a": 1, "b": 2 }),
        )
        .await;
        assert_eq!(obj, json!(2));
    }

    #[tokio::test]
    async fn string_input_is_parsed_first() {
        let out = run(
            json!([{ "name": "Operation", "paramValue": "extract" },
                   { "name": "Path", "paramValue": "a" }]),
            json!(r#"{"a": 42}"#),
        )
        .await;
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn bad_path_surfaces_error_string() {
        let out = run(
            json!([{ "name": "Operation", "paramValue": "extract" },
                   { "name": "Path", "paramValue": "missing" }]),
            json!({ "a": 1 }),
        )
        .await;
        assert!(out.as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn missing_operation_is_infrastructural() {
        let spec = spec(json!([]));
        let services = services();
        let ctx = NodeContext {
            spec: &spec,
            inputs: HashMap::from([(401, json!({}))]),
            root_input: None,
            services: &services,
        };
        let err = JsonManipulatorNode.process(&ctx).await.unwrap_err();
        assert!(matches!(err, RuntimeError::NodeExecutionFailed(_)));
    }
}
