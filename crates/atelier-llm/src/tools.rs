//! Tool executors and the bounded tool-call loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{info, warn};

use atelier_core::RuntimeError;

use crate::provider::{ChatMessage, LlmProvider, ToolSchema};

/// Iteration cap for the tool-call loop. A model can request tools
/// indefinitely; this bound is load-bearing.
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// Per-call execution budget.
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one tool call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: Value) -> Result<String, RuntimeError>;
}

/// The tools registered for one generation: schemas the model sees plus the
/// executors that back them. Owned per loop invocation, not by the provider.
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<String, (ToolSchema, Arc<dyn ToolExecutor>)>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an executor under its schema name, replacing any previous
    /// tool of the same name.
    pub fn register(&mut self, schema: ToolSchema, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(schema.name.clone(), (schema, executor));
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|(schema, _)| schema.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn ToolExecutor>> {
        self.tools.get(name).map(|(_, executor)| executor)
    }
}

/// Generates text with tool-augmented reasoning.
///
/// Providers without native tool support (or an empty tool set) degrade to
/// plain generation. Otherwise the loop feeds tool results back to the
/// model until it answers in text or the iteration cap trips. Executor
/// failures and timeouts become JSON error results on the conversation —
/// they never abort the loop.
pub async fn generate_with_tools(
    provider: &dyn LlmProvider,
    system: &str,
    prompt: &str,
    tools: &ToolSet,
) -> Result<String, RuntimeError> {
    if tools.is_empty() || !provider.supports_tools() {
        return provider.generate_text(system, prompt).await;
    }

    let schemas = tools.schemas();
    let mut messages = vec![ChatMessage::user(prompt)];
    let mut iterations = 0usize;

    loop {
        let reply = provider.call_llm(system, &messages, &schemas).await?;

        if !reply.has_tool_calls() {
            info!("TOOLS: final answer after {} tool iterations", iterations);
            return Ok(reply.content);
        }

        let calls = reply.tool_calls.clone();
        info!(
            "TOOLS: model requested {:?}",
            calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        messages.push(ChatMessage::Assistant {
            content: reply.content,
            tool_calls: calls.clone(),
        });

        for call in &calls {
            let result = match tools.get(&call.name) {
                None => {
                    warn!("TOOLS: no executor for '{}'", call.name);
                    json!({ "error": format!("Tool {} not found", call.name) })
                }
                Some(executor) => {
                    match timeout(TOOL_CALL_TIMEOUT, executor.execute(call.arguments.clone())).await
                    {
                        Err(_) => {
                            warn!("TOOLS: '{}' timed out", call.name);
                            json!({ "error": "Tool execution timeout" })
                        }
                        Ok(Err(e)) => json!({ "error": e.to_string() }),
                        Ok(Ok(output)) => json!({ "result": output }),
                    }
                }
            };
            messages.push(ChatMessage::tool_result(&call.id, result.to_string()));
        }

        iterations += 1;
        if iterations >= MAX_TOOL_ITERATIONS {
            return Err(RuntimeError::MaxToolIterationsExceeded(MAX_TOOL_ITERATIONS));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LlmReply, LlmUsage, ToolCall};
    use std::sync::Mutex;

    /// Provider scripted with a fixed sequence of replies; records every
    /// message list it was called with.
    struct ScriptedProvider {
        replies: Mutex<Vec<LlmReply>>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<LlmReply>) -> Self {
            let mut reversed = replies;
            reversed.reverse();
            Self {
                replies: Mutex::new(reversed),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn tool_results_seen(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .filter(|m| m.starts_with("tool:"))
                .cloned()
                .collect()
        }
    }

    fn text_reply(content: &str) -> LlmReply {
        LlmReply {
            content: content.to_string(),
            tool_calls: Vec::new(),
            usage: LlmUsage::default(),
        }
    }

    fn tool_reply(name: &str, id: &str) -> LlmReply {
        LlmReply {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: json!({}),
            }],
            usage: LlmUsage::default(),
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn supports_tools(&self) -> bool {
            true
        }

        async fn generate_text(&self, _system: &str, _prompt: &str) -> Result<String, RuntimeError> {
            Ok(self.replies.lock().unwrap().pop().expect("script exhausted").content)
        }

        async fn call_llm(
            &self,
            _system: &str,
            messages: &[ChatMessage],
            _tools: &[ToolSchema],
        ) -> Result<LlmReply, RuntimeError> {
            let rendered = messages
                .iter()
                .map(|m| match m {
                    ChatMessage::User { content } => format!("user:{content}"),
                    ChatMessage::Assistant { content, .. } => format!("assistant:{content}"),
                    ChatMessage::ToolResult { content, .. } => format!("tool:{content}"),
                })
                .collect();
            self.seen.lock().unwrap().push(rendered);
            Ok(self.replies.lock().unwrap().pop().expect("script exhausted"))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        async fn execute(&self, args: Value) -> Result<String, RuntimeError> {
            Ok(format!("echo {args}"))
        }
    }

    struct SleepyTool;

    #[async_trait]
    impl ToolExecutor for SleepyTool {
        async fn execute(&self, _args: Value) -> Result<String, RuntimeError> {
            tokio::time::sleep(Duration::from_secs(40)).await;
            Ok("too late".into())
        }
    }

    fn schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            description: format!("{name} tool"),
            parameters: json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn plain_answer_needs_one_call() {
        let provider = ScriptedProvider::new(vec![text_reply("done")]);
        let mut tools = ToolSet::new();
        tools.register(schema("echo"), Arc::new(EchoTool));

        let out = generate_with_tools(&provider, "sys", "go", &tools).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tool_result_feeds_next_turn() {
        let provider =
            ScriptedProvider::new(vec![tool_reply("echo", "c1"), text_reply("final")]);
        let mut tools = ToolSet::new();
        tools.register(schema("echo"), Arc::new(EchoTool));

        let out = generate_with_tools(&provider, "sys", "go", &tools).await.unwrap();
        assert_eq!(out, "final");

        let results = provider.tool_results_seen();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("\"result\""));
    }

    #[tokio::test]
    async fn missing_executor_becomes_error_result() {
        let provider =
            ScriptedProvider::new(vec![tool_reply("nonexistent", "c1"), text_reply("ok")]);
        let mut tools = ToolSet::new();
        tools.register(schema("echo"), Arc::new(EchoTool));

        let out = generate_with_tools(&provider, "sys", "go", &tools).await.unwrap();
        assert_eq!(out, "ok");

        let results = provider.tool_results_seen();
        assert!(results[0].contains("Tool nonexistent not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out_without_aborting_the_loop() {
        let provider =
            ScriptedProvider::new(vec![tool_reply("sleepy", "c1"), text_reply("moved on")]);
        let mut tools = ToolSet::new();
        tools.register(schema("sleepy"), Arc::new(SleepyTool));

        let out = generate_with_tools(&provider, "sys", "go", &tools).await.unwrap();
        assert_eq!(out, "moved on");

        let results = provider.tool_results_seen();
        assert!(results[0].contains("Tool execution timeout"));
    }

    #[tokio::test]
    async fn endless_tool_requests_hit_the_cap() {
        let replies = (0..MAX_TOOL_ITERATIONS)
            .map(|i| tool_reply("echo", &format!("c{i}")))
            .collect();
        let provider = ScriptedProvider::new(replies);
        let mut tools = ToolSet::new();
        tools.register(schema("echo"), Arc::new(EchoTool));

        let err = generate_with_tools(&provider, "sys", "go", &tools)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::MaxToolIterationsExceeded(10)));
    }

    #[tokio::test]
    async fn empty_tool_set_degrades_to_plain_generation() {
        let provider = ScriptedProvider::new(vec![text_reply("plain")]);
        let out = generate_with_tools(&provider, "sys", "go", &ToolSet::new())
            .await
            .unwrap();
        assert_eq!(out, "plain");
        // generate_text path: call_llm never invoked
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
