use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use atelier_core::{EventKind, MemorySink, RuntimeError, Workspace};
use atelier_llm::{ChatMessage, LlmProvider, LlmReply, LlmUsage, ToolSchema};
use atelier_nodes::NodeRegistry;

use crate::{Dispatcher, ExecutorChoice, InProcessWorkflows, WorkspaceRunner};

struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Arc<Self> {
        let mut reversed = replies;
        reversed.reverse();
        Arc::new(Self {
            replies: Mutex::new(reversed),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
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

    async fn generate_text(&self, _system: &str, prompt: &str) -> Result<String, RuntimeError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.replies.lock().unwrap().pop().expect("script exhausted"))
    }

    async fn call_llm(
        &self,
        system: &str,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> Result<LlmReply, RuntimeError> {
        let prompt = messages
            .iter()
            .find_map(|m| match m {
                ChatMessage::User { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let content = self.generate_text(system, &prompt).await?;
        Ok(LlmReply {
            content,
            tool_calls: Vec::new(),
            usage: LlmUsage::default(),
        })
    }
}

fn complete_review() -> String {
    json!({ "status": "complete", "overall_score": 90 }).to_string()
}

fn runner_with(provider: Arc<ScriptedProvider>, dir: &std::path::Path) -> WorkspaceRunner {
    WorkspaceRunner::new(Arc::new(NodeRegistry::with_defaults()))
        .with_providers(Box::new(move |_, _| {
            provider.clone() as Arc<dyn LlmProvider>
        }))
        .with_output_dir(dir)
}

fn diamond_workspace() -> Workspace {
    serde_json::from_value(json!({
        "id": "ws-1",
        "name": "Research",
        "mainLLM": { "provider": "openai", "model": "gpt-4o" },
        "agents": [{
            "id": "a1", "name": "Scribe", "role": "a writer",
            "objective": "write things", "tools": []
        }],
        "tasks": [
            {
                "id": "t1", "title": "T1", "description": "do one", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [{ "id": 11, "direction": "output" }]
            },
            {
                "id": "t2", "title": "T2", "description": "do two", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [
                    { "id": 21, "direction": "input" },
                    { "id": 22, "direction": "output" }
                ]
            },
            {
                "id": "t3", "title": "T3", "description": "do three", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [
                    { "id": 31, "direction": "input" },
                    { "id": 32, "direction": "output" }
                ]
            },
            {
                "id": "t4", "title": "T4", "description": "do four", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [
                    { "id": 41, "direction": "input" },
                    { "id": 42, "direction": "input" },
                    { "id": 43, "direction": "output" }
                ]
            }
        ],
        "connections": [
            { "fromSocketId": 11, "toSocketId": 21 },
            { "fromSocketId": 11, "toSocketId": 31 },
            { "fromSocketId": 22, "toSocketId": 41 },
            { "fromSocketId": 32, "toSocketId": 42 }
        ],
        "workflows": []
    }))
    .unwrap()
}

#[tokio::test]
async fn task_graph_runs_layered_with_joined_context() {
    let provider = ScriptedProvider::new(vec![
        "r1".into(), complete_review(),
        "r2".into(), complete_review(),
        "r3".into(), complete_review(),
        "r4".into(), complete_review(),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_with(provider.clone(), dir.path());
    let sink = Arc::new(MemorySink::new());
    let workspace = diamond_workspace();
    let workflows = Arc::new(InProcessWorkflows::from_workspace(&workspace));

    let run = runner
        .run(&workspace, sink.clone(), workflows)
        .await
        .unwrap();

    let order: Vec<&str> = run.task_outputs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, vec!["t1", "t2", "t3", "t4"]);
    assert_eq!(run.final_result, "r4");

    // t4 saw its predecessors' outputs comma-joined in connection order.
    let prompts = provider.prompts();
    let t4_prompt = prompts.iter().find(|p| p.contains("do four")).unwrap();
    assert!(t4_prompt.contains("r2, r3"), "prompt was: {t4_prompt}");

    // start + success events for each task, then the workspace success.
    let events = sink.console_events().await;
    assert!(events.iter().any(|e| e.message == "Task 'T1' started"));
    assert!(events.iter().any(|e| e.message == "Task 'T4' completed"));
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Success);
    assert!(last.message.contains("Workspace 'Research' completed"));
    assert!(last.results.is_some());

    let transcript = run.transcript.expect("transcript written");
    assert!(transcript.exists());
}

#[tokio::test]
async fn classifier_dispatch_clamps_confidence_and_runs_the_workflow() {
    let provider = ScriptedProvider::new(vec![json!({
        "type": "workflow",
        "id": "w1",
        "confidence": 1.5,
        "reasoning": "workflow fits best"
    })
    .to_string()]);
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_with(provider, dir.path());
    let sink = Arc::new(MemorySink::new());

    let workspace: Workspace = serde_json::from_value(json!({
        "id": "ws-2",
        "name": "Routed",
        "mainLLM": { "provider": "openai", "model": "gpt-4o" },
        "agents": [{
            "id": "a1", "name": "Scribe", "role": "a writer", "objective": "write", "tools": []
        }],
        "tasks": [{
            "id": "t1", "title": "Routed task", "description": "route me", "type": "agentic",
            "sockets": [{ "id": 11, "direction": "output" }]
        }],
        "connections": [],
        "workflows": [{
            "id": "w1",
            "name": "Passthrough",
            "nodes": [
                {
                    "id": 1, "nodeType": "workflow_input", "title": "In",
                    "sockets": [{ "id": 101, "direction": "output", "dataType": "string" }]
                },
                {
                    "id": 2, "nodeType": "join", "title": "Out",
                    "sockets": [
                        { "id": 201, "direction": "input", "dataType": "string" },
                        { "id": 202, "direction": "output", "dataType": "string" }
                    ]
                }
            ],
            "connections": [{ "fromSocketId": 101, "toSocketId": 201 }]
        }]
    }))
    .unwrap();
    let workflows = Arc::new(InProcessWorkflows::from_workspace(&workspace));

    let run = runner
        .run(&workspace, sink.clone(), workflows)
        .await
        .unwrap();
    assert_eq!(run.final_result, "");

    let events = sink.console_events().await;
    let dispatch = events
        .iter()
        .find(|e| e.message.contains("dispatched to"))
        .expect("dispatch event emitted");
    assert!(dispatch.message.contains("workflow 'w1'"));
    assert!(dispatch.message.contains("1.00"), "confidence clamped: {}", dispatch.message);
}

#[tokio::test]
async fn failed_task_flows_error_string_to_successors() {
    let provider = ScriptedProvider::new(vec![
        "draft".into(),
        "this review is not json at all".into(),
        "recovered".into(),
        complete_review(),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_with(provider.clone(), dir.path());
    let sink = Arc::new(MemorySink::new());

    let workspace: Workspace = serde_json::from_value(json!({
        "id": "ws-3",
        "name": "Fallible",
        "mainLLM": { "provider": "openai", "model": "gpt-4o" },
        "agents": [{
            "id": "a1", "name": "Scribe", "role": "a writer", "objective": "write", "tools": []
        }],
        "tasks": [
            {
                "id": "t1", "title": "Fails", "description": "break", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [{ "id": 11, "direction": "output" }]
            },
            {
                "id": "t2", "title": "Continues", "description": "carry on", "type": "specific-agent",
                "executorId": "a1",
                "sockets": [
                    { "id": 21, "direction": "input" },
                    { "id": 22, "direction": "output" }
                ]
            }
        ],
        "connections": [{ "fromSocketId": 11, "toSocketId": 21 }],
        "workflows": []
    }))
    .unwrap();
    let workflows = Arc::new(InProcessWorkflows::from_workspace(&workspace));

    let run = runner
        .run(&workspace, sink.clone(), workflows)
        .await
        .unwrap();

    assert!(run.task_outputs[0].1.starts_with("Error:"));
    assert_eq!(run.task_outputs[1].1, "recovered");

    // The successor saw the error string as context.
    let prompts = provider.prompts();
    let t2_prompt = prompts.iter().find(|p| p.contains("carry on")).unwrap();
    assert!(t2_prompt.contains("Error:"), "prompt was: {t2_prompt}");

    let events = sink.console_events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == EventKind::Error && e.message.contains("Fails")));
}

#[tokio::test]
async fn cyclic_task_graph_is_fatal() {
    let provider = ScriptedProvider::new(vec![]);
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_with(provider, dir.path());
    let sink = Arc::new(MemorySink::new());

    let workspace: Workspace = serde_json::from_value(json!({
        "id": "ws-4",
        "name": "Cyclic",
        "mainLLM": { "provider": "openai", "model": "gpt-4o" },
        "agents": [],
        "tasks": [
            {
                "id": "t1", "title": "A", "description": "a", "type": "agentic",
                "sockets": [
                    { "id": 11, "direction": "input" },
                    { "id": 12, "direction": "output" }
                ]
            },
            {
                "id": "t2", "title": "B", "description": "b", "type": "agentic",
                "sockets": [
                    { "id": 21, "direction": "input" },
                    { "id": 22, "direction": "output" }
                ]
            }
        ],
        "connections": [
            { "fromSocketId": 12, "toSocketId": 21 },
            { "fromSocketId": 22, "toSocketId": 11 }
        ],
        "workflows": []
    }))
    .unwrap();
    let workflows = Arc::new(InProcessWorkflows::from_workspace(&workspace));

    let err = runner
        .run(&workspace, sink.clone(), workflows)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::CycleDetected(_)));

    let events = sink.console_events().await;
    assert!(events.iter().any(|e| e.kind == EventKind::Error));
}

#[tokio::test]
async fn dispatcher_rejects_unknown_candidate_ids() {
    let provider = ScriptedProvider::new(vec![json!({
        "type": "agent",
        "id": "nobody",
        "confidence": 0.9,
        "reasoning": "sounds right"
    })
    .to_string()]);
    let workspace = diamond_workspace();
    let dispatcher = Dispatcher::new(provider.as_ref());

    let task: atelier_core::Task = serde_json::from_value(json!({
        "id": "t9", "title": "Pick", "description": "pick", "type": "agentic",
        "sockets": []
    }))
    .unwrap();

    let err = dispatcher.dispatch(&workspace, &task).await.unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidExecutorChoice(id) if id == "nobody"));
}

#[tokio::test]
async fn dispatcher_needs_valid_json() {
    let provider = ScriptedProvider::new(vec!["I pick the first one".into()]);
    let workspace = diamond_workspace();
    let dispatcher = Dispatcher::new(provider.as_ref());

    let task: atelier_core::Task = serde_json::from_value(json!({
        "id": "t9", "title": "Pick", "description": "pick", "type": "agentic",
        "sockets": []
    }))
    .unwrap();

    let err = dispatcher.dispatch(&workspace, &task).await.unwrap_err();
    assert!(matches!(err, RuntimeError::NoExecutorAvailable(_)));
}

#[tokio::test]
async fn fixed_dispatch_verifies_the_executor_exists() {
    let provider = ScriptedProvider::new(vec![]);
    let workspace = diamond_workspace();
    let dispatcher = Dispatcher::new(provider.as_ref());

    let task: atelier_core::Task = serde_json::from_value(json!({
        "id": "t9", "title": "Fixed", "description": "run w", "type": "workflow",
        "executorId": "missing-workflow",
        "sockets": []
    }))
    .unwrap();

    let err = dispatcher.dispatch(&workspace, &task).await.unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidExecutorChoice(_)));

    let task: atelier_core::Task = serde_json::from_value(json!({
        "id": "t9", "title": "Fixed", "description": "use a1", "type": "specific-agent",
        "executorId": "a1",
        "sockets": []
    }))
    .unwrap();
    let choice = dispatcher.dispatch(&workspace, &task).await.unwrap();
    assert!(matches!(choice, ExecutorChoice::Agent { agent_id, .. } if agent_id == "a1"));
}
