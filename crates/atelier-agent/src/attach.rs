//! Tool attachment: turning an agent's declared tools into executors.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use atelier_core::{Agent, EventSink, RuntimeError, ToolConfig, WorkflowProvider};
use atelier_llm::{ToolExecutor, ToolSchema, ToolSet};
use atelier_mcp::McpRegistry;
use atelier_workflow::WorkflowRunner;

/// Collaborators the attached tools execute against.
pub struct AgentToolDeps {
    pub workflows: Arc<dyn WorkflowProvider>,
    pub runner: Arc<WorkflowRunner>,
    pub sink: Arc<dyn EventSink>,
}

/// Runs a referenced workflow with a single string input.
struct WorkflowToolExecutor {
    workflow_id: String,
    workflows: Arc<dyn WorkflowProvider>,
    runner: Arc<WorkflowRunner>,
    sink: Arc<dyn EventSink>,
}

#[async_trait]
impl ToolExecutor for WorkflowToolExecutor {
    async fn execute(&self, args: Value) -> Result<String, RuntimeError> {
        let input = args
            .get("workflowInput")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let workflow = self.workflows.fetch(&self.workflow_id).await?;
        let run = self
            .runner
            .execute(&workflow, self.sink.as_ref(), Some(input))
            .await?;
        Ok(run.final_result)
    }
}

/// Calls a tool on an MCP server the run already connected to.
struct McpToolExecutor {
    registry: Arc<Mutex<McpRegistry>>,
    server: String,
    tool: String,
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, args: Value) -> Result<String, RuntimeError> {
        let mut registry = self.registry.lock().await;
        let client = registry
            .get_mut(&self.server)
            .ok_or_else(|| RuntimeError::McpCallFailed(format!("server '{}' is gone", self.server)))?;
        let result = client.call_tool(&self.tool, args).await?;
        if result.is_error {
            return Err(RuntimeError::McpCallFailed(result.text()));
        }
        Ok(result.text())
    }
}

/// Attaches the agent's declared tools.
///
/// Workflow tools get a `{workflowInput}` schema; MCP tools connect to the
/// named server (connections land in `registry`, which the caller must
/// release) and expose every remote tool under its remote schema. Tools
/// that cannot attach are skipped with a warning rather than failing the
/// run.
pub async fn attach_tools(
    agent: &Agent,
    deps: &AgentToolDeps,
    registry: &Arc<Mutex<McpRegistry>>,
) -> ToolSet {
    let mut tools = ToolSet::new();

    for config in &agent.tools {
        match config {
            ToolConfig::Workflow { name, description, workflow_id } => {
                let schema = ToolSchema {
                    name: name.clone(),
                    description: description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "workflowInput": {
                                "type": "string",
                                "description": "Input passed to the workflow's input node"
                            }
                        },
                        "required": ["workflowInput"]
                    }),
                };
                tools.register(
                    schema,
                    Arc::new(WorkflowToolExecutor {
                        workflow_id: workflow_id.clone(),
                        workflows: Arc::clone(&deps.workflows),
                        runner: Arc::clone(&deps.runner),
                        sink: Arc::clone(&deps.sink),
                    }),
                );
            }
            ToolConfig::Mcp { name, transport, .. } => {
                let remote_tools = {
                    let mut reg = registry.lock().await;
                    match reg.connect(name, transport).await {
                        Ok(client) => match client.list_tools().await {
                            Ok(remote_tools) => remote_tools,
                            Err(e) => {
                                warn!("AGENT: listing tools on '{}' failed: {}", name, e);
                                continue;
                            }
                        },
                        Err(e) => {
                            warn!("AGENT: connecting MCP server '{}' failed: {}", name, e);
                            continue;
                        }
                    }
                };

                info!("AGENT: '{}' exposes {} tools", name, remote_tools.len());
                for remote in remote_tools {
                    let schema = ToolSchema {
                        name: remote.name.clone(),
                        description: remote.description.unwrap_or_default(),
                        parameters: remote
                            .input_schema
                            .unwrap_or_else(|| json!({ "type": "object" })),
                    };
                    tools.register(
                        schema,
                        Arc::new(McpToolExecutor {
                            registry: Arc::clone(registry),
                            server: name.clone(),
                            tool: remote.name,
                        }),
                    );
                }
            }
            ToolConfig::Function { name, .. } | ToolConfig::Basic { name, .. } => {
                warn!("AGENT: tool '{}' has no local executor, skipping", name);
            }
        }
    }

    tools
}
