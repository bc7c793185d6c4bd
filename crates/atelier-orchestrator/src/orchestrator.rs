//! The task-graph orchestrator: layered, sequential task execution with
//! context propagation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use atelier_core::{
    ConsoleEvent, EventKind, EventSink, LlmChoice, RuntimeError, Workflow, WorkflowProvider,
    Workspace,
};
use atelier_graph::{layer, GraphError};
use atelier_agent::{AgentRuntime, AgentToolDeps};
use atelier_llm::{create_provider, LlmProvider};
use atelier_mcp::McpClient;
use atelier_nodes::{NodeRegistry, NodeServices};
use atelier_workflow::WorkflowRunner;

use crate::dispatcher::{Dispatcher, ExecutorChoice};
use crate::transcript::persist_transcript;

/// Resolves providers for the classifier and agent runtimes. Injectable so
/// runs can be driven by a scripted provider.
pub type ProviderFactory =
    Box<dyn Fn(&LlmChoice, Option<&str>) -> Arc<dyn LlmProvider> + Send + Sync>;

/// In-process workflow lookup over the workspace's own workflows.
pub struct InProcessWorkflows {
    workflows: HashMap<String, Workflow>,
}

impl InProcessWorkflows {
    pub fn from_workspace(workspace: &Workspace) -> Self {
        Self {
            workflows: workspace
                .workflows
                .iter()
                .map(|w| (w.id.clone(), w.clone()))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl WorkflowProvider for InProcessWorkflows {
    async fn fetch(&self, workflow_id: &str) -> Result<Workflow, RuntimeError> {
        self.workflows
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NoExecutorAvailable(workflow_id.to_string()))
    }
}

/// Which agent runtime variant executes agent tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentVariant {
    /// Plain refine loop: no tools, no final check.
    Basic,
    /// Tool-augmented loop with the final-check stage.
    #[default]
    ToolAugmented,
}

impl AgentVariant {
    /// Parses a client-supplied variant id; unknown ids get the default.
    pub fn from_id(id: Option<&str>) -> Self {
        match id {
            Some("basic") => AgentVariant::Basic,
            _ => AgentVariant::ToolAugmented,
        }
    }
}

/// Result of one workspace execution.
#[derive(Debug)]
pub struct WorkspaceRun {
    /// Task outputs in execution order.
    pub task_outputs: Vec<(String, String)>,
    pub final_result: String,
    pub transcript: Option<PathBuf>,
}

/// Runs a workspace: layers the task graph, dispatches each task to its
/// executor, and streams progress to the event sink. A failed task records
/// its error string and never halts the run.
pub struct WorkspaceRunner {
    registry: Arc<NodeRegistry>,
    providers: ProviderFactory,
    output_dir: PathBuf,
    agent_variant: AgentVariant,
}

impl WorkspaceRunner {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            providers: Box::new(|choice, key| create_provider(choice, key)),
            output_dir: PathBuf::from("Output"),
            agent_variant: AgentVariant::default(),
        }
    }

    pub fn with_agent_variant(mut self, variant: AgentVariant) -> Self {
        self.agent_variant = variant;
        self
    }

    /// Replaces the provider factory (scripted providers in tests).
    pub fn with_providers(mut self, providers: ProviderFactory) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub async fn run(
        &self,
        workspace: &Workspace,
        sink: Arc<dyn EventSink>,
        workflows: Arc<dyn WorkflowProvider>,
    ) -> Result<WorkspaceRun, RuntimeError> {
        info!(
            "WORKSPACE '{}': {} tasks, {} agents, {} workflows",
            workspace.name,
            workspace.tasks.len(),
            workspace.agents.len(),
            workspace.workflows.len()
        );

        let layering = match self.layer_tasks(workspace) {
            Ok(layering) => layering,
            Err(e) => {
                sink.console(ConsoleEvent::new(
                    EventKind::Error,
                    format!("Workspace '{}' failed: {}", workspace.name, e),
                ))
                .await;
                return Err(e);
            }
        };

        let services = NodeServices::new(workspace.main_llm.clone(), workspace.api_key.clone());
        let runner = Arc::new(WorkflowRunner::new(Arc::clone(&self.registry), Arc::new(services)));
        let workspace_provider =
            (self.providers)(&workspace.main_llm, workspace.api_key.as_deref());
        let dispatcher = Dispatcher::new(workspace_provider.as_ref());

        let mut results: HashMap<String, String> = HashMap::new();
        let mut ordered: Vec<(String, String)> = Vec::new();

        let order: Vec<String> = layering.flatten().into_iter().cloned().collect();
        for task_id in &order {
            let task = workspace
                .tasks
                .iter()
                .find(|t| t.id == *task_id)
                .expect("layered task exists");

            let context = layering
                .preds(task_id)
                .iter()
                .filter_map(|pred| results.get(pred).cloned())
                .collect::<Vec<_>>()
                .join(", ");

            let output = self
                .run_task(workspace, task, &context, &dispatcher, &runner, &sink, &workflows)
                .await;

            results.insert(task.id.clone(), output.clone());
            ordered.push((task.id.clone(), output));
        }

        let final_result = layering
            .layers
            .last()
            .and_then(|last| last.first())
            .and_then(|task_id| results.get(task_id).cloned())
            .unwrap_or_else(|| serde_json::to_string(&results).unwrap_or_default());

        sink.console(
            ConsoleEvent::new(
                EventKind::Success,
                format!("Workspace '{}' completed", workspace.name),
            )
            .with_results(json!(results)),
        )
        .await;

        let transcript = match persist_transcript(&self.output_dir, &workspace.name, &ordered).await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("WORKSPACE '{}': transcript not written: {}", workspace.name, e);
                None
            }
        };

        Ok(WorkspaceRun {
            task_outputs: ordered,
            final_result,
            transcript,
        })
    }

    fn layer_tasks(
        &self,
        workspace: &Workspace,
    ) -> Result<atelier_graph::Layering<String>, RuntimeError> {
        let mut socket_to_task: HashMap<u64, &str> = HashMap::new();
        for task in &workspace.tasks {
            for socket in &task.sockets {
                socket_to_task.insert(socket.id, &task.id);
            }
        }

        let mut edges = Vec::new();
        for connection in &workspace.connections {
            let from = socket_to_task
                .get(&connection.from_socket_id)
                .ok_or(RuntimeError::SocketNotResolved(connection.from_socket_id))?;
            let to = socket_to_task
                .get(&connection.to_socket_id)
                .ok_or(RuntimeError::SocketNotResolved(connection.to_socket_id))?;
            edges.push((from.to_string(), to.to_string()));
        }

        let task_ids: Vec<String> = workspace.tasks.iter().map(|t| t.id.clone()).collect();
        layer(&task_ids, &edges).map_err(|e| match e {
            GraphError::Empty => RuntimeError::EmptyGraph,
            GraphError::Cycle(at) => RuntimeError::CycleDetected(at),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_task(
        &self,
        workspace: &Workspace,
        task: &atelier_core::Task,
        context: &str,
        dispatcher: &Dispatcher<'_>,
        runner: &Arc<WorkflowRunner>,
        sink: &Arc<dyn EventSink>,
        workflows: &Arc<dyn WorkflowProvider>,
    ) -> String {
        let choice = match dispatcher.dispatch(workspace, task).await {
            Ok(choice) => choice,
            Err(e) => {
                warn!("TASK '{}': dispatch failed: {}", task.id, e);
                sink.console(ConsoleEvent::new(
                    EventKind::Error,
                    format!("Task '{}' failed: {}", task.title, e),
                ))
                .await;
                return format!("Error: {e}");
            }
        };

        if task.task_type == atelier_core::TaskType::Agentic {
            sink.console(ConsoleEvent::new(
                EventKind::Info,
                format!("Task '{}' dispatched to {}", task.title, choice.describe()),
            ))
            .await;
        }

        sink.console(ConsoleEvent::new(
            EventKind::Info,
            format!("Task '{}' started", task.title),
        ))
        .await;

        let outcome = self
            .execute_choice(workspace, task, context, &choice, runner, sink, workflows)
            .await;

        match outcome {
            Ok(output) => {
                sink.console(
                    ConsoleEvent::new(
                        EventKind::Success,
                        format!("Task '{}' completed", task.title),
                    )
                    .with_results(json!({ task.id.clone(): output })),
                )
                .await;
                output
            }
            Err(e) => {
                warn!("TASK '{}': failed: {}", task.id, e);
                sink.console(ConsoleEvent::new(
                    EventKind::Error,
                    format!("Task '{}' failed: {}", task.title, e),
                ))
                .await;
                format!("Error: {e}")
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_choice(
        &self,
        workspace: &Workspace,
        task: &atelier_core::Task,
        context: &str,
        choice: &ExecutorChoice,
        runner: &Arc<WorkflowRunner>,
        sink: &Arc<dyn EventSink>,
        workflows: &Arc<dyn WorkflowProvider>,
    ) -> Result<String, RuntimeError> {
        match choice {
            ExecutorChoice::Workflow { workflow_id, .. } => {
                let workflow = workflows.fetch(workflow_id).await?;
                let run = runner
                    .execute(&workflow, sink.as_ref(), Some(context))
                    .await?;
                Ok(run.final_result)
            }
            ExecutorChoice::Agent { agent_id, .. } => {
                let agent = workspace
                    .agents
                    .iter()
                    .find(|a| a.id == *agent_id)
                    .ok_or_else(|| RuntimeError::InvalidExecutorChoice(agent_id.clone()))?;

                let llm = agent.llm.as_ref().unwrap_or(&workspace.main_llm);
                let api_key = agent.api_key.as_deref().or(workspace.api_key.as_deref());
                let provider = (self.providers)(llm, api_key);

                let runtime = AgentRuntime::new(agent.clone(), provider);
                match self.agent_variant {
                    AgentVariant::Basic => runtime.run_basic(task, context).await,
                    AgentVariant::ToolAugmented => {
                        let deps = AgentToolDeps {
                            workflows: Arc::clone(workflows),
                            runner: Arc::clone(runner),
                            sink: Arc::clone(sink),
                        };
                        runtime.run_with_tools(task, context, &deps).await
                    }
                }
            }
            ExecutorChoice::McpTool { tool_name, transport, .. } => {
                let mut client = McpClient::connect(tool_name, transport).await?;
                let query = if context.is_empty() {
                    task.description.clone()
                } else {
                    format!("{}\n\n{}", task.description, context)
                };
                let result = client.call_tool(tool_name, json!({ "query": query })).await;
                client.close().await;

                let result = result?;
                if result.is_error {
                    return Err(RuntimeError::McpCallFailed(result.text()));
                }
                Ok(result.text())
            }
        }
    }
}
