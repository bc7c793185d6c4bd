//! Executor selection: fixed by the task, or chosen by an LLM classifier.

use serde::Deserialize;
use tracing::info;

use atelier_core::{
    parse_loose, McpTransportConfig, RuntimeError, Task, TaskType, ToolConfig, Workspace,
};
use atelier_llm::LlmProvider;

/// The executor selected for one task.
#[derive(Debug, Clone)]
pub enum ExecutorChoice {
    Agent { agent_id: String, confidence: f64 },
    Workflow { workflow_id: String, confidence: f64 },
    McpTool { tool_name: String, transport: McpTransportConfig, confidence: f64 },
}

impl ExecutorChoice {
    pub fn describe(&self) -> String {
        match self {
            ExecutorChoice::Agent { agent_id, confidence } => {
                format!("agent '{agent_id}' (confidence {confidence:.2})")
            }
            ExecutorChoice::Workflow { workflow_id, confidence } => {
                format!("workflow '{workflow_id}' (confidence {confidence:.2})")
            }
            ExecutorChoice::McpTool { tool_name, confidence, .. } => {
                format!("mcp tool '{tool_name}' (confidence {confidence:.2})")
            }
        }
    }
}

const CLASSIFIER_SYSTEM: &str = r#"You select the best executor for a task.

You are given the task and the candidate executors, each with a type, an id, and a short
profile. Pick exactly one candidate.

You must respond with ONLY a JSON object in this exact shape:
{
  "type": "agent" | "workflow" | "mcp",
  "id": "candidate id",
  "confidence": 0.0-1.0,
  "reasoning": "one sentence"
}

No prose before or after the JSON."#;

#[derive(Deserialize)]
struct ClassifierReply {
    #[serde(rename = "type")]
    executor_type: Option<String>,
    id: Option<String>,
    confidence: Option<f64>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

/// MCP tools declared across the workspace's agents, deduplicated by name.
fn mcp_candidates(workspace: &Workspace) -> Vec<(String, String, McpTransportConfig)> {
    let mut seen = Vec::new();
    for agent in &workspace.agents {
        for tool in &agent.tools {
            if let ToolConfig::Mcp { name, description, transport } = tool {
                if !seen.iter().any(|(n, _, _): &(String, _, _)| n == name) {
                    seen.push((name.clone(), description.clone(), transport.clone()));
                }
            }
        }
    }
    seen
}

fn candidate_listing(workspace: &Workspace) -> String {
    let mut lines = Vec::new();
    for agent in &workspace.agents {
        lines.push(format!(
            "- type: agent, id: {}, profile: {} — {}",
            agent.id, agent.name, agent.role
        ));
    }
    for workflow in &workspace.workflows {
        lines.push(format!(
            "- type: workflow, id: {}, profile: {} ({} nodes)",
            workflow.id,
            workflow.name,
            workflow.nodes.len()
        ));
    }
    for (name, description, _) in mcp_candidates(workspace) {
        lines.push(format!("- type: mcp, id: {name}, profile: {description}"));
    }
    lines.join("\n")
}

/// Selects the executor for a task.
///
/// `workflow` and `specific-agent` tasks are fixed by `executor_id`;
/// `agentic` tasks go through the LLM classifier. Classifier replies are
/// validated: JSON (with the balanced-brace fallback), required fields,
/// candidate-id existence, confidence clamped to [0, 1].
pub struct Dispatcher<'a> {
    provider: &'a dyn LlmProvider,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self { provider }
    }

    pub async fn dispatch(
        &self,
        workspace: &Workspace,
        task: &Task,
    ) -> Result<ExecutorChoice, RuntimeError> {
        match task.task_type {
            TaskType::Workflow => {
                let id = task
                    .executor_id
                    .clone()
                    .ok_or_else(|| RuntimeError::NoExecutorAvailable(task.id.clone()))?;
                if !workspace.workflows.iter().any(|w| w.id == id) {
                    return Err(RuntimeError::InvalidExecutorChoice(format!(
                        "workflow '{id}' is not in the workspace"
                    )));
                }
                Ok(ExecutorChoice::Workflow { workflow_id: id, confidence: 1.0 })
            }
            TaskType::SpecificAgent => {
                let id = task
                    .executor_id
                    .clone()
                    .ok_or_else(|| RuntimeError::NoExecutorAvailable(task.id.clone()))?;
                if !workspace.agents.iter().any(|a| a.id == id) {
                    return Err(RuntimeError::InvalidExecutorChoice(format!(
                        "agent '{id}' is not in the workspace"
                    )));
                }
                Ok(ExecutorChoice::Agent { agent_id: id, confidence: 1.0 })
            }
            TaskType::Agentic => self.classify(workspace, task).await,
        }
    }

    async fn classify(
        &self,
        workspace: &Workspace,
        task: &Task,
    ) -> Result<ExecutorChoice, RuntimeError> {
        let listing = candidate_listing(workspace);
        if listing.is_empty() {
            return Err(RuntimeError::NoExecutorAvailable(task.id.clone()));
        }

        let prompt = format!(
            "Task: {}\n\n{}\n\nCandidate executors:\n{}",
            task.title, task.description, listing
        );

        let response = self.provider.generate_text(CLASSIFIER_SYSTEM, &prompt).await?;
        let reply: ClassifierReply = parse_loose(&response)
            .map_err(|_| RuntimeError::NoExecutorAvailable(task.id.clone()))?;

        let (Some(executor_type), Some(id), Some(confidence)) =
            (reply.executor_type, reply.id, reply.confidence)
        else {
            return Err(RuntimeError::NoExecutorAvailable(task.id.clone()));
        };
        let confidence = confidence.clamp(0.0, 1.0);

        let choice = match executor_type.as_str() {
            "agent" => {
                if !workspace.agents.iter().any(|a| a.id == id) {
                    return Err(RuntimeError::InvalidExecutorChoice(id));
                }
                ExecutorChoice::Agent { agent_id: id, confidence }
            }
            "workflow" => {
                if !workspace.workflows.iter().any(|w| w.id == id) {
                    return Err(RuntimeError::InvalidExecutorChoice(id));
                }
                ExecutorChoice::Workflow { workflow_id: id, confidence }
            }
            "mcp" => {
                let Some((name, _, transport)) =
                    mcp_candidates(workspace).into_iter().find(|(n, _, _)| *n == id)
                else {
                    return Err(RuntimeError::InvalidExecutorChoice(id));
                };
                ExecutorChoice::McpTool { tool_name: name, transport, confidence }
            }
            _ => return Err(RuntimeError::InvalidExecutorChoice(executor_type)),
        };

        info!("DISPATCH: task '{}' -> {}", task.id, choice.describe());
        Ok(choice)
    }
}
