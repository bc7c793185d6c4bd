//! Workspace, task graph, and agent definitions.
//!
//! A workspace is the root execution request sent by a client: a DAG of
//! tasks, the agents available to execute them, and the workflows tasks may
//! reference. All types here are read-only during a single execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::Workflow;

/// The top-level execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Unique identifier for this workspace.
    pub id: String,
    /// Human-readable workspace name; also names the transcript file.
    pub name: String,
    /// Default LLM choice for tasks and agents that do not override it.
    #[serde(rename = "mainLLM")]
    pub main_llm: LlmChoice,
    /// Default credential used when an agent carries none.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Agents available as task executors.
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// The tasks forming the task graph.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Directed connections between task sockets.
    #[serde(default)]
    pub connections: Vec<TaskConnection>,
    /// Workflows referenced by tasks or workflow tools.
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

/// A provider/model pair selecting which LLM backs a runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmChoice {
    /// Provider key, e.g. `"openai"`, `"anthropic"`, `"ollama"`.
    pub provider: String,
    /// Model identifier passed through to the provider.
    pub model: String,
}

/// How a task is matched to an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// An LLM classifier picks the executor among all candidates.
    Agentic,
    /// Executed by the agent named in `executor_id`.
    SpecificAgent,
    /// Executed by the workflow named in `executor_id`.
    Workflow,
}

/// A unit of work within the task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Hint describing the shape of the expected output.
    #[serde(default)]
    pub expected_output: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Fixed executor for `specific-agent` and `workflow` tasks.
    #[serde(default)]
    pub executor_id: Option<String>,
    /// Connection points; socket ids are unique within the workspace.
    #[serde(default)]
    pub sockets: Vec<TaskSocket>,
}

/// Direction of a socket relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDirection {
    Input,
    Output,
}

/// A connection point on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSocket {
    pub id: u64,
    pub direction: SocketDirection,
}

/// A directed edge between two task sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConnection {
    pub from_socket_id: u64,
    pub to_socket_id: u64,
}

/// An agent definition: identity text plus optional tools and LLM override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: String,
    pub objective: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub capabilities: String,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    /// Per-agent LLM choice; falls back to the workspace default.
    #[serde(default)]
    pub llm: Option<LlmChoice>,
    /// Per-agent credential; falls back to the workspace default.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A tool an agent may call, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolConfig {
    /// A plain function tool described by a JSON-schema parameters blob.
    Function {
        name: String,
        description: String,
        #[serde(default)]
        parameters: Value,
    },
    /// A tool that runs a referenced workflow with a single string input.
    Workflow {
        name: String,
        description: String,
        #[serde(rename = "workflowId")]
        workflow_id: String,
    },
    /// A tool backed by a remote MCP server.
    Mcp {
        name: String,
        description: String,
        #[serde(flatten)]
        transport: McpTransportConfig,
    },
    /// A built-in tool resolved by name.
    Basic {
        name: String,
        description: String,
        #[serde(default)]
        parameters: Value,
    },
}

impl ToolConfig {
    /// The tool's name regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            ToolConfig::Function { name, .. }
            | ToolConfig::Workflow { name, .. }
            | ToolConfig::Mcp { name, .. }
            | ToolConfig::Basic { name, .. } => name,
        }
    }
}

/// Transport configuration for an MCP-backed tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpTransportConfig {
    /// Spawn a local server and speak JSON-RPC over its standard streams.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Connect to a remote server over HTTP.
    Http { url: String },
}

/// Where a configuration parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    UserInput,
    Env,
    Default,
    RuntimeVault,
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Default
    }
}

/// A single configuration parameter on a node.
///
/// The effective value is the explicit value when present, otherwise the
/// declared default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub value_source: ValueSource,
    #[serde(default)]
    pub param_value: Option<Value>,
    /// Candidate values for enumerated parameters (model pickers etc.).
    #[serde(default)]
    pub source_list: Option<Vec<String>>,
}

impl ConfigParameter {
    /// Returns `param_value` when set, otherwise `default_value`.
    pub fn effective_value(&self) -> Option<&Value> {
        self.param_value.as_ref().or(self.default_value.as_ref())
    }

    /// The effective value rendered as a string, if any.
    pub fn effective_str(&self) -> Option<String> {
        self.effective_value().map(crate::json::stringify)
    }
}
