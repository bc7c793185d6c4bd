//! # Atelier — agent orchestration runtime
//!
//! Atelier executes **workspaces**: directed graphs of tasks, each carried
//! out by an agent (an iterative LLM loop with self-review) or by a
//! workflow (a finer-grained DAG of nodes calling LLMs, tools, MCP
//! servers, and HTTP scrapers). Progress streams to the client as
//! structured events; the final artifact is the output of the last task.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use atelier::prelude::*;
//! use std::sync::Arc;
//!
//! let workspace: Workspace = serde_json::from_str(&payload)?;
//! let runner = WorkspaceRunner::new(Arc::new(NodeRegistry::with_defaults()));
//! let workflows = Arc::new(InProcessWorkflows::from_workspace(&workspace));
//!
//! let run = runner.run(&workspace, Arc::new(NullSink), workflows).await?;
//! println!("{}", run.final_result);
//! ```
//!
//! ## Crate Structure
//!
//! | Crate | Description |
//! |-------|-------------|
//! | [`atelier_core`] | Domain types, events, errors |
//! | [`atelier_graph`] | Topological layering |
//! | [`atelier_llm`] | LLM providers and the tool-call loop |
//! | [`atelier_mcp`] | MCP clients (stdio and HTTP transports) |
//! | [`atelier_nodes`] | Node contract, registry, built-in nodes |
//! | [`atelier_workflow`] | Layer-parallel workflow runtime |
//! | [`atelier_agent`] | Refine-loop agent runtime |
//! | [`atelier_orchestrator`] | Dispatcher and task-graph orchestrator |

// Re-export domain types
pub use atelier_core::{
    Agent, ConfigParameter, Connection, ConsoleEvent, DataType, EventKind, EventSink, LlmChoice,
    McpTransportConfig, MemorySink, NodeSocket, NodeSpec, NullSink, ReviewStatus, ReviewVerdict,
    RuntimeError, SocketDirection, Task, TaskConnection, TaskSocket, TaskType, ToolConfig,
    Workflow, WorkflowOutputEvent, WorkflowProvider, Workspace,
};

// Re-export layering
pub use atelier_graph::{layer, GraphError, Layering};

// Re-export providers
pub use atelier_llm::{
    create_provider, generate_with_tools, AnthropicProvider, ChatMessage, LlmProvider, LlmReply,
    OpenAiProvider, ToolCall, ToolExecutor, ToolSchema, ToolSet,
};

// Re-export MCP
pub use atelier_mcp::{McpClient, McpRegistry, McpToolDefinition, McpToolResult};

// Re-export nodes
pub use atelier_nodes::{Node, NodeContext, NodeOutputs, NodeRegistry, NodeServices};

// Re-export runtimes
pub use atelier_agent::{AgentRuntime, AgentToolDeps};
pub use atelier_orchestrator::{
    AgentVariant, Dispatcher, ExecutorChoice, InProcessWorkflows, WorkspaceRun, WorkspaceRunner,
};
pub use atelier_workflow::{WorkflowRun, WorkflowRunner};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use atelier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Agent, AgentRuntime, ConsoleEvent, EventKind, EventSink, InProcessWorkflows, LlmChoice,
        NodeRegistry, NullSink, RuntimeError, Task, TaskType, Workflow, WorkflowRunner, Workspace,
        WorkspaceRunner,
    };
}
