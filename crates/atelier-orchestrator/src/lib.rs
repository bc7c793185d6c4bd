//! Task-graph orchestration for atelier.
//!
//! This crate sequences a workspace's tasks and picks each task's
//! executor:
//!
//! - [`WorkspaceRunner`] — layers the task DAG, runs tasks in flattened
//!   layer order, assembles predecessor outputs into each task's context,
//!   emits progress events, and persists the completion transcript
//! - [`Dispatcher`] / [`ExecutorChoice`] — fixed executors for `workflow`
//!   and `specific-agent` tasks, an LLM classifier for `agentic` tasks
//! - [`InProcessWorkflows`] — workflow lookup over the workspace itself
//! - [`persist_transcript`] — the `Output/` completion transcript
//!
//! Failure policy: structural problems (cycles, unresolved sockets, empty
//! graph) are fatal to the run; a failing task records `Error: …` as its
//! output, is reported on the event sink, and downstream tasks run with
//! that string as context.

mod dispatcher;
mod orchestrator;
mod transcript;

pub use dispatcher::{Dispatcher, ExecutorChoice};
pub use orchestrator::{
    AgentVariant, InProcessWorkflows, ProviderFactory, WorkspaceRun, WorkspaceRunner,
};
pub use transcript::persist_transcript;

#[cfg(test)]
mod tests;
