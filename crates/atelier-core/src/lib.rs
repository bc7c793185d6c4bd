//! Core domain types and error definitions for atelier.
//!
//! This crate provides the fundamental types shared across the atelier runtime:
//!
//! - [`Workspace`], [`Task`], [`Agent`] — the top-level execution request
//! - [`Workflow`], [`NodeSpec`], [`NodeSocket`] — node-graph definitions
//! - [`ConfigParameter`] — node configuration with value sources
//! - [`ReviewVerdict`] and [`FinalCheckVerdict`] — agent review results
//! - [`ConsoleEvent`] and the [`EventSink`] trait — the progress event plane
//! - [`RuntimeError`] — shared error type for all runtimes
//! - [`extract_json`] / [`parse_loose`] — tolerant JSON parsing for LLM output
//!
//! # Example
//!
//! ```rust
//! use atelier_core::{ConsoleEvent, EventKind, Task, TaskType};
//!
//! let task = Task {
//!     id: "t1".to_string(),
//!     title: "Summarize".to_string(),
//!     description: "Summarize the findings".to_string(),
//!     expected_output: "A short paragraph".to_string(),
//!     task_type: TaskType::Agentic,
//!     executor_id: None,
//!     sockets: Vec::new(),
//! };
//!
//! let event = ConsoleEvent::new(EventKind::Info, format!("Starting {}", task.title));
//! assert!(!event.id.is_empty());
//! ```

mod error;
mod event;
mod json;
mod review;
mod workflow;
mod workspace;

pub use error::RuntimeError;
pub use event::{ConsoleEvent, EventKind, EventSink, MemorySink, NullSink, WorkflowOutputEvent};
pub use json::{extract_json, parse_loose, stringify};
pub use review::{
    FinalCheckVerdict, NextAction, ReviewFeedback, ReviewStatus, ReviewVerdict,
};
pub use workflow::{
    Connection, DataType, NodeSocket, NodeSpec, Position, Workflow, WorkflowProvider,
};
pub use workspace::{
    Agent, ConfigParameter, LlmChoice, McpTransportConfig, SocketDirection, Task,
    TaskConnection, TaskSocket, TaskType, ToolConfig, ValueSource, Workspace,
};
