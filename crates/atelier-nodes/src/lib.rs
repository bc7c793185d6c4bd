//! Node contract, registry, and built-in nodes for atelier workflows.
//!
//! A node is the unit of behavior inside a workflow: it receives values on
//! its input sockets, does its work, and returns values keyed by output
//! socket. This crate provides:
//!
//! - [`Node`] — the `process(context)` trait behaviors implement
//! - [`NodeContext`] / [`NodeOutputs`] — inputs, config access, services
//! - [`NodeRegistry`] — node-type string → behavior, with the built-ins
//! - [`RuntimeNode`] — a declared node hydrated against the registry
//!
//! Built-in node types:
//!
//! | Key | Behavior |
//! |-----|----------|
//! | `workflow_input` | Injection point for the run's root input |
//! | `llm_chat` | Chat completion via the configured provider |
//! | `join` | Joins its inputs with a configurable separator |
//! | `json_manipulator` | Extract / filter / count / stringify over JSON |
//! | `web_scraper` | SSRF-guarded HTTP fetch with content extraction |
//! | `image_input` | Loads an image from upload, URL, or base64 |
//! | `vision` | Image + prompt to a vision-capable model |
//! | `transcription` | Audio to text via the configured provider |
//! | `text_to_speech` | Text to audio via the configured provider |
//! | `mcp_discovery` | Lists a server's tools, prompts, and resources |
//! | `mcp_tool_call` | Invokes a named tool on a server |
//! | `mcp_get_prompt` | Retrieves a prompt body from a server |
//!
//! Nodes surface operational failures as an `Error: …` string on their
//! primary output; only infrastructural failures (missing required
//! configuration, unknown node type) propagate as errors.

mod image_input;
mod join;
mod json_manipulator;
mod llm_chat;
mod mcp;
mod media;
mod net;
mod node;
mod web_scraper;
mod workflow_input;

pub use image_input::ImageInputNode;
pub use join::JoinNode;
pub use json_manipulator::JsonManipulatorNode;
pub use llm_chat::LlmChatNode;
pub use mcp::{McpDiscoveryNode, McpGetPromptNode, McpToolCallNode};
pub use media::{TextToSpeechNode, TranscriptionNode, VisionNode};
pub use net::{guarded_fetch, guarded_fetch_bytes, FetchedBody, FETCH_TIMEOUT, MAX_FETCH_BYTES};
pub use node::{
    error_output, Node, NodeContext, NodeOutputs, NodeRegistry, NodeServices, RuntimeNode,
    WORKFLOW_INPUT_TYPE,
};
pub use web_scraper::WebScraperNode;
pub use workflow_input::WorkflowInputNode;
