//! Agent runtime for atelier: a bounded iterative refine loop.
//!
//! An agent drives an LLM to satisfy a task: generate an output, have a
//! reviewer judge it, and refine until the reviewer is satisfied or the
//! iteration budget runs out. Two variants share the loop:
//!
//! - [`AgentRuntime::run_basic`] — generate → review → refine
//! - [`AgentRuntime::run_with_tools`] — adds tool-augmented generation
//!   (workflow tools and MCP servers) and a final-check stage that can
//!   accept a flagged output instead of iterating again
//!
//! Reviewer and final-check replies are strict JSON, parsed with the
//! first-balanced-brace fallback from `atelier_core::parse_loose`.

mod attach;
mod prompts;
mod runtime;

pub use attach::{attach_tools, AgentToolDeps};
pub use prompts::{FINAL_CHECK_SYSTEM, REVIEW_SYSTEM};
pub use runtime::{AgentRuntime, MAX_REFINE_ITERATIONS};
