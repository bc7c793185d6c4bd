//! LLM provider abstraction for atelier.
//!
//! This crate provides unified access to the LLM back-ends the runtimes
//! call:
//!
//! - [`LlmProvider`] — the provider seam: `generate_text` plus native
//!   tool-call support where the vendor offers it
//! - [`OpenAiProvider`] — OpenAI-compatible chat (also serves Ollama via an
//!   `api_base` override)
//! - [`AnthropicProvider`] — Claude models via the Anthropic messages API
//! - [`create_provider`] — factory resolving an [`LlmChoice`] to a provider
//! - [`generate_with_tools`] — the bounded tool-call loop
//! - [`ToolExecutor`] / [`ToolSet`] — executors the loop can dispatch to
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use atelier_core::LlmChoice;
//! use atelier_llm::create_provider;
//!
//! let choice = LlmChoice { provider: "openai".into(), model: "gpt-4o".into() };
//! let provider = create_provider(&choice, None);
//! let text = provider.generate_text("Say hello.").await?;
//! ```
//!
//! # Tool loop
//!
//! ```rust,ignore
//! use atelier_llm::{generate_with_tools, ToolSet};
//!
//! let mut tools = ToolSet::new();
//! tools.register(schema, executor);
//! let answer = generate_with_tools(provider.as_ref(), system, prompt, &tools).await?;
//! ```

mod anthropic;
mod factory;
mod openai;
mod provider;
mod tools;

pub use anthropic::AnthropicProvider;
pub use factory::create_provider;
pub use openai::OpenAiProvider;
pub use provider::{ChatMessage, LlmProvider, LlmReply, LlmUsage, ToolCall, ToolSchema};
pub use tools::{generate_with_tools, ToolExecutor, ToolSet, MAX_TOOL_ITERATIONS, TOOL_CALL_TIMEOUT};
