//! The bounded refine loop.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use atelier_core::{
    parse_loose, Agent, FinalCheckVerdict, ReviewStatus, ReviewVerdict, RuntimeError, Task,
};
use atelier_llm::{generate_with_tools, LlmProvider, ToolSet};
use atelier_mcp::McpRegistry;

use crate::attach::{attach_tools, AgentToolDeps};
use crate::prompts;

/// Refine iteration cap. Exhaustion returns the last output, it does not
/// fail the run.
pub const MAX_REFINE_ITERATIONS: usize = 5;

/// Drives one agent against one task: generate, review, refine.
pub struct AgentRuntime {
    agent: Agent,
    provider: Arc<dyn LlmProvider>,
}

impl AgentRuntime {
    pub fn new(agent: Agent, provider: Arc<dyn LlmProvider>) -> Self {
        Self { agent, provider }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Basic variant: no tools, no final check.
    pub async fn run_basic(&self, task: &Task, context: &str) -> Result<String, RuntimeError> {
        self.refine(task, context, &ToolSet::new(), false).await
    }

    /// Tool-augmented variant: attaches the agent's declared tools, adds
    /// the final-check stage, and releases MCP connections on every exit
    /// path.
    pub async fn run_with_tools(
        &self,
        task: &Task,
        context: &str,
        deps: &AgentToolDeps,
    ) -> Result<String, RuntimeError> {
        let registry = Arc::new(Mutex::new(McpRegistry::new()));
        let tools = attach_tools(&self.agent, deps, &registry).await;
        info!("AGENT '{}': {} tools attached", self.agent.name, tools.len());

        let result = self.refine(task, context, &tools, true).await;

        // Release connections regardless of how the loop ended.
        registry.lock().await.close_all().await;
        result
    }

    async fn refine(
        &self,
        task: &Task,
        context: &str,
        tools: &ToolSet,
        final_check: bool,
    ) -> Result<String, RuntimeError> {
        let system = prompts::identity_system(&self.agent);
        let mut previous: Option<(String, String)> = None;

        for iteration in 0..MAX_REFINE_ITERATIONS {
            info!(
                "AGENT '{}': iteration {}/{}",
                self.agent.name,
                iteration + 1,
                MAX_REFINE_ITERATIONS
            );

            let prompt = prompts::generation_prompt(
                task,
                context,
                previous.as_ref().map(|(o, f)| (o.as_str(), f.as_str())),
            );
            let output = generate_with_tools(self.provider.as_ref(), &system, &prompt, tools).await?;

            let verdict = self.review(task, &output).await?;
            info!(
                "AGENT '{}': review {:?} (score {})",
                self.agent.name, verdict.status, verdict.overall_score
            );

            if verdict.status == ReviewStatus::Complete {
                return Ok(output);
            }

            let feedback = verdict.feedback.to_prompt_text();

            if final_check {
                let check = self.final_check(task, &output, &feedback).await?;
                if check.accept {
                    info!("AGENT '{}': final check accepted ({})", self.agent.name, check.reason);
                    return Ok(output);
                }
            }

            previous = Some((output, feedback));
        }

        info!("AGENT '{}': iterations exhausted, returning last output", self.agent.name);
        Ok(previous.map(|(output, _)| output).unwrap_or_default())
    }

    async fn review(&self, task: &Task, output: &str) -> Result<ReviewVerdict, RuntimeError> {
        let response = self
            .provider
            .generate_text(prompts::REVIEW_SYSTEM, &prompts::review_prompt(task, output))
            .await?;
        parse_loose(&response).map_err(|e| {
            RuntimeError::ReviewParseError(format!("{e}; response was: {response}"))
        })
    }

    async fn final_check(
        &self,
        task: &Task,
        output: &str,
        feedback: &str,
    ) -> Result<FinalCheckVerdict, RuntimeError> {
        let response = self
            .provider
            .generate_text(
                prompts::FINAL_CHECK_SYSTEM,
                &prompts::final_check_prompt(task, output, feedback),
            )
            .await?;
        parse_loose(&response).map_err(|e| {
            RuntimeError::FinalCheckParseError(format!("{e}; response was: {response}"))
        })
    }
}
