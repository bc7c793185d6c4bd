//! Prompt blocks for the agent refine loop.

use atelier_core::{Agent, Task};

pub const REVIEW_SYSTEM: &str = r#"You are a strict reviewer validating an agent's output against its task.

Assess the output for validity, completeness, accuracy, and clarity, then decide a status:
- "complete": the output satisfies the task and the expected format
- "needs_revision": the output is usable but must be improved
- "inadequate": the output misses the task and needs a fresh attempt

You must respond with ONLY a JSON object in this exact shape:
{
  "valid": true,
  "complete": true,
  "accuracy": 0-100,
  "clarity": 0-100,
  "overall_score": 0-100,
  "feedback": {
    "strengths": ["..."],
    "weaknesses": ["..."],
    "missing": ["..."],
    "suggestions": ["..."]
  },
  "status": "complete" | "needs_revision" | "inadequate"
}

No prose before or after the JSON."#;

pub const FINAL_CHECK_SYSTEM: &str = r#"You are the final gate before an agent's output is delivered.

The reviewer flagged the output for revision. Decide whether the flagged issues actually
warrant another iteration, or whether the output is good enough to deliver as-is.

You must respond with ONLY a JSON object in this exact shape:
{
  "accept": true | false,
  "reason": "one sentence",
  "next_action": "deliver" | "revise"
}

No prose before or after the JSON."#;

/// System prompt carrying the agent's identity.
pub fn identity_system(agent: &Agent) -> String {
    let mut parts = vec![format!("You are {}, {}.", agent.name, agent.role)];
    parts.push(format!("Objective: {}", agent.objective));
    if !agent.background.is_empty() {
        parts.push(format!("Background: {}", agent.background));
    }
    if !agent.capabilities.is_empty() {
        parts.push(format!("Capabilities: {}", agent.capabilities));
    }
    parts.join("\n")
}

/// Generation prompt for one refine iteration. The first iteration states
/// the task; later iterations add the previous output and the reviewer's
/// feedback.
pub fn generation_prompt(
    task: &Task,
    context: &str,
    previous: Option<(&str, &str)>,
) -> String {
    let mut prompt = format!("Task: {}\n\n{}", task.title, task.description);

    if !context.is_empty() {
        prompt.push_str(&format!("\n\nContext from earlier tasks:\n{context}"));
    }
    if !task.expected_output.is_empty() {
        prompt.push_str(&format!("\n\nExpected output format: {}", task.expected_output));
    }

    if let Some((output, feedback)) = previous {
        prompt.push_str(&format!(
            "\n\nYour previous attempt:\n{output}\n\nReviewer feedback:\n{feedback}\n\n\
             Produce an improved version: address all weaknesses, keep the strengths, \
             and meet the expected output format."
        ));
    }

    prompt
}

/// Review prompt presenting the task and the output under review.
pub fn review_prompt(task: &Task, output: &str) -> String {
    format!(
        "Task: {}\n\n{}\n\nExpected output format: {}\n\nAgent output to review:\n{}",
        task.title, task.description, task.expected_output, output
    )
}

/// Final-check prompt for an output the reviewer flagged.
pub fn final_check_prompt(task: &Task, output: &str, feedback: &str) -> String {
    format!(
        "Task: {}\n\n{}\n\nFlagged output:\n{}\n\nReviewer concerns:\n{}",
        task.title, task.description, output, feedback
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::TaskType;

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Summarize".into(),
            description: "Summarize the report".into(),
            expected_output: "Three bullet points".into(),
            task_type: TaskType::Agentic,
            executor_id: None,
            sockets: Vec::new(),
        }
    }

    #[test]
    fn first_iteration_has_no_feedback_section() {
        let prompt = generation_prompt(&task(), "earlier output", None);
        assert!(prompt.contains("Summarize the report"));
        assert!(prompt.contains("earlier output"));
        assert!(prompt.contains("Three bullet points"));
        assert!(!prompt.contains("previous attempt"));
    }

    #[test]
    fn refine_iteration_carries_output_and_feedback() {
        let prompt = generation_prompt(&task(), "", Some(("draft", "too terse")));
        assert!(prompt.contains("draft"));
        assert!(prompt.contains("too terse"));
        assert!(prompt.contains("address all weaknesses"));
    }
}
