//! Review and final-check verdicts produced by the agent runtime.

use serde::{Deserialize, Serialize};

/// Reviewer decision about the current agent output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// The output satisfies the task; stop iterating.
    Complete,
    /// The output needs another refine pass.
    NeedsRevision,
    /// The output misses the task badly; refine with full feedback.
    Inadequate,
}

/// Structured feedback the reviewer attaches to its verdict.
///
/// Missing fields default to empty so a terse reviewer reply still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewFeedback {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ReviewFeedback {
    /// Renders the feedback into the refine prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut sections = Vec::new();
        if !self.strengths.is_empty() {
            sections.push(format!("Strengths:\n- {}", self.strengths.join("\n- ")));
        }
        if !self.weaknesses.is_empty() {
            sections.push(format!("Weaknesses:\n- {}", self.weaknesses.join("\n- ")));
        }
        if !self.missing.is_empty() {
            sections.push(format!("Missing:\n- {}", self.missing.join("\n- ")));
        }
        if !self.suggestions.is_empty() {
            sections.push(format!("Suggestions:\n- {}", self.suggestions.join("\n- ")));
        }
        sections.join("\n\n")
    }
}

/// The reviewer's full verdict over one agent iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewVerdict {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub complete: bool,
    /// Accuracy score, 0–100.
    #[serde(default)]
    pub accuracy: u8,
    /// Clarity score, 0–100.
    #[serde(default)]
    pub clarity: u8,
    /// Overall score, 0–100.
    #[serde(default)]
    pub overall_score: u8,
    #[serde(default)]
    pub feedback: ReviewFeedback,
    pub status: ReviewStatus,
}

/// What to do next after a non-complete review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextAction {
    Deliver,
    Revise,
}

/// The final-check verdict: whether a flagged output is good enough to ship
/// anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalCheckVerdict {
    pub accept: bool,
    #[serde(default)]
    pub reason: String,
    pub next_action: NextAction,
}
