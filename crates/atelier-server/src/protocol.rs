//! The bidirectional frame protocol.
//!
//! Every frame is a JSON object `{type, data, timestamp}` with optional
//! `id` and `requestId` for correlated request/reply exchanges.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const FRAME_RUN_WORKSPACE: &str = "run_workspace";
pub const FRAME_MESSAGE: &str = "message";
pub const FRAME_WORKFLOW_OUTPUT: &str = "workflow_output";
pub const FRAME_RUN_WORKFLOW: &str = "run_workflow";
pub const FRAME_WORKFLOW_JSON: &str = "workflow_json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Frame {
    pub fn new(frame_type: &str, data: Value) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            data,
            timestamp: Utc::now().to_rfc3339(),
            id: Some(Uuid::new_v4().to_string()),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Payload of a `run_workspace` frame: the workspace plus the agent
/// variant to use. A bare workspace object is accepted too.
#[derive(Debug, Deserialize)]
pub struct RunWorkspacePayload {
    pub workspace: atelier_core::Workspace,
    #[serde(default, rename = "agentVariant")]
    pub agent_variant: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_round_trips_with_optional_fields() {
        let frame = Frame::new(FRAME_RUN_WORKFLOW, json!("wf-1")).with_request_id("req-9");
        let raw = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&raw).unwrap();

        assert_eq!(back.frame_type, FRAME_RUN_WORKFLOW);
        assert_eq!(back.data, json!("wf-1"));
        assert_eq!(back.request_id.as_deref(), Some("req-9"));
        assert!(back.id.is_some());
    }

    #[test]
    fn frame_without_id_or_request_id_parses() {
        let back: Frame = serde_json::from_str(
            r#"{"type":"workflow_json","data":{},"timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(back.frame_type, FRAME_WORKFLOW_JSON);
        assert!(back.id.is_none());
        assert!(back.request_id.is_none());
    }
}
