//! Progress events and the outbound event sink.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Severity of a console event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    System,
    Info,
    Success,
    Error,
}

/// A structured progress record pushed to the client as execution proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEvent {
    pub id: String,
    pub timestamp: String,
    pub kind: EventKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
}

impl ConsoleEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind,
            message: message.into(),
            results: None,
        }
    }

    pub fn with_results(mut self, results: Value) -> Self {
        self.results = Some(results);
        self
    }
}

/// Emitted after each workflow node completes, carrying its serialized
/// output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutputEvent {
    pub id: String,
    pub timestamp: String,
    pub kind: EventKind,
    /// Title of the node that produced the output.
    pub message: String,
    pub details: String,
}

impl WorkflowOutputEvent {
    pub fn info(node_title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind: EventKind::Info,
            message: node_title.into(),
            details: details.into(),
        }
    }
}

/// Outbound channel for progress events.
///
/// Emission is best-effort: implementations must tolerate concurrent
/// emitters and must not fail the emitting runtime. A sink that blocks
/// blocks the emitter, which is acceptable.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn console(&self, event: ConsoleEvent);
    async fn workflow_output(&self, event: WorkflowOutputEvent);
}

/// Sink that discards everything.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn console(&self, _event: ConsoleEvent) {}
    async fn workflow_output(&self, _event: WorkflowOutputEvent) {}
}

/// Sink that buffers events in memory, in arrival order.
#[derive(Default)]
pub struct MemorySink {
    console: Mutex<Vec<ConsoleEvent>>,
    workflow: Mutex<Vec<WorkflowOutputEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn console_events(&self) -> Vec<ConsoleEvent> {
        self.console.lock().await.clone()
    }

    pub async fn workflow_events(&self) -> Vec<WorkflowOutputEvent> {
        self.workflow.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn console(&self, event: ConsoleEvent) {
        self.console.lock().await.push(event);
    }

    async fn workflow_output(&self, event: WorkflowOutputEvent) {
        self.workflow.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_preserves_order() {
        let sink = MemorySink::new();
        sink.console(ConsoleEvent::new(EventKind::Info, "first")).await;
        sink.console(ConsoleEvent::new(EventKind::Success, "second")).await;

        let events = sink.console_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].kind, EventKind::Success);
    }

    #[test]
    fn console_event_serializes_without_empty_results() {
        let event = ConsoleEvent::new(EventKind::Info, "hello");
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("results").is_none());
        assert_eq!(json["kind"], "info");
    }
}
