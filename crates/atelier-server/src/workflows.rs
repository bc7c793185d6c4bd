//! Workflow lookup over the client connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::info;
use uuid::Uuid;

use atelier_core::{RuntimeError, Workflow, WorkflowProvider};

use crate::protocol::{Frame, FRAME_RUN_WORKFLOW};

/// How long a `run_workflow` request waits for its `workflow_json` reply.
pub const WORKFLOW_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Replies awaiting their `workflow_json` frame, keyed by request id.
pub type PendingRequests = Arc<DashMap<String, oneshot::Sender<Value>>>;

/// Fetches workflow definitions from the connected client: generates a
/// request id, registers a one-shot listener, sends `run_workflow`, and
/// awaits the correlated `workflow_json` reply.
pub struct RemoteWorkflows {
    tx: UnboundedSender<Frame>,
    pending: PendingRequests,
}

impl RemoteWorkflows {
    pub fn new(tx: UnboundedSender<Frame>, pending: PendingRequests) -> Self {
        Self { tx, pending }
    }
}

#[async_trait]
impl WorkflowProvider for RemoteWorkflows {
    async fn fetch(&self, workflow_id: &str) -> Result<Workflow, RuntimeError> {
        let request_id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), reply_tx);

        let frame = Frame::new(FRAME_RUN_WORKFLOW, json!({ "workflowId": workflow_id }))
            .with_request_id(&request_id);
        if self.tx.send(frame).is_err() {
            self.pending.remove(&request_id);
            return Err(RuntimeError::RequestTimeout("client disconnected".into()));
        }

        info!("WORKFLOWS: requested '{}' from client ({})", workflow_id, request_id);

        let reply = tokio::time::timeout(WORKFLOW_REQUEST_TIMEOUT, reply_rx).await;
        self.pending.remove(&request_id);

        match reply {
            Ok(Ok(payload)) => serde_json::from_value(payload)
                .map_err(|e| RuntimeError::MalformedFrame(format!("workflow payload: {e}"))),
            Ok(Err(_)) => Err(RuntimeError::RequestTimeout("reply channel closed".into())),
            Err(_) => Err(RuntimeError::RequestTimeout(format!(
                "no workflow_json reply for '{workflow_id}' within 60s"
            ))),
        }
    }
}

/// In-process lookup first, client request as the fallback. The caller
/// wires both ends; nothing is feature-sniffed at runtime.
pub struct CompositeWorkflows {
    local: Arc<dyn WorkflowProvider>,
    remote: Arc<dyn WorkflowProvider>,
}

impl CompositeWorkflows {
    pub fn new(local: Arc<dyn WorkflowProvider>, remote: Arc<dyn WorkflowProvider>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl WorkflowProvider for CompositeWorkflows {
    async fn fetch(&self, workflow_id: &str) -> Result<Workflow, RuntimeError> {
        match self.local.fetch(workflow_id).await {
            Ok(workflow) => Ok(workflow),
            Err(_) => self.remote.fetch(workflow_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough_workflow() -> Value {
        json!({
            "id": "wf-1",
            "name": "Remote",
            "nodes": [],
            "connections": []
        })
    }

    #[tokio::test]
    async fn correlated_reply_resolves_the_fetch() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pending: PendingRequests = Arc::new(DashMap::new());
        let provider = RemoteWorkflows::new(tx, pending.clone());

        let answering = tokio::spawn({
            let pending = pending.clone();
            async move {
                let frame = rx.recv().await.unwrap();
                assert_eq!(frame.frame_type, FRAME_RUN_WORKFLOW);
                let request_id = frame.request_id.unwrap();
                let (_, reply_tx) = pending.remove(&request_id).unwrap();
                reply_tx.send(passthrough_workflow()).unwrap();
            }
        });

        let workflow = provider.fetch("wf-1").await.unwrap();
        assert_eq!(workflow.id, "wf-1");
        answering.await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let pending: PendingRequests = Arc::new(DashMap::new());
        let provider = RemoteWorkflows::new(tx, pending.clone());

        let err = provider.fetch("wf-ghost").await.unwrap_err();
        assert!(matches!(err, RuntimeError::RequestTimeout(_)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_reported() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pending: PendingRequests = Arc::new(DashMap::new());
        let provider = RemoteWorkflows::new(tx, pending.clone());

        tokio::spawn({
            let pending = pending.clone();
            async move {
                let frame = rx.recv().await.unwrap();
                let request_id = frame.request_id.unwrap();
                let (_, reply_tx) = pending.remove(&request_id).unwrap();
                reply_tx.send(json!({ "not": "a workflow" })).unwrap();
            }
        });

        let err = provider.fetch("wf-1").await.unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedFrame(_)));
    }
}
