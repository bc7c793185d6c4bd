//! Event sink that forwards runtime events to the connected client.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use atelier_core::{ConsoleEvent, EventSink, WorkflowOutputEvent};

use crate::protocol::{Frame, FRAME_MESSAGE, FRAME_WORKFLOW_OUTPUT};

/// Pushes events onto the connection's outbound frame channel. Sends are
/// best-effort: a gone client drops the events, never the run.
pub struct ChannelSink {
    tx: UnboundedSender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<Frame>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn console(&self, event: ConsoleEvent) {
        let data = match serde_json::to_value(&event) {
            Ok(data) => data,
            Err(e) => {
                debug!("SINK: dropping unserializable event: {}", e);
                return;
            }
        };
        let _ = self.tx.send(Frame::new(FRAME_MESSAGE, data));
    }

    async fn workflow_output(&self, event: WorkflowOutputEvent) {
        let data = match serde_json::to_value(&event) {
            Ok(data) => data,
            Err(e) => {
                debug!("SINK: dropping unserializable event: {}", e);
                return;
            }
        };
        let _ = self.tx.send(Frame::new(FRAME_WORKFLOW_OUTPUT, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::EventKind;

    #[tokio::test]
    async fn events_become_frames_on_the_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        sink.console(ConsoleEvent::new(EventKind::Info, "hello")).await;
        sink.workflow_output(WorkflowOutputEvent::info("Join", "{}")).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.frame_type, FRAME_MESSAGE);
        assert_eq!(first.data["message"], "hello");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.frame_type, FRAME_WORKFLOW_OUTPUT);
        assert_eq!(second.data["message"], "Join");
    }

    #[tokio::test]
    async fn closed_channel_does_not_panic() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);
        sink.console(ConsoleEvent::new(EventKind::Error, "late")).await;
    }
}
