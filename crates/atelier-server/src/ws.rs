//! Per-connection WebSocket handling.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use atelier_core::{ConsoleEvent, EventKind, WorkflowProvider};
use atelier_orchestrator::{AgentVariant, InProcessWorkflows, WorkspaceRunner};

use crate::protocol::{
    Frame, RunWorkspacePayload, FRAME_MESSAGE, FRAME_RUN_WORKSPACE, FRAME_WORKFLOW_JSON,
};
use crate::sink::ChannelSink;
use crate::workflows::{CompositeWorkflows, PendingRequests, RemoteWorkflows};
use crate::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let pending: PendingRequests = Arc::new(DashMap::new());

    // Outbound pump: every frame the runtimes emit goes through here.
    let pump = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame: Frame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                error!("WS: malformed frame: {}", e);
                let event = ConsoleEvent::new(EventKind::Error, format!("Malformed frame: {e}"));
                let _ = tx.send(Frame::new(
                    FRAME_MESSAGE,
                    serde_json::to_value(&event).unwrap_or(json!({})),
                ));
                continue;
            }
        };

        match frame.frame_type.as_str() {
            FRAME_RUN_WORKSPACE => {
                let payload: RunWorkspacePayload =
                    match serde_json::from_value(frame.data.clone()) {
                        Ok(payload) => payload,
                        // A bare workspace object is accepted too.
                        Err(_) => match serde_json::from_value(frame.data) {
                            Ok(workspace) => RunWorkspacePayload { workspace, agent_variant: None },
                            Err(e) => {
                                error!("WS: run_workspace payload: {}", e);
                                let event = ConsoleEvent::new(
                                    EventKind::Error,
                                    format!("Malformed workspace: {e}"),
                                );
                                let _ = tx.send(Frame::new(
                                    FRAME_MESSAGE,
                                    serde_json::to_value(&event).unwrap_or(json!({})),
                                ));
                                continue;
                            }
                        },
                    };

                info!(
                    "WS: run_workspace '{}' (variant {:?})",
                    payload.workspace.name, payload.agent_variant
                );

                let runner = WorkspaceRunner::new(Arc::clone(&state.registry))
                    .with_output_dir(state.output_dir.clone())
                    .with_agent_variant(AgentVariant::from_id(payload.agent_variant.as_deref()));
                let sink = Arc::new(ChannelSink::new(tx.clone()));
                let local = Arc::new(InProcessWorkflows::from_workspace(&payload.workspace));
                let remote = Arc::new(RemoteWorkflows::new(tx.clone(), Arc::clone(&pending)));
                let workflows: Arc<dyn WorkflowProvider> =
                    Arc::new(CompositeWorkflows::new(local, remote));

                // Run in its own task so this loop keeps serving
                // workflow_json replies while the workspace executes.
                tokio::spawn(async move {
                    if let Err(e) = runner.run(&payload.workspace, sink, workflows).await {
                        error!("WS: workspace run failed: {}", e);
                    }
                });
            }
            FRAME_WORKFLOW_JSON => {
                let Some(request_id) = frame.request_id else {
                    warn!("WS: workflow_json without requestId");
                    continue;
                };
                match pending.remove(&request_id) {
                    Some((_, reply_tx)) => {
                        let _ = reply_tx.send(frame.data);
                    }
                    None => warn!("WS: no pending request '{}'", request_id),
                }
            }
            other => warn!("WS: unhandled frame type '{}'", other),
        }
    }

    pump.abort();
    info!("WS: connection closed");
}
