//! Stdio transport: a spawned server process, JSON-RPC over its standard
//! streams, one line per message.

use std::process::Stdio;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use atelier_core::RuntimeError;

use crate::protocol::{RpcEnvelope, RpcNotification, RpcRequest, JSONRPC_VERSION};

pub(crate) struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, RuntimeError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RuntimeError::McpConnectFailed(format!("spawn '{command}' failed: {e}"))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RuntimeError::McpConnectFailed("no stdin pipe".into()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| RuntimeError::McpConnectFailed("no stdout pipe".into()))?;

        debug!("MCP: spawned stdio server '{}'", command);
        Ok(Self { child, stdin, stdout })
    }

    async fn write_line(&mut self, payload: &str) -> Result<(), RuntimeError> {
        let write = async {
            self.stdin.write_all(payload.as_bytes()).await?;
            self.stdin.write_all(b"\n").await?;
            self.stdin.flush().await
        };
        write
            .await
            .map_err(|e| RuntimeError::McpCallFailed(format!("stdin write failed: {e}")))
    }

    /// Sends a request and reads replies until the matching id arrives.
    /// Server-initiated notifications are skipped.
    pub async fn request(&mut self, request: &RpcRequest) -> Result<Value, RuntimeError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        self.write_line(&payload).await?;

        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| RuntimeError::McpCallFailed(format!("stdout read failed: {e}")))?;
            if read == 0 {
                return Err(RuntimeError::McpCallFailed("server closed its stream".into()));
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let envelope: RpcEnvelope = match serde_json::from_str(line) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("MCP: skipping undecodable line: {}", e);
                    continue;
                }
            };

            match envelope.id {
                Some(id) if id == request.id => {
                    if let Some(error) = envelope.error {
                        return Err(RuntimeError::McpCallFailed(format!(
                            "{} ({})",
                            error.message, error.code
                        )));
                    }
                    return Ok(envelope.result.unwrap_or(Value::Null));
                }
                // Reply to someone else or a notification; keep reading.
                _ => continue,
            }
        }
    }

    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), RuntimeError> {
        let notification = RpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method: method.to_string(),
            params,
        };
        let payload = serde_json::to_string(&notification)
            .map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        self.write_line(&payload).await
    }

    pub async fn close(mut self) {
        let _ = self.child.kill().await;
    }
}
