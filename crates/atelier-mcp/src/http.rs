//! HTTP transport: streamable HTTP first, SSE session on fallback.
//!
//! Streamable HTTP is a plain JSON-RPC POST whose reply is either a JSON
//! body or a short event stream carrying the reply. Older servers instead
//! expose an SSE session: a long-lived GET stream that announces a message
//! endpoint, replies arriving as `message` events on the stream.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use atelier_core::RuntimeError;

use crate::protocol::{RpcEnvelope, RpcNotification, RpcRequest, JSONRPC_VERSION};

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send + Sync>>;

pub(crate) struct HttpTransport {
    client: Client,
    url: String,
    session: Option<SseSession>,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, RuntimeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RuntimeError::McpConnectFailed(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            session: None,
        })
    }

    pub async fn request(&mut self, request: &RpcRequest) -> Result<Value, RuntimeError> {
        if self.session.is_none() {
            match self.post_streamable(request).await {
                Ok(result) => return Ok(result),
                Err(RuntimeError::McpCallFailed(msg)) => {
                    return Err(RuntimeError::McpCallFailed(msg))
                }
                Err(err) => {
                    warn!("MCP: streamable HTTP failed ({err}), falling back to SSE");
                    let session = SseSession::open(&self.client, &self.url).await?;
                    self.session = Some(session);
                }
            }
        }

        let session = self.session.as_mut().expect("SSE session open");
        session.request(&self.client, request).await
    }

    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), RuntimeError> {
        let notification = RpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method: method.to_string(),
            params,
        };
        let target = match &self.session {
            Some(session) => session.endpoint.clone(),
            None => self.url.clone(),
        };
        self.client
            .post(&target)
            .header("content-type", "application/json")
            .json(&notification)
            .send()
            .await
            .map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        Ok(())
    }

    /// One streamable-HTTP round trip. `McpConnectFailed` marks transport
    /// failures eligible for the SSE fallback; `McpCallFailed` marks
    /// server-reported errors that fallback would not fix.
    async fn post_streamable(&self, request: &RpcRequest) -> Result<Value, RuntimeError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| RuntimeError::McpConnectFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::McpConnectFailed(format!("HTTP {status}")));
        }

        let is_event_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        if is_event_stream {
            let mut reader = SseReader::new(Box::pin(response.bytes_stream()));
            return wait_for_reply(&mut reader, request.id).await;
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope(envelope: RpcEnvelope) -> Result<Value, RuntimeError> {
    if let Some(error) = envelope.error {
        return Err(RuntimeError::McpCallFailed(format!(
            "{} ({})",
            error.message, error.code
        )));
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

async fn wait_for_reply(reader: &mut SseReader, id: u64) -> Result<Value, RuntimeError> {
    while let Some(event) = reader.next_event().await? {
        let Ok(envelope) = serde_json::from_str::<RpcEnvelope>(&event.data) else {
            continue;
        };
        if envelope.id == Some(id) {
            return unwrap_envelope(envelope);
        }
    }
    Err(RuntimeError::McpCallFailed("event stream ended before reply".into()))
}

/// A legacy SSE session: long-lived GET stream plus a message endpoint.
struct SseSession {
    endpoint: String,
    reader: SseReader,
}

impl SseSession {
    async fn open(client: &Client, url: &str) -> Result<Self, RuntimeError> {
        let response = client
            .get(url)
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| RuntimeError::McpConnectFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RuntimeError::McpConnectFailed(format!(
                "SSE handshake: HTTP {}",
                response.status()
            )));
        }

        let base = response.url().clone();
        let mut reader = SseReader::new(Box::pin(response.bytes_stream()));

        // The server's first event names the endpoint to POST messages to.
        while let Some(event) = reader.next_event().await? {
            if event.name.as_deref() == Some("endpoint") {
                let endpoint = base
                    .join(event.data.trim())
                    .map_err(|e| RuntimeError::McpConnectFailed(e.to_string()))?
                    .to_string();
                debug!("MCP: SSE session endpoint {}", endpoint);
                return Ok(Self { endpoint, reader });
            }
        }

        Err(RuntimeError::McpConnectFailed("SSE stream ended before endpoint event".into()))
    }

    async fn request(&mut self, client: &Client, request: &RpcRequest) -> Result<Value, RuntimeError> {
        client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| RuntimeError::McpCallFailed(e.to_string()))?;

        wait_for_reply(&mut self.reader, request.id).await
    }
}

struct SseEvent {
    name: Option<String>,
    data: String,
}

/// Minimal SSE parser over a byte stream: `event:`/`data:` fields, events
/// separated by a blank line.
struct SseReader {
    stream: ByteStream,
    buffer: String,
}

impl SseReader {
    fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            buffer: String::new(),
        }
    }

    async fn next_event(&mut self) -> Result<Option<SseEvent>, RuntimeError> {
        loop {
            if let Some(boundary) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..boundary + 2).collect();
                if let Some(event) = parse_event(&raw) {
                    return Ok(Some(event));
                }
                continue;
            }

            match self.stream.next().await {
                Some(Ok(bytes)) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    // Normalize CRLF so the boundary scan stays simple.
                    self.buffer = self.buffer.replace("\r\n", "\n");
                }
                Some(Err(e)) => return Err(RuntimeError::McpCallFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut name = None;
    let mut data_lines = Vec::new();

    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }

    if name.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        name,
        data: data_lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn reader_over(chunks: Vec<&'static str>) -> SseReader {
        let stream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes()))),
        );
        SseReader::new(Box::pin(stream))
    }

    #[tokio::test]
    async fn parses_events_split_across_chunks() {
        let mut reader = reader_over(vec![
            "event: endpoint\nda",
            "ta: /messages?session=1\n\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n",
        ]);

        let first = reader.next_event().await.unwrap().unwrap();
        assert_eq!(first.name.as_deref(), Some("endpoint"));
        assert_eq!(first.data, "/messages?session=1");

        let second = reader.next_event().await.unwrap().unwrap();
        assert!(second.name.is_none());
        assert!(second.data.contains("\"id\":1"));

        assert!(reader.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_comment_only_blocks() {
        let mut reader = reader_over(vec![": keepalive\n\n", "data: x\n\n"]);
        let event = reader.next_event().await.unwrap().unwrap();
        assert_eq!(event.data, "x");
    }
}
