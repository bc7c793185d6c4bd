//! Per-run registry of open MCP clients.

use std::collections::HashMap;

use tracing::warn;

use atelier_core::{McpTransportConfig, RuntimeError};

use crate::client::McpClient;

/// Clients opened by one runtime, keyed by server name.
///
/// The registry is owned by the run that created it and must be released
/// with [`McpRegistry::close_all`] on every exit path — dropping it only
/// kills stdio children via `kill_on_drop`, which skips the graceful path.
#[derive(Default)]
pub struct McpRegistry {
    clients: HashMap<String, McpClient>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to `server_name` unless a client is already open for it.
    pub async fn connect(
        &mut self,
        server_name: &str,
        config: &McpTransportConfig,
    ) -> Result<&mut McpClient, RuntimeError> {
        if !self.clients.contains_key(server_name) {
            let client = McpClient::connect(server_name, config).await?;
            self.clients.insert(server_name.to_string(), client);
        }
        Ok(self
            .clients
            .get_mut(server_name)
            .expect("client inserted above"))
    }

    pub fn get_mut(&mut self, server_name: &str) -> Option<&mut McpClient> {
        self.clients.get_mut(server_name)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Releases every open client.
    pub async fn close_all(&mut self) {
        for (name, client) in self.clients.drain() {
            if name != client.server_name() {
                warn!("MCP: registry key '{}' does not match client", name);
            }
            client.close().await;
        }
    }
}
