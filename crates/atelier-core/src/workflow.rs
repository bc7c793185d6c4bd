//! Workflow graph definitions: nodes, sockets, and connections.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuntimeError;
use crate::workspace::{ConfigParameter, SocketDirection};

/// A DAG of nodes executed by the workflow runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Workflow {
    /// Finds a declared node by id.
    pub fn node(&self, id: u64) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A declared node: what the client authored, before hydration against the
/// node registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    pub id: u64,
    /// Key into the node registry.
    pub node_type: String,
    #[serde(default)]
    pub title: String,
    /// Editor geometry; ignored by the runtime.
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub sockets: Vec<NodeSocket>,
    #[serde(default)]
    pub parameters: Vec<ConfigParameter>,
    /// Free-form value attached by the editor (e.g. inline text).
    #[serde(default)]
    pub node_value: Option<Value>,
}

impl NodeSpec {
    /// Input socket ids in declaration order.
    pub fn input_sockets(&self) -> Vec<u64> {
        self.sockets
            .iter()
            .filter(|s| s.direction == SocketDirection::Input)
            .map(|s| s.id)
            .collect()
    }

    /// Output socket ids in declaration order.
    pub fn output_sockets(&self) -> Vec<u64> {
        self.sockets
            .iter()
            .filter(|s| s.direction == SocketDirection::Output)
            .map(|s| s.id)
            .collect()
    }
}

/// Editor position of a node. Carried for round-tripping only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The declared value type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Json,
    Embedding,
    Url,
    #[default]
    Unknown,
}

impl DataType {
    /// Whether a value of `self` may flow into a socket of type `other`.
    ///
    /// `Unknown` is compatible with everything; otherwise types must match.
    pub fn compatible_with(&self, other: DataType) -> bool {
        matches!(self, DataType::Unknown)
            || matches!(other, DataType::Unknown)
            || *self == other
    }
}

/// A typed connection point on a node. Socket ids are unique within a
/// workflow and key the routing tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSocket {
    pub id: u64,
    pub direction: SocketDirection,
    #[serde(default)]
    pub data_type: DataType,
}

/// A directed edge between an output socket and an input socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_socket_id: u64,
    pub to_socket_id: u64,
}

/// Source of workflow definitions for runtimes that execute workflows by id.
///
/// The orchestrator wires an in-process lookup over the workspace; the
/// server wires a request/reply lookup over the client connection. Callers
/// choose — the runtime never sniffs which one it was given.
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    async fn fetch(&self, workflow_id: &str) -> Result<Workflow, RuntimeError>;
}
