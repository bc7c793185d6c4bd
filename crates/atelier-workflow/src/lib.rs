//! Layer-parallel workflow runtime.
//!
//! Executes a [`Workflow`]'s node DAG: hydrates each declared node against
//! the registry, layers the graph, runs each layer's nodes concurrently,
//! and routes values from output sockets to the input sockets they feed.
//!
//! - [`WorkflowRunner`] — owns the registry and shared node services
//! - [`WorkflowRun`] — layers, per-node results, and the final result
//!
//! Per-node failure is recovered locally: a node that fails
//! infrastructurally contributes no outputs (downstream inputs are simply
//! absent), and the failure is reported on the event sink. Nodes that
//! catch their own errors surface an `Error: …` string downstream instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_workflow::WorkflowRunner;
//!
//! let runner = WorkflowRunner::new(registry, services);
//! let run = runner.execute(&workflow, sink.as_ref(), Some("hello")).await?;
//! println!("{}", run.final_result);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use atelier_core::{
    stringify, ConsoleEvent, EventKind, EventSink, RuntimeError, SocketDirection, Workflow,
    WorkflowOutputEvent,
};
use atelier_graph::{layer, GraphError};
use atelier_nodes::{NodeOutputs, NodeRegistry, NodeServices, RuntimeNode};

/// Result of one workflow execution.
#[derive(Debug)]
pub struct WorkflowRun {
    /// Node ids grouped into the executed layers.
    pub layers: Vec<Vec<u64>>,
    /// Outputs per node, keyed by node id then output socket id. Failed
    /// nodes are absent.
    pub node_results: HashMap<u64, NodeOutputs>,
    /// Output of the first node in the last executed layer.
    pub final_result: String,
}

/// Routing tables built once per execution.
struct Routing {
    socket_to_node: HashMap<u64, u64>,
    /// Input socket → the output socket feeding it.
    edge: HashMap<u64, u64>,
    /// Resolved node-level edges for layering.
    node_edges: Vec<(u64, u64)>,
}

/// Executes workflows against a node registry.
pub struct WorkflowRunner {
    registry: Arc<NodeRegistry>,
    services: Arc<NodeServices>,
}

impl WorkflowRunner {
    pub fn new(registry: Arc<NodeRegistry>, services: Arc<NodeServices>) -> Self {
        Self { registry, services }
    }

    pub fn services(&self) -> Arc<NodeServices> {
        Arc::clone(&self.services)
    }

    fn build_routing(
        workflow: &Workflow,
        nodes: &HashMap<u64, RuntimeNode>,
    ) -> Result<Routing, RuntimeError> {
        let mut sockets = HashMap::new();
        let mut socket_to_node = HashMap::new();
        for node in nodes.values() {
            for socket in &node.spec.sockets {
                sockets.insert(socket.id, (node.id(), socket.direction, socket.data_type));
                socket_to_node.insert(socket.id, node.id());
            }
        }

        let mut edge = HashMap::new();
        let mut node_edges = Vec::new();
        for connection in &workflow.connections {
            let &(from_node, from_dir, from_type) = sockets
                .get(&connection.from_socket_id)
                .ok_or(RuntimeError::SocketNotResolved(connection.from_socket_id))?;
            let &(to_node, to_dir, to_type) = sockets
                .get(&connection.to_socket_id)
                .ok_or(RuntimeError::SocketNotResolved(connection.to_socket_id))?;

            // A connection must leave an output and enter an input.
            if from_dir != SocketDirection::Output {
                return Err(RuntimeError::SocketNotResolved(connection.from_socket_id));
            }
            if to_dir != SocketDirection::Input {
                return Err(RuntimeError::SocketNotResolved(connection.to_socket_id));
            }
            if !from_type.compatible_with(to_type) {
                warn!(
                    "WORKFLOW: connection {} -> {} joins {:?} to {:?}",
                    connection.from_socket_id, connection.to_socket_id, from_type, to_type
                );
            }

            edge.insert(connection.to_socket_id, connection.from_socket_id);
            node_edges.push((from_node, to_node));
        }

        Ok(Routing {
            socket_to_node,
            edge,
            node_edges,
        })
    }

    /// Assembles the input map for one node from its predecessors' stored
    /// outputs. Unrouted or unproduced inputs stay absent; the node decides
    /// what that means.
    fn assemble_inputs(
        node: &RuntimeNode,
        routing: &Routing,
        results: &HashMap<u64, NodeOutputs>,
    ) -> HashMap<u64, Value> {
        let mut inputs = HashMap::new();
        for socket in node.spec.input_sockets() {
            let Some(&source_socket) = routing.edge.get(&socket) else {
                continue;
            };
            let Some(&source_node) = routing.socket_to_node.get(&source_socket) else {
                continue;
            };
            let Some(source_outputs) = results.get(&source_node) else {
                continue;
            };
            if let Some(value) = source_outputs.get(&source_socket) {
                inputs.insert(socket, value.clone());
            }
        }
        inputs
    }

    /// Runs the workflow to completion.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        sink: &dyn EventSink,
        root_input: Option<&str>,
    ) -> Result<WorkflowRun, RuntimeError> {
        info!("WORKFLOW '{}': hydrating {} nodes", workflow.name, workflow.nodes.len());

        let mut nodes: HashMap<u64, RuntimeNode> = HashMap::new();
        for spec in &workflow.nodes {
            nodes.insert(spec.id, self.registry.hydrate(spec)?);
        }

        let routing = Self::build_routing(workflow, &nodes)?;

        let node_ids: Vec<u64> = workflow.nodes.iter().map(|n| n.id).collect();
        let layering = layer(&node_ids, &routing.node_edges).map_err(|e| match e {
            GraphError::Empty => RuntimeError::EmptyGraph,
            GraphError::Cycle(at) => RuntimeError::CycleDetected(at),
        })?;

        info!(
            "WORKFLOW '{}': {} layers over {} nodes",
            workflow.name,
            layering.layers.len(),
            node_ids.len()
        );

        let mut results: HashMap<u64, NodeOutputs> = HashMap::new();

        for current in &layering.layers {
            let tasks = current.iter().map(|node_id| {
                let node = &nodes[node_id];
                let inputs = Self::assemble_inputs(node, &routing, &results);
                let root = node.is_workflow_input().then_some(root_input).flatten();
                let services = &self.services;
                async move {
                    let outcome = node.process(inputs, root, services).await;
                    match &outcome {
                        Ok(outputs) => {
                            let details = serde_json::to_string(
                                &outputs
                                    .iter()
                                    .map(|(socket, value)| (socket.to_string(), value.clone()))
                                    .collect::<HashMap<_, _>>(),
                            )
                            .unwrap_or_default();
                            sink.workflow_output(WorkflowOutputEvent::info(node.title(), details))
                                .await;
                        }
                        Err(e) => {
                            warn!("WORKFLOW: node '{}' failed: {}", node.title(), e);
                            sink.console(ConsoleEvent::new(
                                EventKind::Error,
                                format!("Node '{}' failed: {}", node.title(), e),
                            ))
                            .await;
                        }
                    }
                    (*node_id, outcome)
                }
            });

            for (node_id, outcome) in join_all(tasks).await {
                if let Ok(outputs) = outcome {
                    results.insert(node_id, outputs);
                }
            }
        }

        let final_result = layering
            .layers
            .last()
            .and_then(|last| last.first())
            .and_then(|node_id| {
                let node = &nodes[node_id];
                let outputs = results.get(node_id)?;
                match node.spec.output_sockets().first() {
                    Some(primary) => outputs.get(primary).map(stringify),
                    None => serde_json::to_string(
                        &outputs
                            .iter()
                            .map(|(socket, value)| (socket.to_string(), value.clone()))
                            .collect::<HashMap<_, _>>(),
                    )
                    .ok(),
                }
            })
            .unwrap_or_default();

        info!("WORKFLOW '{}': complete", workflow.name);

        Ok(WorkflowRun {
            layers: layering.layers,
            node_results: results,
            final_result,
        })
    }
}
