//! Topological layering for atelier graphs.
//!
//! Both execution levels — the task graph and the workflow node graph —
//! reduce to the same problem: given vertices and resolved directed edges,
//! produce layers such that every edge crosses from an earlier layer to a
//! later one. Entries within one layer have no inter-dependency and may run
//! in parallel.
//!
//! - [`layer`] — Kahn-style peeling with cycle detection
//! - [`Layering`] — the layers plus per-vertex direct predecessors
//! - [`GraphError`] — empty-graph and cycle failures
//!
//! # Example
//!
//! ```rust
//! use atelier_graph::layer;
//!
//! // a -> b, a -> c, b -> d, c -> d
//! let layering = layer(
//!     &["a", "b", "c", "d"],
//!     &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
//! )
//! .unwrap();
//!
//! assert_eq!(layering.layers.len(), 3);
//! assert_eq!(layering.layers[0], vec!["a"]);
//! assert_eq!(layering.layers[2], vec!["d"]);
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;

/// Layering failures. A cycle names one vertex whose indegree never
/// reached zero.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph is empty")]
    Empty,

    #[error("Cycle detected in graph at '{0}'")]
    Cycle(String),
}

/// Result of layering a DAG.
///
/// `layers` partitions the vertices; `predecessors` maps each vertex to its
/// direct predecessors in first-seen edge order. Consumers that depend on
/// commutativity must treat the predecessor list as a set.
#[derive(Debug, Clone)]
pub struct Layering<K> {
    pub layers: Vec<Vec<K>>,
    pub predecessors: HashMap<K, Vec<K>>,
}

impl<K> Layering<K>
where
    K: Eq + Hash,
{
    /// Direct predecessors of `vertex`, empty when it has none.
    pub fn preds(&self, vertex: &K) -> &[K] {
        self.predecessors
            .get(vertex)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Vertices flattened in layer order.
    pub fn flatten(&self) -> Vec<&K> {
        self.layers.iter().flatten().collect()
    }
}

/// Layers a graph given its vertices and resolved directed edges.
///
/// Self-edges are dropped and duplicate edges deduplicated before indegrees
/// are computed. Edges naming unknown vertices are ignored — resolution
/// against sockets happens before this call. Vertex order within a layer
/// follows the input vertex order but is not part of the contract.
pub fn layer<K>(vertices: &[K], edges: &[(K, K)]) -> Result<Layering<K>, GraphError>
where
    K: Eq + Hash + Clone + Display,
{
    if vertices.is_empty() {
        return Err(GraphError::Empty);
    }

    let mut indegree: HashMap<&K, usize> = vertices.iter().map(|v| (v, 0)).collect();
    let mut successors: HashMap<&K, Vec<&K>> = HashMap::new();
    let mut predecessors: HashMap<K, Vec<K>> = HashMap::new();
    let mut seen_edges: Vec<(&K, &K)> = Vec::new();

    for (from, to) in edges {
        if from == to {
            continue;
        }
        if !indegree.contains_key(from) || !indegree.contains_key(to) {
            continue;
        }
        if seen_edges.iter().any(|(f, t)| *f == from && *t == to) {
            continue;
        }
        seen_edges.push((from, to));

        *indegree.get_mut(to).expect("vertex present") += 1;
        successors.entry(from).or_default().push(to);
        predecessors.entry(to.clone()).or_default().push(from.clone());
    }

    let mut layers: Vec<Vec<K>> = Vec::new();
    let mut current: Vec<&K> = vertices
        .iter()
        .filter(|v| indegree[*v] == 0)
        .collect();
    let mut placed = 0usize;

    while !current.is_empty() {
        let mut next: Vec<&K> = Vec::new();
        for vertex in &current {
            if let Some(succ) = successors.get(*vertex) {
                for s in succ {
                    let d = indegree.get_mut(*s).expect("vertex present");
                    *d -= 1;
                    if *d == 0 {
                        next.push(*s);
                    }
                }
            }
        }
        placed += current.len();
        layers.push(current.iter().map(|v| (*v).clone()).collect());
        current = next;
    }

    if placed < vertices.len() {
        let stuck = vertices
            .iter()
            .find(|v| indegree[*v] > 0)
            .expect("unplaced vertex has positive indegree");
        return Err(GraphError::Cycle(stuck.to_string()));
    }

    Ok(Layering { layers, predecessors })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_vertex_single_layer() {
        let layering = layer(&["only"], &[]).unwrap();
        assert_eq!(layering.layers, vec![vec!["only"]]);
        assert!(layering.preds(&"only").is_empty());
    }

    #[test]
    fn empty_graph_fails() {
        let result = layer::<&str>(&[], &[]);
        assert_eq!(result.unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn diamond_layers_and_predecessors() {
        let layering = layer(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        )
        .unwrap();

        assert_eq!(layering.layers[0], vec!["a"]);
        let mut mid = layering.layers[1].clone();
        mid.sort();
        assert_eq!(mid, vec!["b", "c"]);
        assert_eq!(layering.layers[2], vec!["d"]);
        assert_eq!(layering.preds(&"d"), &["b", "c"]);
    }

    #[test]
    fn every_edge_crosses_layers_forward() {
        let vertices = ["v0", "v1", "v2", "v3", "v4", "v5"];
        let edges = [
            ("v0", "v2"),
            ("v1", "v2"),
            ("v2", "v3"),
            ("v2", "v4"),
            ("v3", "v5"),
            ("v4", "v5"),
        ];
        let layering = layer(&vertices, &edges).unwrap();

        let layer_of: HashMap<&str, usize> = layering
            .layers
            .iter()
            .enumerate()
            .flat_map(|(i, l)| l.iter().map(move |v| (*v, i)))
            .collect();

        for (from, to) in &edges {
            assert!(layer_of[from] < layer_of[to], "{from} -> {to}");
        }
        let total: usize = layering.layers.iter().map(|l| l.len()).sum();
        assert_eq!(total, vertices.len());
    }

    #[test]
    fn cycle_is_rejected() {
        let result = layer(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "b")]);
        match result {
            Err(GraphError::Cycle(vertex)) => assert!(vertex == "b" || vertex == "c"),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn self_edge_is_dropped() {
        let layering = layer(&["a", "b"], &[("a", "a"), ("a", "b")]).unwrap();
        assert_eq!(layering.layers, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn duplicate_edges_count_once() {
        let layering = layer(&["a", "b"], &[("a", "b"), ("a", "b")]).unwrap();
        assert_eq!(layering.layers, vec![vec!["a"], vec!["b"]]);
        assert_eq!(layering.preds(&"b"), &["a"]);
    }

    #[test]
    fn layering_is_idempotent_on_its_own_output() {
        let vertices = ["a", "b", "c", "d"];
        let edges = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")];
        let first = layer(&vertices, &edges).unwrap();
        let second = layer(&vertices, &edges).unwrap();

        fn as_sets<'a>(l: &'a Layering<&'a str>) -> Vec<Vec<&'a str>> {
            l.layers
                .iter()
                .map(|layer| {
                    let mut sorted = layer.clone();
                    sorted.sort();
                    sorted
                })
                .collect()
        }
        assert_eq!(as_sets(&first), as_sets(&second));
    }
}
