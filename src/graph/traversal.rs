//! BFS neighbourhood extraction around a node (the UI's per-automation view).

use std::collections::{HashSet, VecDeque};

use super::RelationGraph;

/// Subgraph reachable from `center` within `max_depth` hops, ignoring direction.
///
/// Edges are kept when they were followed during the search, so depth 1
/// yields exactly the edges touching `center` and their endpoints. Returns
/// `None` when `center` is not in the graph.
pub fn neighborhood(graph: &RelationGraph, center: &str, max_depth: usize) -> Option<RelationGraph> {
    let start = graph.node(center)?;

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let mut result = RelationGraph::new();

    visited.insert(center.to_string());
    queue.push_back((center.to_string(), 0));
    result.insert_node(start.clone());

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for edge in graph.incident_edges(&id) {
            let other = if edge.source == id { &edge.target } else { &edge.source };
            if visited.insert(other.clone()) {
                if let Some(node) = graph.node(other) {
                    result.insert_node(node.clone());
                }
                queue.push_back((other.clone(), depth + 1));
            }
            result.insert_edge(edge.clone());
        }
    }

    Some(result)
}
