//! Force-directed layout and the React Flow wire format.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{NodeKind, Relation, RelationGraph};
use crate::config::LayoutConfig;

/// Minimum distance used in force computations
const MIN_DISTANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub details: Map<String, Value>,
}

/// Node as consumed by the graph UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaidOutNode {
    pub id: String,
    /// React Flow node renderer
    #[serde(rename = "type")]
    pub node_type: String,
    pub data: NodeData,
    pub position: Position,
}

/// Edge as consumed by the graph UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaidOutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Relation,
    pub animated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<LaidOutNode>,
    pub edges: Vec<LaidOutEdge>,
}

impl GraphPayload {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Lay out `graph` and serialize it for the UI.
///
/// An empty graph short-circuits to an empty payload. Positions come from a
/// randomly seeded spring simulation, so they differ between calls.
pub fn layout(graph: &RelationGraph, config: &LayoutConfig) -> GraphPayload {
    if graph.is_empty() {
        return GraphPayload::default();
    }

    let positions = spring_layout(
        &graph.adjacency(),
        config.k,
        config.iterations,
        &mut rand::thread_rng(),
    );

    let nodes = graph
        .nodes()
        .zip(positions)
        .map(|(node, (x, y))| LaidOutNode {
            id: node.id.clone(),
            node_type: "default".to_string(),
            data: NodeData {
                label: node.label.clone(),
                kind: node.kind,
                details: node.attributes.clone(),
            },
            position: Position {
                x: x * config.scale,
                y: y * config.scale,
            },
        })
        .collect();

    let edges = graph
        .edges()
        .map(|edge| LaidOutEdge {
            id: format!("e-{}-{}-{}", edge.source, edge.target, edge.relation),
            source: edge.source.clone(),
            target: edge.target.clone(),
            label: edge.relation,
            animated: edge.relation == Relation::Trigger,
        })
        .collect();

    GraphPayload { nodes, edges }
}

/// Fruchterman-Reingold spring layout over an undirected adjacency list.
///
/// Starts from uniform random positions in the unit square, uses `k` as the
/// optimal distance and a temperature that cools linearly to zero over
/// `iterations` steps. The result is centred on the origin and rescaled so
/// the largest absolute coordinate is 1. A single node sits at the origin.
pub fn spring_layout<R: Rng + ?Sized>(
    adjacency: &[BTreeSet<usize>],
    k: f64,
    iterations: usize,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    let n = adjacency.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![(0.0, 0.0)];
    }

    let mut pos: Vec<(f64, f64)> = (0..n).map(|_| (rng.gen::<f64>(), rng.gen::<f64>())).collect();

    let (min_x, max_x) = bounds(pos.iter().map(|p| p.0));
    let (min_y, max_y) = bounds(pos.iter().map(|p| p.1));
    let mut temperature = (max_x - min_x).max(max_y - min_y) * 0.1;
    let cooling = temperature / (iterations as f64 + 1.0);

    let mut displacement = vec![(0.0_f64, 0.0_f64); n];
    for _ in 0..iterations {
        for d in displacement.iter_mut() {
            *d = (0.0, 0.0);
        }

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = pos[i].0 - pos[j].0;
                let dy = pos[i].1 - pos[j].1;
                let distance = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let attraction = if adjacency[i].contains(&j) { distance / k } else { 0.0 };
                let force = k * k / (distance * distance) - attraction;
                displacement[i].0 += dx * force;
                displacement[i].1 += dy * force;
            }
        }

        for i in 0..n {
            let (dx, dy) = displacement[i];
            let length = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            pos[i].0 += dx * temperature / length;
            pos[i].1 += dy * temperature / length;
        }

        temperature -= cooling;
    }

    rescale(&mut pos);
    pos
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Centre on the mean and scale into [-1, 1]
fn rescale(pos: &mut [(f64, f64)]) {
    let n = pos.len() as f64;
    let mean_x = pos.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pos.iter().map(|p| p.1).sum::<f64>() / n;

    let mut limit: f64 = 0.0;
    for p in pos.iter_mut() {
        p.0 -= mean_x;
        p.1 -= mean_y;
        limit = limit.max(p.0.abs()).max(p.1.abs());
    }

    if limit > 0.0 && limit.is_finite() {
        for p in pos.iter_mut() {
            p.0 /= limit;
            p.1 /= limit;
        }
    }
}
