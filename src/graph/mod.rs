//! Relation graph module: entity-reference extraction, graph assembly,
//! neighbourhood traversal and force-directed layout.
//!
//! Nodes live in a registry keyed by id; edges are unique by
//! `(source, target, relation)`. Every edge endpoint is guaranteed to have a
//! node because edges are only inserted through [`RelationGraph::add_edge`],
//! which goes through [`RelationGraph::get_or_create`].

mod builder;
mod extraction;
mod layout;
mod traversal;

pub use builder::build_graph;
pub use extraction::{extract_entity_ids, extract_from_section};
pub use layout::{layout, spring_layout, GraphPayload, LaidOutEdge, LaidOutNode, NodeData, Position};
pub use traversal::neighborhood;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Automation,
}

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// entity -> automation: the entity appears in a trigger
    Trigger,
    /// automation -> entity: the entity appears in an action
    Action,
    /// entity -> automation: controller-reported association, direction unknown
    Related,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Trigger => "trigger",
            Relation::Action => "action",
            Relation::Related => "related",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Automation alias when known, else the id
    pub label: String,
    pub attributes: Map<String, Value>,
}

impl GraphNode {
    fn implicit(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: NodeKind::Entity,
            label: id.to_string(),
            attributes: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
}

/// Directed graph of entities and automations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: BTreeSet<GraphEdge>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for `id`, creating a bare entity node if it is not registered yet
    pub fn get_or_create(&mut self, id: &str) -> &mut GraphNode {
        self.nodes
            .entry(id.to_string())
            .or_insert_with(|| GraphNode::implicit(id))
    }

    /// Insert an edge, registering both endpoints. Returns false for duplicates.
    pub fn add_edge(&mut self, source: &str, target: &str, relation: Relation) -> bool {
        self.get_or_create(source);
        self.get_or_create(target);
        self.edges.insert(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            relation,
        })
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges touching `id` in either direction
    pub fn incident_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == id || e.target == id)
    }

    /// Undirected adjacency as index lists, in node-registry order
    pub(crate) fn adjacency(&self) -> Vec<BTreeSet<usize>> {
        let index: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut adjacency = vec![BTreeSet::new(); self.nodes.len()];
        for edge in &self.edges {
            let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
                continue;
            };
            if s != t {
                adjacency[s].insert(t);
                adjacency[t].insert(s);
            }
        }
        adjacency
    }

    fn insert_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    fn insert_edge(&mut self, edge: GraphEdge) {
        self.edges.insert(edge);
    }
}
