//! Graph assembly from validated entities and automations.

use serde_json::Value;

use super::extraction::extract_from_section;
use super::{NodeKind, Relation, RelationGraph};
use crate::model::{AutomationConfig, EntityState};

/// Build the relation graph for one ingestion cycle.
///
/// - one `entity` node per state, carrying `state`
/// - one `automation` node per config, carrying `alias`
/// - `trigger` edges entity -> automation, `action` edges automation -> entity
/// - `related` edges entity -> automation for fallback-only associations
///
/// Ids referenced by automations but absent from the snapshot become bare
/// entity nodes.
pub fn build_graph(entities: &[EntityState], automations: &[AutomationConfig]) -> RelationGraph {
    let mut graph = RelationGraph::new();

    for entity in entities {
        let node = graph.get_or_create(&entity.id);
        node.attributes
            .insert("state".to_string(), Value::String(entity.state.clone()));
    }

    for automation in automations {
        let node = graph.get_or_create(&automation.id);
        node.kind = NodeKind::Automation;
        node.label = automation.alias.clone().unwrap_or_else(|| automation.id.clone());
        node.attributes.insert(
            "alias".to_string(),
            automation
                .alias
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
    }

    for automation in automations {
        for entity_id in extract_from_section(&automation.trigger) {
            graph.add_edge(&entity_id, &automation.id, Relation::Trigger);
        }

        for entity_id in extract_from_section(&automation.action) {
            graph.add_edge(&automation.id, &entity_id, Relation::Action);
        }

        for related_id in &automation.related {
            graph.add_edge(related_id, &automation.id, Relation::Related);
        }
    }

    log::debug!(
        "Built relation graph: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    graph
}
