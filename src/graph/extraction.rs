//! Entity reference extraction from automation configuration trees.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

const ENTITY_ID_KEY: &str = "entity_id";

/// Collect every entity id referenced anywhere in `node`.
///
/// A mapping key named `entity_id` contributes its string value, or every
/// string element of a list value. Every other value is searched recursively,
/// whatever its shape, so platform-specific nesting is handled without a schema.
pub fn extract_entity_ids(node: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect(node, &mut found);
    found
}

/// Same as [`extract_entity_ids`] over a normalized trigger/condition/action list
pub fn extract_from_section(section: &[Map<String, Value>]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for map in section {
        collect_map(map, &mut found);
    }
    found
}

fn collect(node: &Value, found: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => collect_map(map, found),
        Value::Array(items) => {
            for item in items {
                collect(item, found);
            }
        }
        _ => {}
    }
}

fn collect_map(map: &Map<String, Value>, found: &mut BTreeSet<String>) {
    for (key, value) in map {
        if key == ENTITY_ID_KEY {
            match value {
                Value::String(id) => {
                    found.insert(id.clone());
                }
                Value::Array(ids) => {
                    found.extend(ids.iter().filter_map(Value::as_str).map(str::to_string));
                }
                _ => {}
            }
        } else {
            collect(value, found);
        }
    }
}
