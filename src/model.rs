//! Validated entity and automation records.
//!
//! Everything the controller returns is loosely typed JSON. The functions here
//! are the boundary where raw payloads become [`EntityState`] and
//! [`AutomationConfig`]; a malformed record is dropped with a warning and never
//! fails the batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HagraphError, Result};

/// Namespace prefix of automation entities in the state snapshot.
pub const AUTOMATION_PREFIX: &str = "automation.";

/// One controller-reported entity, e.g. `light.kitchen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Shape of an item of `GET /api/states`.
#[derive(Deserialize)]
struct RawState {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl EntityState {
    /// Validate a single state object from the REST API
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawState = serde_json::from_value(value)
            .map_err(|e| HagraphError::Parse(format!("invalid entity state: {}", e)))?;
        Ok(Self {
            id: raw.entity_id,
            state: raw.state,
            attributes: raw.attributes,
        })
    }

    pub fn is_automation(&self) -> bool {
        self.id.starts_with(AUTOMATION_PREFIX)
    }

    /// Attribute value as a string, if present and a string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// A controller-defined automation rule.
///
/// `trigger`, `condition` and `action` are always sequences, even when the
/// controller returned a single mapping or nothing at all. `related` is only
/// filled by the state-scan fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub id: String,
    pub alias: Option<String>,
    #[serde(default)]
    pub trigger: Vec<Map<String, Value>>,
    #[serde(default)]
    pub condition: Vec<Map<String, Value>>,
    #[serde(default)]
    pub action: Vec<Map<String, Value>>,
    #[serde(default)]
    pub related: Vec<String>,
}

impl AutomationConfig {
    /// Stub automation for a state entity when no structured config exists.
    ///
    /// The id is `attributes.id` when the controller exposes one, otherwise the
    /// entity id itself; the alias is `attributes.friendly_name`.
    pub fn from_entity(entity: &EntityState) -> Self {
        let id = match entity.attributes.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => entity.id.clone(),
        };
        Self {
            id,
            alias: entity.attribute_str("friendly_name").map(str::to_string),
            ..Default::default()
        }
    }

    /// Validate one automation config object (REST or WebSocket list item)
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| HagraphError::Parse("automation config is not an object".to_string()))?;

        let id = match obj.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(HagraphError::Parse("automation config has no id".to_string())),
        };

        let alias = match obj.get("alias") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(HagraphError::Parse(format!(
                    "automation {} has a non-string alias: {}",
                    id, other
                )))
            }
        };

        let related = match obj.get("related") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(_) => {
                return Err(HagraphError::Parse(format!(
                    "automation {} has a non-list related field",
                    id
                )))
            }
        };

        Ok(Self {
            trigger: section(obj, &id, "trigger", "triggers")?,
            condition: section(obj, &id, "condition", "conditions")?,
            action: section(obj, &id, "action", "actions")?,
            id,
            alias,
            related,
        })
    }
}

/// Normalize a trigger/condition/action field into a sequence of mappings.
fn section(
    obj: &Map<String, Value>,
    id: &str,
    singular: &str,
    plural: &str,
) -> Result<Vec<Map<String, Value>>> {
    let value = obj.get(singular).or_else(|| obj.get(plural));
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(vec![map.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map.clone()),
                other => Err(HagraphError::Parse(format!(
                    "automation {} has a non-mapping {} item: {}",
                    id, singular, other
                ))),
            })
            .collect(),
        Some(other) => Err(HagraphError::Parse(format!(
            "automation {} has an invalid {} field: {}",
            id, singular, other
        ))),
    }
}

/// Validate a batch of raw state objects, dropping malformed ones
pub fn parse_entities(values: Vec<Value>) -> Vec<EntityState> {
    let mut entities = Vec::with_capacity(values.len());
    for value in values {
        match EntityState::from_value(value) {
            Ok(entity) => entities.push(entity),
            Err(e) => log::warn!("Skipping entity: {}", e),
        }
    }
    entities
}

/// Validate a batch of raw automation configs, dropping malformed ones
pub fn parse_automations(values: &[Value]) -> Vec<AutomationConfig> {
    values
        .iter()
        .filter_map(|value| match AutomationConfig::from_value(value) {
            Ok(automation) => Some(automation),
            Err(e) => {
                log::warn!("Skipping automation: {}", e);
                None
            }
        })
        .collect()
}
