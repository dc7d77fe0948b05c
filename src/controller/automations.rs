//! Automation discovery with ordered fallback tiers.
//!
//! 1. `config/automation/list` over the WebSocket API (full configs).
//! 2. Optionally the legacy REST path `/api/config/automation`.
//! 3. Scan `/api/states` for `automation.*` entities and enrich each stub with
//!    `search/related`, since no trigger/action structure is available there.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::{ControllerClient, RelatedResolver};
use crate::error::{HagraphError, Result};
use crate::model::{parse_automations, parse_entities, AutomationConfig};

/// Which tier produced the automation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationSource {
    ListCommand,
    LegacyRest,
    StateScan,
}

/// Fetches automation configs, degrading through the fallback tiers
#[derive(Clone)]
pub struct AutomationFetcher {
    client: Arc<ControllerClient>,
    related: RelatedResolver,
    legacy_rest: bool,
}

impl AutomationFetcher {
    pub fn new(client: Arc<ControllerClient>, related: RelatedResolver, legacy_rest: bool) -> Self {
        Self {
            client,
            related,
            legacy_rest,
        }
    }

    /// All automations known to the controller; an empty list is a valid answer
    pub async fn fetch_automations(&self) -> Result<Vec<AutomationConfig>> {
        self.fetch_automations_with_source()
            .await
            .map(|(_, automations)| automations)
    }

    pub async fn fetch_automations_with_source(
        &self,
    ) -> Result<(AutomationSource, Vec<AutomationConfig>)> {
        let list_error = match self.from_list_command().await {
            Ok(automations) => {
                log::info!("Fetched {} automations via config/automation/list", automations.len());
                return Ok((AutomationSource::ListCommand, automations));
            }
            Err(e) => {
                log::warn!("config/automation/list unavailable, falling back: {}", e);
                e
            }
        };

        let mut legacy_error = None;
        if self.legacy_rest {
            match self.from_legacy_rest().await {
                Ok(automations) => {
                    log::info!("Fetched {} automations via /api/config/automation", automations.len());
                    return Ok((AutomationSource::LegacyRest, automations));
                }
                Err(e) => {
                    log::warn!("/api/config/automation unavailable, falling back: {}", e);
                    legacy_error = Some(e);
                }
            }
        }

        match self.from_state_scan().await {
            Ok(automations) => {
                log::info!("Synthesized {} automations from state snapshot", automations.len());
                Ok((AutomationSource::StateScan, automations))
            }
            Err(e) => {
                let legacy = legacy_error
                    .map(|le| format!("legacy REST failed ({}); ", le))
                    .unwrap_or_default();
                Err(HagraphError::AutomationFetch(format!(
                    "list command failed ({}); {}state scan failed ({})",
                    list_error, legacy, e
                )))
            }
        }
    }

    async fn from_list_command(&self) -> Result<Vec<AutomationConfig>> {
        let mut session = self.client.open_session().await?;
        let result = session.call("config/automation/list", Value::Null).await;
        session.close().await;

        match result? {
            Value::Array(items) => Ok(parse_automations(&items)),
            other => Err(HagraphError::Parse(format!(
                "config/automation/list returned a non-list result: {}",
                other
            ))),
        }
    }

    async fn from_legacy_rest(&self) -> Result<Vec<AutomationConfig>> {
        let items = self.client.fetch_automation_configs_rest().await?;
        Ok(parse_automations(&items))
    }

    /// State-scan tier, with related items attached to every stub
    async fn from_state_scan(&self) -> Result<Vec<AutomationConfig>> {
        let entities = parse_entities(self.client.fetch_states().await?);

        let stubs: Vec<(String, AutomationConfig)> = entities
            .iter()
            .filter(|entity| entity.is_automation())
            .map(|entity| (entity.id.clone(), AutomationConfig::from_entity(entity)))
            .collect();

        let handles: Vec<_> = stubs
            .iter()
            .map(|(entity_id, _)| {
                let resolver = self.related.clone();
                let entity_id = entity_id.clone();
                tokio::spawn(async move { resolver.resolve_related(&entity_id).await })
            })
            .collect();

        let mut automations = Vec::with_capacity(stubs.len());
        for ((entity_id, mut automation), handle) in stubs.into_iter().zip(handles) {
            automation.related = match handle.await {
                Ok(related) => related,
                Err(e) => {
                    log::warn!("Related-items task for {} failed: {}", entity_id, e);
                    Vec::new()
                }
            };
            automations.push(automation);
        }

        Ok(automations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::MockController;
    use serde_json::json;

    fn states_fixture() -> Value {
        json!([
            {"entity_id": "light.kitchen", "state": "on", "attributes": {}},
            {"entity_id": "automation.wake_up", "state": "on",
             "attributes": {"id": "1700000000001", "friendly_name": "Wake up"}},
            {"entity_id": "automation.night", "state": "off",
             "attributes": {"friendly_name": "Night mode"}},
            {"entity_id": "sensor.broken"}
        ])
    }

    fn fetcher(mock: &MockController, legacy_rest: bool) -> AutomationFetcher {
        let client = Arc::new(mock.client());
        let related = RelatedResolver::new(Arc::clone(&client), 10);
        AutomationFetcher::new(client, related, legacy_rest)
    }

    #[tokio::test]
    async fn test_list_command_tier() {
        let mock = MockController::builder()
            .states(states_fixture())
            .on_command(|cmd| match cmd["type"].as_str() {
                Some("config/automation/list") => Some(json!({
                    "success": true,
                    "result": [
                        {"id": "a1", "alias": "Motion lights",
                         "trigger": {"platform": "state", "entity_id": "binary_sensor.motion"},
                         "action": [{"service": "light.turn_on", "target": {"entity_id": ["light.a", "light.b"]}}]},
                        {"alias": "invalid, no id"}
                    ]
                })),
                _ => None,
            })
            .start()
            .await;

        let (source, automations) = fetcher(&mock, false).fetch_automations_with_source().await.unwrap();
        assert_eq!(source, AutomationSource::ListCommand);
        assert_eq!(automations.len(), 1);
        assert_eq!(automations[0].id, "a1");
        assert_eq!(automations[0].trigger.len(), 1);
        assert!(automations[0].related.is_empty());
        assert_eq!(mock.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_state_scan_fallback_with_related() {
        let mock = MockController::builder()
            .states(states_fixture())
            .on_command(|cmd| match cmd["type"].as_str() {
                Some("search/related") => {
                    let item = cmd["item_id"].as_str().unwrap_or_default();
                    let entities = if item == "automation.wake_up" {
                        json!(["light.bedroom", "sensor.alarm"])
                    } else {
                        json!(["switch.tv"])
                    };
                    Some(json!({"success": true, "result": {"entity": entities, "area": ["bedroom"]}}))
                }
                _ => Some(json!({"success": false, "error": {"code": "unknown_command", "message": "Unknown command."}})),
            })
            .start()
            .await;

        let (source, automations) = fetcher(&mock, false).fetch_automations_with_source().await.unwrap();
        assert_eq!(source, AutomationSource::StateScan);
        assert_eq!(automations.len(), 2);

        let wake = automations.iter().find(|a| a.id == "1700000000001").unwrap();
        assert_eq!(wake.alias.as_deref(), Some("Wake up"));
        assert_eq!(wake.related, vec!["light.bedroom", "sensor.alarm", "bedroom"]);
        assert!(wake.trigger.is_empty() && wake.condition.is_empty() && wake.action.is_empty());

        let night = automations.iter().find(|a| a.id == "automation.night").unwrap();
        assert_eq!(night.alias.as_deref(), Some("Night mode"));
        assert_eq!(night.related, vec!["switch.tv", "bedroom"]);

        // one list attempt plus one related session per automation
        assert_eq!(mock.sessions_opened(), 3);
    }

    #[tokio::test]
    async fn test_state_scan_when_related_fails() {
        let mock = MockController::builder().states(states_fixture()).start().await;
        let automations = fetcher(&mock, false).fetch_automations().await.unwrap();
        assert_eq!(automations.len(), 2);
        assert!(automations.iter().all(|a| a.related.is_empty()));
    }

    #[tokio::test]
    async fn test_legacy_rest_tier() {
        let mock = MockController::builder()
            .states(states_fixture())
            .rest_automations(json!([{"id": "rest-1", "alias": "From REST", "trigger": []}]))
            .start()
            .await;

        let (source, automations) = fetcher(&mock, true).fetch_automations_with_source().await.unwrap();
        assert_eq!(source, AutomationSource::LegacyRest);
        assert_eq!(automations.len(), 1);
        assert_eq!(automations[0].id, "rest-1");
    }

    #[tokio::test]
    async fn test_legacy_rest_disabled_by_default() {
        let mock = MockController::builder()
            .states(states_fixture())
            .rest_automations(json!([{"id": "rest-1"}]))
            .start()
            .await;
        let (source, _) = fetcher(&mock, false).fetch_automations_with_source().await.unwrap();
        assert_eq!(source, AutomationSource::StateScan);
    }

    #[tokio::test]
    async fn test_no_automations_is_valid() {
        let mock = MockController::builder()
            .states(json!([{"entity_id": "light.kitchen", "state": "on", "attributes": {}}]))
            .start()
            .await;
        let automations = fetcher(&mock, false).fetch_automations().await.unwrap();
        assert!(automations.is_empty());
    }

    #[tokio::test]
    async fn test_all_tiers_fail() {
        let mock = MockController::builder().start().await;
        let err = fetcher(&mock, true).fetch_automations().await.unwrap_err();
        assert!(matches!(err, HagraphError::AutomationFetch(_)));
        let message = err.to_string();
        assert!(message.contains("list command failed"));
        assert!(message.contains("legacy REST failed (Controller API error 404"));
        assert!(message.contains("state scan failed (Controller API error 500"));

        let err = fetcher(&mock, false).fetch_automations().await.unwrap_err();
        assert!(!err.to_string().contains("legacy REST"));
    }

    #[tokio::test]
    async fn test_bad_token_fails_every_tier() {
        let mock = MockController::builder().states(states_fixture()).start().await;
        let client = Arc::new(mock.client_with_token("wrong"));
        let related = RelatedResolver::new(Arc::clone(&client), 10);
        let err = AutomationFetcher::new(client, related, false)
            .fetch_automations()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Authentication error"));
    }
}
