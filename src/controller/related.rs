//! Best-effort `search/related` lookups with a process-wide concurrency cap.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::ControllerClient;
use crate::error::{HagraphError, Result};

/// Default ceiling on concurrent related-items sessions
pub const DEFAULT_RELATED_CONCURRENCY: usize = 10;

/// Resolves the controller's "related items" for an entity.
///
/// Clones share the same semaphore, so the cap holds across every clone and
/// every ingestion cycle that uses them.
#[derive(Clone)]
pub struct RelatedResolver {
    client: Arc<ControllerClient>,
    permits: Arc<Semaphore>,
}

impl RelatedResolver {
    pub fn new(client: Arc<ControllerClient>, max_concurrent: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Related ids of `entity_id`, flattened across categories in response order.
    ///
    /// Never fails: auth, transport and command errors are logged and resolve
    /// to an empty list.
    pub async fn resolve_related(&self, entity_id: &str) -> Vec<String> {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                log::warn!("Related-items semaphore closed, skipping {}", entity_id);
                return Vec::new();
            }
        };

        match self.query(entity_id).await {
            Ok(related) => {
                log::debug!("{} related items for {}", related.len(), entity_id);
                related
            }
            Err(e) => {
                log::warn!("Related-items lookup failed for {}: {}", entity_id, e);
                Vec::new()
            }
        }
    }

    async fn query(&self, entity_id: &str) -> Result<Vec<String>> {
        let mut session = self.client.open_session().await?;
        let result = session
            .call(
                "search/related",
                json!({"item_type": "entity", "item_id": entity_id}),
            )
            .await;
        session.close().await;
        flatten_related(&result?)
    }
}

/// Concatenate every category list of a `search/related` result, no dedup
pub fn flatten_related(result: &Value) -> Result<Vec<String>> {
    let categories = match result {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(HagraphError::Parse(format!(
                "search/related result is not an object: {}",
                other
            )))
        }
    };

    let mut related = Vec::new();
    for ids in categories.values() {
        if let Value::Array(items) = ids {
            related.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }
    Ok(related)
}
