use serde_json::Value;

use super::ControllerClient;
use crate::error::{HagraphError, Result};

impl ControllerClient {
    /// GET `{base}{path}` and decode the JSON body
    ///
    /// Non-2xx responses become [`HagraphError::UpstreamHttp`]; connection
    /// failures and timeouts become [`HagraphError::UpstreamUnreachable`].
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| HagraphError::UpstreamUnreachable(format!("{}: {}", url, e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(HagraphError::UpstreamHttp {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                HagraphError::UpstreamUnreachable(format!("{}: {}", url, e))
            } else {
                HagraphError::Parse(format!("Failed to parse response from {}: {}", url, e))
            }
        })
    }

    /// Fetch the full state snapshot from `/api/states`
    pub async fn fetch_states(&self) -> Result<Vec<Value>> {
        expect_array(self.get_json("/api/states").await?, "/api/states")
    }

    /// Fetch automation configs from the legacy `/api/config/automation` path
    pub async fn fetch_automation_configs_rest(&self) -> Result<Vec<Value>> {
        expect_array(
            self.get_json("/api/config/automation").await?,
            "/api/config/automation",
        )
    }
}

fn expect_array(value: Value, path: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(HagraphError::Parse(format!(
            "Expected a JSON array from {}, got {}",
            path,
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
