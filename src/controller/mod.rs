//! Controller access: REST and WebSocket primitives, automation discovery
//! with fallback tiers, and bounded related-items lookups.

pub mod automations;
pub mod related;
pub mod rest;
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

pub use automations::AutomationFetcher;
pub use related::RelatedResolver;
pub use websocket::Session;

use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::{HagraphError, Result};

/// Connection details and HTTP client for one controller
#[derive(Debug, Clone)]
pub struct ControllerClient {
    client: Client,
    base_url: String,
    token: String,
    ws_timeout: Duration,
}

impl ControllerClient {
    /// Create a new controller client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Controller URL, e.g. `http://homeassistant.local:8123`
    /// * `token` - Long-lived access token
    /// * `rest_timeout` - Timeout applied to every REST request
    /// * `ws_timeout` - Timeout applied to every WebSocket call
    pub fn new(
        base_url: &str,
        token: String,
        rest_timeout: Duration,
        ws_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(rest_timeout)
            .build()
            .map_err(|e| HagraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            ws_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .access_token()
            .map_err(|e| HagraphError::Config(e.to_string()))?;
        Self::new(
            &config.controller.url,
            token,
            config.rest_timeout(),
            config.ws_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket endpoint derived from the base URL (`http` -> `ws`, `https` -> `wss`)
    pub fn websocket_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| HagraphError::Config(format!("Invalid controller URL {}: {}", self.base_url, e)))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| HagraphError::Config(format!("Cannot derive WebSocket URL from {}", self.base_url)))?;
        Ok(format!("{}/api/websocket", url.as_str().trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> ControllerClient {
        ControllerClient::new(url, "t".to_string(), Duration::from_secs(1), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_websocket_url_http() {
        let c = client("http://homeassistant.local:8123/");
        assert_eq!(c.base_url(), "http://homeassistant.local:8123");
        assert_eq!(c.websocket_url().unwrap(), "ws://homeassistant.local:8123/api/websocket");
    }

    #[test]
    fn test_websocket_url_https() {
        let c = client("https://ha.example.com");
        assert_eq!(c.websocket_url().unwrap(), "wss://ha.example.com/api/websocket");
    }

    #[test]
    fn test_websocket_url_with_path_prefix() {
        let c = client("http://proxy.lan/ha");
        assert_eq!(c.websocket_url().unwrap(), "ws://proxy.lan/ha/api/websocket");
    }
}
