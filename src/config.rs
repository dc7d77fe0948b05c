use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hagraph: HagraphConfig,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct HagraphConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HagraphConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

/// Controller connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Base URL, e.g. `http://homeassistant.local:8123`
    pub url: String,
    /// Name of the environment variable holding the long-lived access token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_rest_timeout_secs")]
    pub rest_timeout_secs: u64,
    #[serde(default = "default_ws_timeout_secs")]
    pub ws_timeout_secs: u64,
    /// Upper bound on concurrent `search/related` sessions
    #[serde(default = "default_related_concurrency")]
    pub related_concurrency: usize,
    /// Try `GET /api/config/automation` before scanning states
    #[serde(default)]
    pub legacy_rest_automations: bool,
}

/// Spring layout parameters
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_layout_k")]
    pub k: f64,
    #[serde(default = "default_layout_iterations")]
    pub iterations: usize,
    #[serde(default = "default_layout_scale")]
    pub scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            k: default_layout_k(),
            iterations: default_layout_iterations(),
            scale: default_layout_scale(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_token_env() -> String {
    "HA_TOKEN".to_string()
}

fn default_rest_timeout_secs() -> u64 {
    10
}

fn default_ws_timeout_secs() -> u64 {
    10
}

fn default_related_concurrency() -> usize {
    10
}

fn default_layout_k() -> f64 {
    0.15
}

fn default_layout_iterations() -> usize {
    50
}

fn default_layout_scale() -> f64 {
    2000.0
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in HAGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("HAGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML string without touching the environment
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.controller.url)
            .with_context(|| format!("controller.url is not a valid URL: {}", self.controller.url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("controller.url must use http or https, got {}", url.scheme());
        }

        self.access_token()?;

        if self.controller.rest_timeout_secs == 0 || self.controller.ws_timeout_secs == 0 {
            anyhow::bail!("controller timeouts must be greater than 0");
        }

        if self.controller.related_concurrency == 0 {
            anyhow::bail!("controller.related_concurrency must be greater than 0");
        }

        if self.layout.iterations == 0 {
            anyhow::bail!("layout.iterations must be greater than 0");
        }

        if self.layout.k <= 0.0 || self.layout.scale <= 0.0 {
            anyhow::bail!("layout.k and layout.scale must be positive");
        }

        Ok(())
    }

    /// Read the controller access token from the configured environment variable
    pub fn access_token(&self) -> Result<String> {
        std::env::var(&self.controller.token_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with a controller long-lived access token.",
                self.controller.token_env
            )
        })
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_secs(self.controller.rest_timeout_secs)
    }

    pub fn ws_timeout(&self) -> Duration {
        Duration::from_secs(self.controller.ws_timeout_secs)
    }
}
