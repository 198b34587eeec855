//! Client configuration loaded from environment variables.

use crate::error::{RemoteError, Result};

/// Connection settings for the hosted platform.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the hosted project, without a trailing slash.
    /// Env: `SUARA_BASE_URL`
    pub base_url: String,

    /// Public (anonymous) API key. Row-level security on the platform
    /// decides what it may touch.
    /// Env: `SUARA_ANON_KEY`
    pub anon_key: String,

    /// Optional realtime endpoint override.
    /// Env: `SUARA_REALTIME_URL`
    /// Default: derived from `base_url` (ws scheme, `/realtime/v1/websocket`).
    pub realtime_override: Option<String>,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            realtime_override: None,
        }
    }

    /// Load from the environment. The base URL and anon key have no
    /// sensible defaults and are required.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SUARA_BASE_URL")
            .map_err(|_| RemoteError::Config("SUARA_BASE_URL is not set".into()))?;
        let anon_key = std::env::var("SUARA_ANON_KEY")
            .map_err(|_| RemoteError::Config("SUARA_ANON_KEY is not set".into()))?;

        let mut config = Self::new(base_url, anon_key);
        if let Ok(url) = std::env::var("SUARA_REALTIME_URL") {
            config.realtime_override = Some(url);
        }
        Ok(config)
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Websocket endpoint of the change feed, including the API key.
    pub fn realtime_url(&self) -> String {
        let endpoint = match &self.realtime_override {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = self.base_url.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    self.base_url.clone()
                };
                format!("{ws_base}/realtime/v1/websocket")
            }
        };
        format!("{endpoint}?apikey={}&vsn=1.0.0", self.anon_key)
    }
}
