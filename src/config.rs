//! Feed configuration
//!
//! Every knob of the live path lives in [`FeedConfig`]. Defaults match the
//! production feed, so most callers only override the intermediary URL.
//!
//! ```yaml
//! negotiation:
//!   base_url: https://timing-proxy.example.com
//! reconnect:
//!   base_delay_ms: 1000
//!   max_attempts: 8
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::DEFAULT_TOPICS;
use crate::transport::ReconnectPolicy;
use crate::{Result, TimingError};

/// Environment variable overriding [`NegotiationConfig::base_url`].
pub const BACKEND_URL_ENV: &str = "PITLANE_BACKEND_URL";

/// Top-level configuration for the live timing client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub negotiation: NegotiationConfig,
    pub stream: StreamConfig,
    pub reconnect: ReconnectConfig,
}

/// Where and how to obtain a session descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Intermediary backend base URL (never the upstream feed)
    pub base_url: String,
    pub negotiate_path: String,
    pub status_path: String,
    pub timeout_secs: u64,
}

/// Upstream streaming endpoint and subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket connect URL, query parameters are appended per session
    pub endpoint: String,
    pub hub: String,
    pub client_protocol: String,
    pub topics: Vec<String>,
    /// Pause between opening the socket and sending the subscription
    pub settle_delay_ms: u64,
    /// Capacity of the transport -> orchestrator event queue
    pub event_capacity: usize,
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            negotiate_path: "/api/livetiming/negotiate".to_string(),
            status_path: "/api/livetiming/status".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://livetiming.formula1.com/signalr/connect".to_string(),
            hub: "Streaming".to_string(),
            client_protocol: "1.5".to_string(),
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            settle_delay_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { base_delay_ms: 3000, max_attempts: 5 }
    }
}

impl FeedConfig {
    /// Parse a YAML document, filling gaps with defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FeedConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TimingError::config_error(format!("YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| TimingError::File { path: path.to_path_buf(), source })?;
        let config = Self::from_yaml_str(&yaml)
            .with_context(|| format!("loading feed configuration from {}", path.display()))?;
        debug!(path = %path.display(), "Loaded feed configuration");
        Ok(config)
    }

    /// Apply [`BACKEND_URL_ENV`] if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                debug!(url = %url, "Backend URL overridden from environment");
                self.negotiation.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        self
    }

    /// Replace the intermediary base URL.
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.negotiation.base_url = url.into();
        self
    }

    /// Reject configurations the live path cannot run with.
    pub fn validate(&self) -> Result<()> {
        let base = &self.negotiation.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TimingError::config_error(format!(
                "negotiation.base_url must be http(s), got '{base}'"
            )));
        }
        let endpoint = &self.stream.endpoint;
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(TimingError::config_error(format!(
                "stream.endpoint must be ws(s), got '{endpoint}'"
            )));
        }
        if self.stream.topics.is_empty() {
            return Err(TimingError::config_error("stream.topics must not be empty"));
        }
        if self.stream.event_capacity == 0 {
            return Err(TimingError::config_error("stream.event_capacity must be positive"));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(TimingError::config_error("reconnect.max_attempts must be positive"));
        }
        Ok(())
    }

    pub fn negotiate_url(&self) -> String {
        join_url(&self.negotiation.base_url, &self.negotiation.negotiate_path)
    }

    pub fn status_url(&self) -> String {
        join_url(&self.negotiation.base_url, &self.negotiation.status_path)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.stream.settle_delay_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect.base_delay_ms),
            self.reconnect.max_attempts,
        )
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
