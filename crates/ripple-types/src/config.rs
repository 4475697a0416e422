//! Client configuration types.
//!
//! Deserialized from `config.toml` in the data directory. Every field has a
//! default so a partial (or absent) file still yields a usable config.

use serde::{Deserialize, Serialize};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Where the REST API and event stream live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Explicit event-stream URL. When unset it is derived from `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

impl ServerConfig {
    /// Resolve the event-stream URL.
    ///
    /// Explicit `ws_url` wins; otherwise `base_url` is rewritten to the ws
    /// scheme with `/ws` appended.
    pub fn event_stream_url(&self) -> String {
        if let Some(ref url) = self.ws_url {
            return url.clone();
        }
        let ws = self
            .base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{}/ws", ws.trim_end_matches('/'))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Reconnect policy for the transport channel.
///
/// Capped exponential backoff with optional jitter. The defaults keep the
/// first retry prompt (250ms) while bounding the worst case at 30s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied after each failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Randomize each delay within [delay/2, delay] to avoid thundering herds.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}
