//! Client configuration.
//!
//! All fields default to the values the console ships with, so an empty TOML
//! document is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, TransportError};
use crate::router::routes;

/// Logical channel carrying scan output and operator commands.
pub const TERMINAL_CHANNEL: &str = "terminal";
/// Logical channel carrying assistant questions and streamed answers.
pub const CHAT_CHANNEL: &str = "ai-chat";

/// Storage key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key under which the durable snapshot is written.
    pub snapshot_key: String,
    /// Independent scalar entry for the theme preference.
    pub theme_key: String,
    /// Independent scalar entry for the AI model preference.
    pub model_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_key: "xrecon_state".to_string(),
            theme_key: "xrecon_theme".to_string(),
            model_key: "xrecon_ai_model".to_string(),
        }
    }
}

/// Caps for the bounded history sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub terminal_history: usize,
    pub scan_history: usize,
    pub chat_history: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            terminal_history: 100,
            scan_history: 50,
            chat_history: 30,
        }
    }
}

/// Timer intervals, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub stats_poll_ms: u32,
    pub notice_ms: u32,
    pub pending_scan_max_age_ms: i64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            stats_poll_ms: 5_000,
            notice_ms: 3_000,
            pending_scan_max_age_ms: 10_000,
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Page origin the backend is served from, e.g. `http://127.0.0.1:8000`.
    pub origin: String,
    /// Channel name to WebSocket path.
    pub endpoints: BTreeMap<String, String>,
    pub storage: StorageConfig,
    pub limits: Limits,
    pub timing: Timing,
    pub default_view: String,
    /// `tracing` filter directive used by the browser subscriber.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let endpoints = [
            (TERMINAL_CHANNEL.to_string(), "/ws/terminal".to_string()),
            (CHAT_CHANNEL.to_string(), "/ws/ai".to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            origin: "http://127.0.0.1:8000".to_string(),
            endpoints,
            storage: StorageConfig::default(),
            limits: Limits::default(),
            timing: Timing::default(),
            default_view: routes::DASHBOARD.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` when validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the origin, typically with the one reported by the page.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Check invariants the rest of the crate relies on.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.terminal_history == 0
            || self.limits.scan_history == 0
            || self.limits.chat_history == 0
        {
            return Err(ConfigError::Invalid(
                "history limits must be positive".to_string(),
            ));
        }
        if let Some((name, _)) = self.endpoints.iter().find(|(_, path)| !path.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "endpoint for '{name}' must be an absolute path"
            )));
        }
        if !routes::ALL.contains(&self.default_view.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown default view '{}'",
                self.default_view
            )));
        }
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {e}", self.origin)))?;
        Ok(())
    }

    /// Build the WebSocket URL for a channel from the page origin.
    ///
    /// `https` origins map to `wss`, everything else to `ws`.
    ///
    /// # Errors
    /// Returns `TransportError::UnknownChannel` when the channel has no
    /// endpoint and `TransportError::InvalidUrl` when the origin does not parse.
    pub fn socket_url(&self, channel: &str) -> Result<String, TransportError> {
        let path = self
            .endpoints
            .get(channel)
            .ok_or_else(|| TransportError::UnknownChannel(channel.to_string()))?;
        let mut url = Url::parse(&self.origin)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.origin)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| TransportError::InvalidUrl(self.origin.clone()))?;
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url.to_string())
    }

    /// Build an HTTP API URL below the origin.
    ///
    /// # Errors
    /// Returns `TransportError::InvalidUrl` when the origin does not parse.
    pub fn api_url(&self, path: &str) -> Result<Url, TransportError> {
        Url::parse(&self.origin)
            .and_then(|base| base.join(path))
            .map_err(|e| TransportError::InvalidUrl(format!("{}{path}: {e}", self.origin)))
    }
}
