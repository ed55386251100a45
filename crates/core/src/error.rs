//! Error types for the X-Recon client core.
//!
//! Every failure in this crate is recoverable: callers either fall back
//! locally (persistence, routing) or surface a dismissable notice
//! (transport, remote requests, operator commands).

use thiserror::Error;

/// Failure to reach a live, ready channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("channel '{channel}' has no live connection")]
    NotConnected { channel: String },

    #[error("no endpoint configured for channel '{0}'")]
    UnknownChannel(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

impl TransportError {
    /// Create a not-connected error for the named channel.
    pub fn not_connected(channel: impl Into<String>) -> Self {
        Self::NotConnected {
            channel: channel.into(),
        }
    }
}

/// Failure reading or writing durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Navigation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("view '{view}' failed to mount: {reason}")]
    MountFailed { view: String, reason: String },
}

/// HTTP request failures against the scanning backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {text}")]
    Status { status: u16, text: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid report filename: {0}")]
    InvalidFilename(String),
}

/// Rejected operator actions (scan launch, stop, terminal command, chat send).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("a scan is already running")]
    ScanInProgress,

    #[error("no scan is currently running")]
    NoActiveScan,

    #[error("target must not be empty")]
    EmptyTarget,

    #[error("at least one module must be selected")]
    NoModules,

    #[error("input must not be empty")]
    EmptyInput,
}

/// Configuration parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for the client core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::not_connected("terminal");
        assert_eq!(err.to_string(), "channel 'terminal' has no live connection");

        let err = TransportError::InvalidUrl("http://example.com".to_string());
        assert_eq!(err.to_string(), "invalid URL: http://example.com");
    }

    #[test]
    fn test_route_error_display() {
        let err = RouteError::NotFound("nowhere".to_string());
        assert!(err.to_string().contains("Route not found"));
    }

    #[test]
    fn test_command_error_wraps_transport_transparently() {
        let err: CommandError = TransportError::not_connected("ai-chat").into();
        assert_eq!(err.to_string(), "channel 'ai-chat' has no live connection");
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: Error = ApiError::Status {
            status: 404,
            text: "Not Found".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }
}
