//! Structured entries held in the store.
//!
//! Serialized field names are the ones written to durable storage. Older
//! snapshots used `type`/`time` for terminal lines and `ai` for the assistant
//! sender; those spellings are still accepted on load.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Visual class of a terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Info,
    Success,
    Error,
    Warning,
    Highlight,
    /// Echo of an operator-typed command.
    User,
}

impl EntryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Highlight => "highlight",
            Self::User => "user",
        }
    }

    /// CSS class applied to the rendered line.
    pub fn css_class(self) -> String {
        format!("terminal-{}", self.as_str())
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of terminal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalEntry {
    pub message: String,
    #[serde(alias = "type")]
    pub kind: EntryKind,
    pub prefix: String,
    #[serde(alias = "time")]
    pub timestamp: String,
}

impl TerminalEntry {
    pub fn new(
        message: impl Into<String>,
        kind: EntryKind,
        prefix: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            prefix: prefix.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "ai")]
    Assistant,
}

/// One chat message. Finalized messages are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

/// Lifecycle of a launched scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Stopped,
}

/// A scan launched from this console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub target: String,
    pub modules: Vec<String>,
    /// Launch time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub status: ScanStatus,
}

/// Scan handed from the scanner view to the dashboard terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingScan {
    pub target: String,
    pub modules: Vec<String>,
    pub timestamp: i64,
}

/// Locally maintained counters, persisted under `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsCounters {
    pub total_scans: u64,
    pub targets: u64,
    pub vulns: u64,
    pub ai_requests: u64,
}

/// Field names accepted by `Store::increment_counter` on the `stats` key.
pub mod counters {
    pub const TOTAL_SCANS: &str = "totalScans";
    pub const TARGETS: &str = "targets";
    pub const VULNS: &str = "vulns";
    pub const AI_REQUESTS: &str = "aiRequests";
}

/// A metric the backend reports either as a count or as a label
/// (`"ai_requests": "Active"`, `"size": "2048 bytes"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Count(u64),
    Label(String),
}

impl Default for Metric {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Label(s) => f.write_str(s),
        }
    }
}

/// Response of `GET /api/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    pub total_scans: Metric,
    pub targets: Metric,
    pub vulns: Metric,
    pub ai_requests: Metric,
}

/// One entry of `GET /api/reports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub filename: String,
    #[serde(default)]
    pub size: Metric,
    #[serde(default)]
    pub created: String,
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Dismissable toast shown by the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn new(message: impl Into<String>, level: NoticeLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}
