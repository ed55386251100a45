//! Store key names and their startup defaults.

use serde_json::{Value, json};

pub const CURRENT_VIEW: &str = "currentView";
pub const THEME: &str = "theme";
pub const STATS: &str = "stats";
pub const SERVER_STATS: &str = "serverStats";
pub const REPORTS: &str = "reports";
pub const IS_CONNECTED: &str = "isConnected";
pub const IS_LOADING: &str = "isLoading";
pub const IS_SCANNING: &str = "isScanning";
pub const TERMINAL_HISTORY: &str = "terminalHistory";
pub const SCAN_HISTORY: &str = "scanHistory";
pub const LAST_TARGET: &str = "lastTarget";
pub const DASHBOARD_STATE: &str = "dashboardState";
pub const CHAT_HISTORY: &str = "chatHistory";
pub const CHAT_DRAFT: &str = "chatDraft";
pub const CHAT_TYPING: &str = "chatTyping";
pub const CHAT_ONLINE: &str = "chatOnline";
pub const PENDING_SCAN: &str = "pendingScan";
pub const NOTICE: &str = "notice";

/// Keys written to the durable snapshot and reloaded at startup.
pub const DURABLE: [&str; 6] = [
    STATS,
    TERMINAL_HISTORY,
    SCAN_HISTORY,
    LAST_TARGET,
    CHAT_HISTORY,
    DASHBOARD_STATE,
];

pub fn is_durable(key: &str) -> bool {
    DURABLE.contains(&key)
}

/// Initial value of every key the console reads, before the snapshot is applied.
pub fn defaults(theme: &str, default_view: &str) -> Vec<(&'static str, Value)> {
    vec![
        (CURRENT_VIEW, json!(default_view)),
        (THEME, json!(theme)),
        (
            STATS,
            json!({"totalScans": 0, "targets": 0, "vulns": 0, "aiRequests": 0}),
        ),
        (REPORTS, json!([])),
        (IS_CONNECTED, json!(false)),
        (IS_LOADING, json!(false)),
        (IS_SCANNING, json!(false)),
        (TERMINAL_HISTORY, json!([])),
        (SCAN_HISTORY, json!([])),
        (LAST_TARGET, json!("")),
        (DASHBOARD_STATE, Value::Null),
        (CHAT_HISTORY, json!([])),
        (CHAT_TYPING, json!(false)),
        (CHAT_ONLINE, json!(false)),
    ]
}
