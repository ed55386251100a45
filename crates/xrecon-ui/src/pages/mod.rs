//! Page components for the X-Recon console
//!
//! One component per routed view. Each takes the console handle and reads
//! state through its signals.

pub mod ai;
pub mod dashboard;
pub mod reports;
pub mod scanner;
pub mod settings;

pub use ai::AiChat;
pub use dashboard::Dashboard;
pub use reports::Reports;
pub use scanner::Scanner;
pub use settings::Settings;

/// Launch time of a scan or report in UTC, empty for an out-of-range value.
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}
